//! Parser tests

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use turtlescript::ast::*;
use turtlescript::common::Position;
use turtlescript::lexer::{Token, tokenize};
use turtlescript::parser::parse;
use turtlescript::TurtleError;

fn parse_source(source: &str) -> Commands {
    let tokens = tokenize(source).unwrap();
    parse(&tokens).unwrap()
}

fn texts(cmd: &Command) -> Vec<&str> {
    cmd.arguments.iter().filter_map(Argument::as_text).collect()
}

#[test]
fn test_parse_empty() {
    assert!(parse_source("").is_empty());
}

#[test]
fn test_parse_single_command() {
    let cmds = parse_source("f 10\n");
    assert_eq!(cmds.len(), 1);
    assert_eq!(cmds[0].label, "f");
    assert_eq!(cmds[0].arguments, vec![Argument::Text("10".into())]);
    assert_eq!(cmds[0].return_variable, None);
    assert_eq!((cmds[0].line, cmds[0].column), (1, 1));
}

#[test]
fn test_parse_statements_in_order() {
    let cmds = parse_source("f 10; r 90\nprint x");
    let labels: Vec<_> = cmds.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["f", "r", "print"]);
    assert_eq!(cmds[2].line, 2);
}

#[test]
fn test_parse_nested_block() {
    let cmds = parse_source("rep 3 {\n  f 10\n  rt 120\n}\nprint done");
    assert_eq!(cmds.len(), 2);
    let rep = &cmds[0];
    assert_eq!(texts(rep), vec!["3"]);
    assert_eq!(rep.block_count(), 1);

    let body = rep.arguments[1].as_block().unwrap();
    assert_eq!(body.len(), 2);
    assert_eq!(body[0].label, "f");
    assert_eq!(body[1].label, "rt");
    assert_eq!(body[1].line, 3);
}

#[test]
fn test_parse_if_chain_on_one_line() {
    let cmds = parse_source("if x>3 { print 1 } elif x>1 { print 2 } else { print 3 }");
    assert_eq!(cmds.len(), 1);
    let cmd = &cmds[0];
    assert_eq!(cmd.label, "if");
    assert_eq!(cmd.arguments.len(), 7);
    assert_eq!(cmd.block_count(), 3);
    assert_eq!(cmd.arguments[2], Argument::Text("elif".into()));
    assert_eq!(cmd.arguments[5], Argument::Text("else".into()));
}

#[test]
fn test_parse_procedure_definition() {
    let cmds = parse_source("learn square x {\n  return x*x\n}");
    assert_eq!(texts(&cmds[0]), vec!["square", "x"]);
    let body = cmds[0].arguments[2].as_block().unwrap();
    assert_eq!(texts(&body[0]), vec!["x*x"]);
}

#[test]
fn test_parse_return_binding() {
    let cmds = parse_source("r := square 4\nnew s := square 5");
    assert_eq!(cmds[0].label, "square");
    assert_eq!(cmds[0].return_variable.as_deref(), Some("r"));
    assert!(!cmds[0].creates_new_return_var);
    assert_eq!(cmds[1].return_variable.as_deref(), Some("s"));
    assert!(cmds[1].creates_new_return_var);
    assert_eq!(texts(&cmds[1]), vec!["5"]);
}

#[test]
fn test_parse_anonymous_block_is_spliced() {
    let cmds = parse_source("{\n f 10\n r 90\n}\nprint 1");
    let labels: Vec<_> = cmds.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["f", "r", "print"]);
}

#[test]
fn test_parse_nested_anonymous_block_joins_enclosing_body() {
    let cmds = parse_source("rep 2 {\n  f 1\n  {\n    r 90\n    { lt 5 }\n  }\n  f 2\n}");
    assert_eq!(cmds.len(), 1);
    let body = cmds[0].arguments[1].as_block().unwrap();
    let labels: Vec<_> = body.iter().map(|c| (c.label.as_str(), c.line)).collect();
    assert_eq!(labels, vec![("f", 2), ("r", 4), ("lt", 5), ("f", 7)]);
    assert!(body.iter().all(|c| c.block_count() == 0));
}

#[test]
fn test_parse_block_after_separator_is_not_an_argument() {
    let cmds = parse_source("rep 2\n{ f 1 }");
    assert_eq!(cmds.len(), 2);
    assert_eq!(cmds[0].label, "rep");
    assert_eq!(cmds[0].block_count(), 0);
    assert_eq!(cmds[1].label, "f");
}

#[test]
fn test_parse_malformed_binding() {
    for source in ["x :=", "3 := f 1", "r := { f 1 }"] {
        let tokens = tokenize(source).unwrap();
        assert!(
            matches!(parse(&tokens), Err(TurtleError::MalformedReturnBinding { .. })),
            "{:?} should be a malformed binding",
            source
        );
    }
}

#[test]
fn test_parse_unmatched_block() {
    let at = Position::start();
    let stray_close = vec![Token::new("f", at), Token::new("}", at)];
    assert!(matches!(
        parse(&stray_close),
        Err(TurtleError::UnmatchedBlock { .. })
    ));

    let unclosed = vec![Token::new("rep", at), Token::new("3", at), Token::new("{", Position::new(1, 7))];
    assert_eq!(
        parse(&unclosed),
        Err(TurtleError::UnmatchedBlock { line: 1, column: 7 })
    );
}

#[test]
fn test_parse_display_roundtrips_text() {
    let cmds = parse_source("new total := sum 1 2");
    assert_eq!(cmds[0].to_string(), "new total := sum 1 2");
}

// ==================== Properties ====================

#[derive(Debug, Clone)]
struct Stmt {
    words: Vec<String>,
    block: Option<Vec<Stmt>>,
}

fn word() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,4}"
}

fn stmt() -> impl Strategy<Value = Stmt> {
    let leaf = prop::collection::vec(word(), 1..4).prop_map(|words| Stmt { words, block: None });
    leaf.prop_recursive(3, 32, 4, |inner| {
        (prop::collection::vec(word(), 1..4), prop::collection::vec(inner, 0..4))
            .prop_map(|(words, body)| Stmt {
                words,
                block: Some(body),
            })
    })
}

fn flatten(stmts: &[Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        out.extend(stmt.words.iter().cloned());
        if let Some(body) = &stmt.block {
            out.push("{".to_string());
            flatten(body, out);
            out.push("}".to_string());
        }
        out.push("\n".to_string());
    }
}

/// (labels + text arguments, nested blocks)
fn count(cmds: &Commands) -> (usize, usize) {
    cmds.iter().fold((0, 0), |(leaves, blocks), cmd| {
        let mut leaves = leaves + 1;
        let mut blocks = blocks;
        for arg in &cmd.arguments {
            match arg {
                Argument::Text(_) => leaves += 1,
                Argument::Block(body) => {
                    let (l, b) = count(body);
                    leaves += l;
                    blocks += b + 1;
                }
            }
        }
        (leaves, blocks)
    })
}

proptest! {
    #[test]
    fn prop_parse_conserves_tokens(program in prop::collection::vec(stmt(), 0..6)) {
        let mut values = Vec::new();
        flatten(&program, &mut values);
        let tokens: Vec<Token> = values
            .iter()
            .map(|v| Token::new(v.as_str(), Position::start()))
            .collect();

        let content = tokens.iter().filter(|t| !t.is_structural()).count();
        let opened = tokens.iter().filter(|t| t.is_block_open()).count();

        let cmds = parse(&tokens).unwrap();
        prop_assert_eq!(count(&cmds), (content, opened));
    }
}
