//! Lexer tests

use pretty_assertions::assert_eq;
use turtlescript::TurtleError;
use turtlescript::lexer::{SEPARATOR, tokenize};

fn values(source: &str) -> Vec<String> {
    tokenize(source)
        .unwrap()
        .into_iter()
        .map(|t| t.value)
        .collect()
}

#[test]
fn test_lex_empty() {
    assert!(tokenize("").unwrap().is_empty());
    assert!(tokenize("  \n\n ;  ").unwrap().is_empty());
}

#[test]
fn test_lex_simple_command() {
    assert_eq!(values("command1 arg1 arg2"), vec!["command1", "arg1", "arg2"]);
}

#[test]
fn test_lex_grouping_keeps_spaces() {
    assert_eq!(values("a (b c)"), vec!["a", "(b c)"]);
    assert_eq!(values("print a[1 + 2] + 1"), vec!["print", "a[1 + 2]", "+", "1"]);
    assert_eq!(values("x a[(1)]+1"), vec!["x", "a[(1)]+1"]);
}

#[test]
fn test_lex_separators() {
    assert_eq!(values("f 10\nr 90; f 5\n"), vec!["f", "10", SEPARATOR, "r", "90", SEPARATOR, "f", "5"]);
}

#[test]
fn test_lex_blocks() {
    assert_eq!(
        values("rep 3 {f 10}"),
        vec!["rep", "3", "{", "f", "10", "}"]
    );
}

#[test]
fn test_lex_braces_inside_groups_are_text() {
    assert_eq!(values("print (a {b})"), vec!["print", "(a {b})"]);
}

#[test]
fn test_lex_strings() {
    assert_eq!(
        values("print \"hello world; # not a comment\""),
        vec!["print", "\"hello world; # not a comment\""]
    );
    assert_eq!(values("print \"say \\\"hi\\\"\""), vec!["print", "\"say \\\"hi\\\"\""]);
}

#[test]
fn test_lex_char_literals() {
    assert_eq!(values("print '\" '#"), vec!["print", "'\"", "'#"]);
}

#[test]
fn test_lex_comments() {
    assert_eq!(
        values("f 10 # move\n# whole line\nr 90"),
        vec!["f", "10", SEPARATOR, "r", "90"]
    );
}

#[test]
fn test_lex_positions() {
    let tokens = tokenize("f 10\n  rt 90").unwrap();
    assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
    assert_eq!((tokens[1].line, tokens[1].column), (1, 3));
    assert_eq!((tokens[3].line, tokens[3].column), (2, 3));
    assert_eq!((tokens[4].line, tokens[4].column), (2, 6));
}

#[test]
fn test_lex_unclosed_paren() {
    match tokenize("print (1 + 2") {
        Err(TurtleError::UnclosedBracket { bracket, line, column }) => {
            assert_eq!(bracket, '(');
            assert_eq!((line, column), (1, 7));
        }
        other => panic!("expected unclosed bracket, got {:?}", other),
    }
}

#[test]
fn test_lex_excess_paren() {
    assert!(matches!(
        tokenize("print 1)"),
        Err(TurtleError::ExcessBracket { bracket: ')', .. })
    ));
    assert!(matches!(
        tokenize("print a]"),
        Err(TurtleError::ExcessBracket { bracket: ']', .. })
    ));
}

#[test]
fn test_lex_newline_inside_group() {
    assert!(matches!(
        tokenize("print (1 +\n 2)"),
        Err(TurtleError::UnclosedBracket { bracket: '(', .. })
    ));
    assert!(matches!(
        tokenize("print [1; 2]"),
        Err(TurtleError::UnclosedBracket { bracket: '[', .. })
    ));
}

#[test]
fn test_lex_brace_balance() {
    assert!(matches!(
        tokenize("rep 3 { f 10"),
        Err(TurtleError::UnclosedBracket { bracket: '{', .. })
    ));
    assert!(matches!(
        tokenize("f 10 }"),
        Err(TurtleError::ExcessBracket { bracket: '}', .. })
    ));
}

#[test]
fn test_lex_unterminated_string() {
    assert!(matches!(
        tokenize("print \"oops"),
        Err(TurtleError::UnterminatedString { line: 1, column: 7 })
    ));
}
