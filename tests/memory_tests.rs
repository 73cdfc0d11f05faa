//! Structured memory tests

use std::rc::Rc;

use pretty_assertions::assert_eq;
use turtlescript::expr::{self, NoVariables};
use turtlescript::interp::{BoundParameters, Memory, ParamType};
use turtlescript::TurtleError;

fn value(source: &str) -> ParamType {
    expr::evaluate(source, &NoVariables).unwrap()
}

#[test]
fn test_create_then_get() {
    let scope = Memory::root();
    scope.create("x", ParamType::Number(5.0)).unwrap();
    assert_eq!(scope.get("x"), Ok(ParamType::Number(5.0)));
    assert!(scope.owns("x"));
}

#[test]
fn test_get_missing() {
    let scope = Memory::root();
    assert_eq!(
        scope.get("ghost"),
        Err(TurtleError::NonExistingVariable {
            name: "ghost".to_string()
        })
    );
}

#[test]
fn test_set_requires_existing_name() {
    let scope = Memory::root();
    assert!(matches!(
        scope.set("ghost", ParamType::Number(1.0)),
        Err(TurtleError::NonExistingVariable { .. })
    ));
    assert!(!scope.owns("ghost"));
}

#[test]
fn test_child_set_mutates_parent() {
    let parent = Memory::root();
    parent.create("count", ParamType::Number(1.0)).unwrap();
    let child = Memory::child(&parent);

    child.set("count", ParamType::Number(2.0)).unwrap();
    assert_eq!(parent.get("count"), Ok(ParamType::Number(2.0)));
    assert!(!child.owns("count"));
    assert!(child.local_names().is_empty());
}

#[test]
fn test_child_create_shadows_parent() {
    let parent = Memory::root();
    parent.create("x", ParamType::Number(1.0)).unwrap();
    let child = Memory::child(&parent);
    child.create("x", ParamType::Number(9.0)).unwrap();

    assert_eq!(child.get("x"), Ok(ParamType::Number(9.0)));
    assert_eq!(parent.get("x"), Ok(ParamType::Number(1.0)));
}

#[test]
fn test_structured_set() {
    let scope = Memory::root();
    scope.create("pos", value("[x: 1, y: 2]")).unwrap();
    scope.set("pos.y", ParamType::Number(20.0)).unwrap();
    scope.set("pos.z", ParamType::Number(3.0)).unwrap();
    assert_eq!(scope.get("pos"), Ok(value("[x: 1, y: 20, z: 3]")));
}

#[test]
fn test_array_index_set() {
    let scope = Memory::root();
    scope.create("grid", value("[[0, 0], [0, 0]]")).unwrap();
    scope.create("i", ParamType::Number(1.0)).unwrap();
    scope.set("grid[i][i-1]", ParamType::Number(5.0)).unwrap();
    assert_eq!(scope.get("grid"), Ok(value("[[0, 0], [5, 0]]")));

    scope.set("grid[2]", value("[7]")).unwrap();
    assert_eq!(scope.get("grid[2][0]"), Ok(ParamType::Number(7.0)));
}

#[test]
fn test_out_of_range_index() {
    let scope = Memory::root();
    scope.create("a", value("[1, 2]")).unwrap();
    assert!(matches!(
        scope.get("a[5]"),
        Err(TurtleError::InvalidPath { .. })
    ));
    assert!(matches!(
        scope.set("a[9]", ParamType::Number(0.0)),
        Err(TurtleError::InvalidPath { .. })
    ));
}

#[test]
fn test_create_materializes_path() {
    let scope = Memory::root();
    scope.create("cfg.pen.width", ParamType::Number(2.0)).unwrap();
    assert_eq!(scope.get("cfg"), Ok(value("[pen: [width: 2]]")));

    scope.create("row[2]", ParamType::Number(1.0)).unwrap();
    assert_eq!(scope.get("row"), Ok(value("[0, 0, 1]")));
}

#[test]
fn test_index_resolves_in_requesting_scope() {
    let outer = Memory::root();
    outer.create("array", value("[10, 20, 30]")).unwrap();
    let inner = Memory::child(&outer);
    inner.create("i", ParamType::Number(2.0)).unwrap();

    assert_eq!(inner.get("array[i]"), Ok(ParamType::Number(30.0)));
    inner.set("array[i]", ParamType::Number(33.0)).unwrap();
    assert_eq!(outer.get("array"), Ok(value("[10, 20, 33]")));
}

#[test]
fn test_injected_parameters_are_read_only() {
    let root = Memory::root();
    let params = BoundParameters::new().bind("x", ParamType::Number(4.0));
    let scope = Memory::child_with(&root, Rc::new(params));

    assert_eq!(scope.get("x"), Ok(ParamType::Number(4.0)));
    assert_eq!(
        scope.set("x", ParamType::Number(5.0)),
        Err(TurtleError::ReadOnlyVariable {
            name: "x".to_string()
        })
    );

    // A local definition shadows the parameter
    scope.create("x", ParamType::Number(6.0)).unwrap();
    assert_eq!(scope.get("x"), Ok(ParamType::Number(6.0)));
}

#[test]
fn test_field_on_number_is_invalid() {
    let scope = Memory::root();
    scope.create("n", ParamType::Number(1.0)).unwrap();
    assert!(matches!(
        scope.get("n.x"),
        Err(TurtleError::InvalidPath { .. })
    ));
}

#[test]
fn test_huge_index_is_rejected() {
    let scope = Memory::root();
    for path in ["a[1e300]", "a[1e12]", "a[1000001]"] {
        let result = scope.create(path, ParamType::Number(5.0));
        assert!(
            matches!(result, Err(TurtleError::InvalidPath { .. })),
            "{} gave {:?}",
            path,
            result
        );
    }
    assert!(!scope.owns("a"));
}

#[test]
fn test_index_at_limit_is_accepted() {
    let scope = Memory::root();
    let last = turtlescript::interp::memory::MAX_INDEX;
    scope
        .create(&format!("row[{}]", last), ParamType::Number(1.0))
        .unwrap();
    assert_eq!(
        scope.get(&format!("row[{}]", last)),
        Ok(ParamType::Number(1.0))
    );
}

#[test]
fn test_unclosed_name_reference() {
    let scope = Memory::root();
    scope.create("key", ParamType::text("x")).unwrap();
    assert_eq!(
        scope.create("<key", ParamType::Number(1.0)),
        Err(TurtleError::InvalidPath {
            path: "<key".to_string(),
            reason: "unclosed `<name>`".to_string()
        })
    );
    scope.create("<key>", ParamType::Number(1.0)).unwrap();
    assert_eq!(scope.get("x"), Ok(ParamType::Number(1.0)));
}
