use serde::{Deserialize, Serialize};

use crate::store::{GraphStore, KindToken, Layer, PredicateToken, Value};
use crate::tagged::TaggedValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
enum TestKind {
    File = 0,
    Decl,
}

impl KindToken for TestKind {
    const LAYER: Layer = Layer::SourceRepresentation;

    fn to_raw(self) -> u16 {
        self as u16
    }

    fn from_raw(raw: u16) -> Self {
        match raw {
            0 => TestKind::File,
            1 => TestKind::Decl,
            _ => panic!("bad kind"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
enum TestPredicate {
    Child = 0,
    Name,
    Extra,
}

impl PredicateToken for TestPredicate {
    const LAYER: Layer = Layer::SourceRepresentation;

    fn to_raw(self) -> u16 {
        self as u16
    }

    fn from_raw(raw: u16) -> Self {
        match raw {
            0 => TestPredicate::Child,
            1 => TestPredicate::Name,
            2 => TestPredicate::Extra,
            _ => panic!("bad predicate"),
        }
    }

    fn name(self) -> &'static str {
        match self {
            TestPredicate::Child => "child",
            TestPredicate::Name => "name",
            TestPredicate::Extra => "extra",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Payload {
    count: u32,
}

impl TaggedValue for Payload {
    const TAG: &'static str = "test-payload";
}

#[test]
fn create_and_read_back() {
    let store = GraphStore::new();
    let mut modifier = store.modifier();

    let file = modifier.create_node(TestKind::File);
    let decl = modifier.create_node(TestKind::Decl);
    modifier.decorate(decl, TestPredicate::Name, "SomeClass");
    modifier.connect(file, TestPredicate::Child, decl);
    modifier.apply();

    assert_eq!(store.kind_of::<TestKind>(file), TestKind::File);
    assert_eq!(store.kind_of::<TestKind>(decl), TestKind::Decl);
    assert_eq!(
        store.get_str(decl, TestPredicate::Name).as_deref(),
        Some("SomeClass")
    );
    assert_eq!(store.get_node(file, TestPredicate::Child), Some(decl));
}

#[test]
fn modifier_edits_invisible_until_apply() {
    let store = GraphStore::new();

    let mut first = store.modifier();
    let file = first.create_node(TestKind::File);
    first.apply();

    let mut second = store.modifier();
    let decl = second.create_node(TestKind::Decl);
    second.connect(file, TestPredicate::Child, decl);

    // Nothing from the second batch is observable yet.
    assert_eq!(store.node_count(), 1);
    assert_eq!(store.get_node(file, TestPredicate::Child), None);

    second.apply();
    assert_eq!(store.node_count(), 2);
    assert_eq!(store.get_node(file, TestPredicate::Child), Some(decl));
}

#[test]
fn multiple_edges_same_predicate() {
    let store = GraphStore::new();
    let mut modifier = store.modifier();

    let file = modifier.create_node(TestKind::File);
    let a = modifier.create_node(TestKind::Decl);
    let b = modifier.create_node(TestKind::Decl);
    modifier.connect(file, TestPredicate::Child, a);
    modifier.connect(file, TestPredicate::Child, b);
    modifier.apply();

    let children = store.get_all(file, TestPredicate::Child);
    assert_eq!(children, vec![Value::Node(a), Value::Node(b)]);
}

#[test]
fn incoming_edges() {
    let store = GraphStore::new();
    let mut modifier = store.modifier();

    let file = modifier.create_node(TestKind::File);
    let decl = modifier.create_node(TestKind::Decl);
    modifier.connect(file, TestPredicate::Child, decl);
    modifier.apply();

    assert_eq!(store.incoming(decl, TestPredicate::Child), vec![file]);
    assert!(store.incoming(file, TestPredicate::Child).is_empty());
}

#[test]
fn nodes_of_kind_in_creation_order() {
    let store = GraphStore::new();
    let mut modifier = store.modifier();

    let a = modifier.create_node(TestKind::Decl);
    let _file = modifier.create_node(TestKind::File);
    let b = modifier.create_node(TestKind::Decl);
    modifier.apply();

    assert_eq!(store.nodes_of_kind(TestKind::Decl), vec![a, b]);
}

#[test]
fn tagged_value_roundtrip() {
    let store = GraphStore::new();
    let mut modifier = store.modifier();

    let decl = modifier.create_node(TestKind::Decl);
    modifier.decorate_tagged(decl, TestPredicate::Extra, &Payload { count: 42 });
    modifier.apply();

    let decoded: Payload = store
        .get_tagged(decl, TestPredicate::Extra)
        .expect("payload present");
    assert_eq!(decoded, Payload { count: 42 });
}

#[test]
fn batched_nodes_can_reference_each_other() {
    let store = GraphStore::new();
    let mut modifier = store.modifier();

    let parent = modifier.create_node(TestKind::File);
    let child = modifier.create_node(TestKind::Decl);
    modifier.connect(parent, TestPredicate::Child, child);
    modifier.connect(child, TestPredicate::Child, parent);
    modifier.apply();

    assert_eq!(store.get_node(parent, TestPredicate::Child), Some(child));
    assert_eq!(store.get_node(child, TestPredicate::Child), Some(parent));
}
