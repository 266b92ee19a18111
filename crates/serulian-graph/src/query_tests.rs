use crate::store::{GraphStore, KindToken, Layer, NodeId, PredicateToken, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
enum K {
    Module = 0,
    Type,
    Member,
}

impl KindToken for K {
    const LAYER: Layer = Layer::TypeDefinition;

    fn to_raw(self) -> u16 {
        self as u16
    }

    fn from_raw(raw: u16) -> Self {
        match raw {
            0 => K::Module,
            1 => K::Type,
            2 => K::Member,
            _ => panic!("bad kind"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
enum P {
    Decl = 0,
    Member,
    Name,
}

impl PredicateToken for P {
    const LAYER: Layer = Layer::TypeDefinition;

    fn to_raw(self) -> u16 {
        self as u16
    }

    fn from_raw(raw: u16) -> Self {
        match raw {
            0 => P::Decl,
            1 => P::Member,
            2 => P::Name,
            _ => panic!("bad predicate"),
        }
    }

    fn name(self) -> &'static str {
        match self {
            P::Decl => "decl",
            P::Member => "member",
            P::Name => "name",
        }
    }
}

/// module -> [TypeA { foo, bar }, TypeB { foo }]
fn build_fixture(store: &GraphStore) -> (NodeId, NodeId, NodeId) {
    let mut modifier = store.modifier();

    let module = modifier.create_node(K::Module);

    let type_a = modifier.create_node(K::Type);
    modifier.decorate(type_a, P::Name, "TypeA");
    modifier.connect(module, P::Decl, type_a);

    let type_b = modifier.create_node(K::Type);
    modifier.decorate(type_b, P::Name, "TypeB");
    modifier.connect(module, P::Decl, type_b);

    for (owner, name) in [(type_a, "foo"), (type_a, "bar"), (type_b, "foo")] {
        let member = modifier.create_node(K::Member);
        modifier.decorate(member, P::Name, name);
        modifier.connect(owner, P::Member, member);
    }

    modifier.apply();
    (module, type_a, type_b)
}

#[test]
fn out_single_step_fast_path() {
    let store = GraphStore::new();
    let (module, type_a, type_b) = build_fixture(&store);

    let decls = store.from_node(module).out(&[P::Decl]).node_ids();
    assert_eq!(decls, vec![type_a, type_b]);
}

#[test]
fn in_single_step_fast_path() {
    let store = GraphStore::new();
    let (module, type_a, _) = build_fixture(&store);

    let owners = store.from_node(type_a).in_(&[P::Decl]).node_ids();
    assert_eq!(owners, vec![module]);
}

#[test]
fn multi_step_with_has() {
    let store = GraphStore::new();
    let (module, type_a, type_b) = build_fixture(&store);

    // Types under the module that define a member named "bar".
    let found = store
        .from_node(module)
        .out(&[P::Decl])
        .has(P::Member, Vec::new())
        .filter_by(move |store, node| {
            store
                .from_node(node)
                .out(&[P::Member])
                .has(P::Name, vec![Value::from("bar")])
                .try_get_node()
                .is_some()
        })
        .node_ids();

    assert_eq!(found, vec![type_a]);
    assert_ne!(found, vec![type_b]);
}

#[test]
fn is_kind_filters() {
    let store = GraphStore::new();
    let (module, type_a, type_b) = build_fixture(&store);

    let types = store
        .from_node(module)
        .out(&[P::Decl])
        .is_kind(&[K::Type])
        .node_ids();
    assert_eq!(types, vec![type_a, type_b]);

    let members = store
        .from_node(module)
        .out(&[P::Decl])
        .is_kind(&[K::Member])
        .node_ids();
    assert!(members.is_empty());
}

#[test]
fn find_nodes_of_kind_start() {
    let store = GraphStore::new();
    let (_, type_a, type_b) = build_fixture(&store);

    let types = store.find_nodes_of_kind(&[K::Type]).node_ids();
    assert_eq!(types, vec![type_a, type_b]);
}

#[test]
fn saved_predicates_materialized() {
    let store = GraphStore::new();
    let (module, _, _) = build_fixture(&store);

    let mut names = Vec::new();
    let iterator = store
        .from_node(module)
        .out(&[P::Decl])
        .build_node_iterator_with(&[P::Name]);
    for found in iterator {
        assert_eq!(found.kind::<K>(), K::Type);
        names.push(found.value(P::Name).unwrap().as_str().unwrap().to_owned());
    }

    assert_eq!(names, vec!["TypeA", "TypeB"]);
}

#[test]
fn missing_saved_predicate_drops_node() {
    let store = GraphStore::new();
    let (module, type_a, _) = build_fixture(&store);

    // Members have no P::Decl edge, so saving it drops all of them.
    let found: Vec<_> = store
        .from_node(type_a)
        .out(&[P::Member])
        .build_node_iterator_with(&[P::Decl])
        .collect();
    assert!(found.is_empty());

    let kept: Vec<_> = store
        .from_node(module)
        .out(&[P::Decl])
        .build_node_iterator_with(&[P::Name])
        .collect();
    assert_eq!(kept.len(), 2);
}

#[test]
fn results_deduplicated() {
    let store = GraphStore::new();
    let (module, type_a, type_b) = build_fixture(&store);

    // Walking out then back in revisits the module once per type.
    let modules = store
        .from_nodes(vec![type_a, type_b])
        .in_(&[P::Decl])
        .node_ids();
    assert_eq!(modules, vec![module]);
}

#[test]
fn values_start_set() {
    let store = GraphStore::new();
    let (_, type_a, type_b) = build_fixture(&store);

    // All members named "foo", found by starting at the value itself.
    let members = store
        .from_values(vec![Value::from("foo")])
        .in_(&[P::Name])
        .is_kind(&[K::Member])
        .node_ids();
    assert_eq!(members.len(), 2);

    let owners: Vec<_> = members
        .into_iter()
        .flat_map(|member| store.from_node(member).in_(&[P::Member]).node_ids())
        .collect();
    assert_eq!(owners, vec![type_a, type_b]);
}
