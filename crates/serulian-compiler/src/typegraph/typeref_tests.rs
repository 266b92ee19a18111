use serulian_graph::GraphStore;

use super::test_constructor::{TestGeneric, TestMember, TestType, TestTypeConstructor};
use super::{TgKind, TypeGraph, TypeReference, build_type_graph};

fn build<'g>(store: &'g GraphStore, constructor: &TestTypeConstructor) -> TypeGraph<'g> {
    let (tg, diagnostics) = build_type_graph(store, &[constructor]);
    assert!(!diagnostics.has_errors(), "diagnostics: {diagnostics:?}");
    tg
}

fn basic_fixture() -> TestTypeConstructor {
    TestTypeConstructor::new(
        "test.seru",
        vec![
            TestType {
                kind: TgKind::Class,
                name: "SomeClass",
                parent: None,
                generics: vec![],
                members: vec![
                    TestMember::function("DoSomething", "int", vec![]),
                    TestMember::value("SomeValue", "string"),
                ],
            },
            TestType {
                kind: TgKind::Interface,
                name: "IDoer",
                parent: None,
                generics: vec![],
                members: vec![TestMember::function("DoSomething", "int", vec![])],
            },
            TestType {
                kind: TgKind::Interface,
                name: "IStringDoer",
                parent: None,
                generics: vec![],
                members: vec![TestMember::function("DoSomething", "string", vec![])],
            },
            TestType {
                kind: TgKind::Class,
                name: "OtherClass",
                parent: None,
                generics: vec![],
                members: vec![],
            },
        ],
    )
}

#[test]
fn subtype_reflexivity_and_any() {
    let store = GraphStore::new();
    let tg = build(&store, &basic_fixture());

    let some_class = TypeReference::normal(tg.find_type("test.seru", "SomeClass").unwrap());

    // ∀ t: t <: t and t <: any.
    assert!(some_class.check_subtype_of(&some_class, &tg).is_ok());
    assert!(some_class.check_subtype_of(&TypeReference::Any, &tg).is_ok());
    assert!(
        TypeReference::Any
            .check_subtype_of(&TypeReference::Any, &tg)
            .is_ok()
    );

    // any <: t fails for t != any.
    assert!(TypeReference::Any.check_subtype_of(&some_class, &tg).is_err());
}

#[test]
fn void_has_no_subtype_relationships() {
    let store = GraphStore::new();
    let tg = build(&store, &basic_fixture());
    let some_class = TypeReference::normal(tg.find_type("test.seru", "SomeClass").unwrap());

    assert!(TypeReference::Void.check_subtype_of(&some_class, &tg).is_err());
    assert!(some_class.check_subtype_of(&TypeReference::Void, &tg).is_err());
    assert!(
        TypeReference::Void
            .check_subtype_of(&TypeReference::Any, &tg)
            .is_err()
    );
}

#[test]
fn null_rules() {
    let store = GraphStore::new();
    let tg = build(&store, &basic_fixture());
    let some_class = TypeReference::normal(tg.find_type("test.seru", "SomeClass").unwrap());

    // null <: t iff t is nullable or any.
    assert!(
        TypeReference::Null
            .check_subtype_of(&some_class.as_nullable(), &tg)
            .is_ok()
    );
    assert!(
        TypeReference::Null
            .check_subtype_of(&TypeReference::Any, &tg)
            .is_ok()
    );
    assert!(TypeReference::Null.check_subtype_of(&some_class, &tg).is_err());

    // Nothing is a subtype of null.
    assert!(
        some_class
            .check_subtype_of(&TypeReference::Null, &tg)
            .is_err()
    );
}

#[test]
fn nullability_is_one_way() {
    let store = GraphStore::new();
    let tg = build(&store, &basic_fixture());
    let some_class = TypeReference::normal(tg.find_type("test.seru", "SomeClass").unwrap());

    // Non-nullable <: nullable, never the converse.
    assert!(
        some_class
            .check_subtype_of(&some_class.as_nullable(), &tg)
            .is_ok()
    );
    assert!(
        some_class
            .as_nullable()
            .check_subtype_of(&some_class, &tg)
            .is_err()
    );
}

#[test]
fn classes_match_only_themselves() {
    let store = GraphStore::new();
    let tg = build(&store, &basic_fixture());
    let some_class = TypeReference::normal(tg.find_type("test.seru", "SomeClass").unwrap());
    let other_class = TypeReference::normal(tg.find_type("test.seru", "OtherClass").unwrap());

    assert!(some_class.check_subtype_of(&other_class, &tg).is_err());
    assert!(other_class.check_subtype_of(&some_class, &tg).is_err());
}

#[test]
fn structural_interface_conformance() {
    let store = GraphStore::new();
    let tg = build(&store, &basic_fixture());
    let some_class = TypeReference::normal(tg.find_type("test.seru", "SomeClass").unwrap());
    let doer = TypeReference::normal(tg.find_type("test.seru", "IDoer").unwrap());
    let string_doer =
        TypeReference::normal(tg.find_type("test.seru", "IStringDoer").unwrap());

    // SomeClass declares DoSomething() -> int, so it conforms to IDoer.
    assert!(some_class.check_subtype_of(&doer, &tg).is_ok());

    // It does not conform to the same member with a different signature.
    let err = some_class.check_subtype_of(&string_doer, &tg).unwrap_err();
    assert!(
        err.to_string().contains("does not have the same signature"),
        "unexpected message: {err}"
    );

    // An interface missing from the class entirely reports the member name.
    let other_class = TypeReference::normal(tg.find_type("test.seru", "OtherClass").unwrap());
    let err = other_class.check_subtype_of(&doer, &tg).unwrap_err();
    assert!(
        err.to_string().contains("does not define or export member 'DoSomething'"),
        "unexpected message: {err}"
    );
}

#[test]
fn canonicity_equal_iff_mutual_subtypes() {
    let store = GraphStore::new();
    let tg = build(&store, &basic_fixture());
    let some_class = TypeReference::normal(tg.find_type("test.seru", "SomeClass").unwrap());
    let doer = TypeReference::normal(tg.find_type("test.seru", "IDoer").unwrap());

    // Equal references are mutual subtypes.
    assert!(some_class.check_subtype_of(&some_class.clone(), &tg).is_ok());

    // SomeClass <: IDoer structurally, but not the converse, and the
    // references are not equal.
    assert!(some_class.check_subtype_of(&doer, &tg).is_ok());
    assert!(doer.check_subtype_of(&some_class, &tg).is_err());
    assert_ne!(some_class, doer);
}

fn generic_fixture() -> TestTypeConstructor {
    TestTypeConstructor::new(
        "generics.seru",
        vec![
            TestType {
                kind: TgKind::Class,
                name: "Holder",
                parent: None,
                generics: vec![TestGeneric {
                    name: "T",
                    constraint: None,
                }],
                members: vec![TestMember::function("Get", "Holder::T", vec![])],
            },
            TestType {
                kind: TgKind::Interface,
                name: "IGetter",
                parent: None,
                generics: vec![TestGeneric {
                    name: "Q",
                    constraint: None,
                }],
                members: vec![TestMember::function("Get", "IGetter::Q", vec![])],
            },
        ],
    )
}

#[test]
fn generic_substitution_and_replace() {
    let store = GraphStore::new();
    let tg = build(&store, &generic_fixture());

    let holder = tg.find_type("generics.seru", "Holder").unwrap();
    let generic = tg.generics_of(holder)[0];
    let int_ref = tg.int_type_reference();

    let open = tg.new_instance_type_reference(holder);
    let closed = open.replace_type(generic, &int_ref);
    assert_eq!(closed, tg.new_type_reference(holder, vec![int_ref.clone()]));

    // Substitution commutes with nullable wrapping.
    assert_eq!(
        open.replace_type(generic, &int_ref).as_nullable(),
        open.as_nullable().replace_type(generic, &int_ref)
    );

    // Nullable occurrences take the nullable form of the replacement.
    let nullable_generic = TypeReference::normal(generic).as_nullable();
    assert_eq!(
        nullable_generic.replace_type(generic, &int_ref),
        int_ref.as_nullable()
    );
}

#[test]
fn localize_alpha_converts_generics() {
    let store = GraphStore::new();
    let tg = build(&store, &generic_fixture());

    let holder = tg.find_type("generics.seru", "Holder").unwrap();
    let getter = tg.find_type("generics.seru", "IGetter").unwrap();
    let holder_generic = tg.generics_of(holder)[0];
    let getter_generic = tg.generics_of(getter)[0];

    // function<T> and function<Q> differ until localized.
    let holder_member_type = tg.function_type_reference(TypeReference::normal(holder_generic));
    let getter_member_type = tg.function_type_reference(TypeReference::normal(getter_generic));
    assert_ne!(holder_member_type, getter_member_type);

    assert_eq!(
        holder_member_type.localize(&[holder_generic]),
        getter_member_type.localize(&[getter_generic])
    );
}

#[test]
fn transform_under_substitutes_generics() {
    let store = GraphStore::new();
    let tg = build(&store, &generic_fixture());

    let holder = tg.find_type("generics.seru", "Holder").unwrap();
    let generic = tg.generics_of(holder)[0];
    let int_ref = tg.int_type_reference();

    let member_type = tg.function_type_reference(TypeReference::normal(generic));
    let closed_holder = tg.new_type_reference(holder, vec![int_ref.clone()]);

    assert_eq!(
        member_type.transform_under(&closed_holder, &tg),
        tg.function_type_reference(int_ref)
    );
}

#[test]
fn extract_type_diff() {
    let store = GraphStore::new();
    let tg = build(&store, &generic_fixture());

    let holder = tg.find_type("generics.seru", "Holder").unwrap();
    let generic = tg.generics_of(holder)[0];
    let int_ref = tg.int_type_reference();

    let open = tg.new_instance_type_reference(holder);
    let closed = tg.new_type_reference(holder, vec![int_ref.clone()]);

    assert_eq!(closed.extract_type_diff(&open, generic), Some(int_ref));

    // No diff when the generic does not occur.
    let other = tg.find_type("generics.seru", "IGetter").unwrap();
    let other_generic = tg.generics_of(other)[0];
    assert_eq!(closed.extract_type_diff(&open, other_generic), None);
}

#[test]
fn concrete_subtype_inference() {
    let store = GraphStore::new();
    let tg = build(&store, &generic_fixture());

    let holder = tg.find_type("generics.seru", "Holder").unwrap();
    let getter = tg.find_type("generics.seru", "IGetter").unwrap();
    let int_ref = tg.int_type_reference();

    // Holder<int> implements IGetter<Q> with Q inferred as int.
    let closed = tg.new_type_reference(holder, vec![int_ref.clone()]);
    let inferred = closed.check_concrete_subtype_of(getter, &tg).unwrap();
    assert_eq!(inferred, vec![int_ref]);
}

#[test]
fn intersect_behavior() {
    let store = GraphStore::new();
    let tg = build(&store, &basic_fixture());
    let some_class = TypeReference::normal(tg.find_type("test.seru", "SomeClass").unwrap());
    let other_class = TypeReference::normal(tg.find_type("test.seru", "OtherClass").unwrap());
    let doer = TypeReference::normal(tg.find_type("test.seru", "IDoer").unwrap());

    // Void is the identity.
    assert_eq!(TypeReference::Void.intersect(&some_class, &tg), some_class);
    assert_eq!(some_class.intersect(&TypeReference::Void, &tg), some_class);

    // Equal types intersect to themselves.
    assert_eq!(some_class.intersect(&some_class.clone(), &tg), some_class);

    // A type and an interface it implements intersect to the interface.
    assert_eq!(some_class.intersect(&doer, &tg), doer);

    // Unrelated types fall back to any.
    assert_eq!(some_class.intersect(&other_class, &tg), TypeReference::Any);

    // Nullability is aligned before comparing.
    assert_eq!(
        some_class.as_nullable().intersect(&some_class, &tg),
        some_class.as_nullable()
    );
}

#[test]
fn nominal_conversion_walks_parent_chain() {
    let store = GraphStore::new();
    let constructor = TestTypeConstructor::new(
        "nominal.seru",
        vec![
            TestType {
                kind: TgKind::Nominal,
                name: "Celsius",
                parent: Some("int"),
                generics: vec![],
                members: vec![],
            },
            TestType {
                kind: TgKind::Nominal,
                name: "Boiling",
                parent: Some("Celsius"),
                generics: vec![],
                members: vec![],
            },
            TestType {
                kind: TgKind::Class,
                name: "Unrelated",
                parent: None,
                generics: vec![],
                members: vec![],
            },
        ],
    );
    let tg = build(&store, &constructor);

    let celsius = TypeReference::normal(tg.find_type("nominal.seru", "Celsius").unwrap());
    let boiling = TypeReference::normal(tg.find_type("nominal.seru", "Boiling").unwrap());
    let unrelated = TypeReference::normal(tg.find_type("nominal.seru", "Unrelated").unwrap());
    let int_ref = tg.int_type_reference();

    // Nominal and its base convert both ways; transitive bases work too.
    assert!(celsius.check_nominal_convertable(&int_ref, &tg).is_ok());
    assert!(int_ref.check_nominal_convertable(&celsius, &tg).is_ok());
    assert!(boiling.check_nominal_convertable(&int_ref, &tg).is_ok());

    assert!(celsius.check_nominal_convertable(&unrelated, &tg).is_err());
}

#[test]
fn verify_checks_arity_and_constraints() {
    let store = GraphStore::new();
    let constructor = TestTypeConstructor::new(
        "verify.seru",
        vec![
            TestType {
                kind: TgKind::Interface,
                name: "Stringish",
                parent: None,
                generics: vec![],
                members: vec![TestMember::function("Render", "string", vec![])],
            },
            TestType {
                kind: TgKind::Class,
                name: "Box",
                parent: None,
                generics: vec![TestGeneric {
                    name: "T",
                    constraint: Some("Stringish"),
                }],
                members: vec![],
            },
            TestType {
                kind: TgKind::Class,
                name: "Renderable",
                parent: None,
                generics: vec![],
                members: vec![TestMember::function("Render", "string", vec![])],
            },
        ],
    );
    let tg = build(&store, &constructor);

    let box_type = tg.find_type("verify.seru", "Box").unwrap();
    let renderable = TypeReference::normal(tg.find_type("verify.seru", "Renderable").unwrap());

    // Arity mismatch.
    assert!(TypeReference::normal(box_type).verify(&tg).is_err());

    // Satisfied constraint.
    let closed = tg.new_type_reference(box_type, vec![renderable]);
    assert!(closed.verify(&tg).is_ok());

    // Violated constraint.
    let bad = tg.new_type_reference(box_type, vec![tg.int_type_reference()]);
    let err = bad.verify(&tg).unwrap_err();
    assert!(err.to_string().contains("does not match"), "got: {err}");
}

#[test]
fn display_renders_human_form() {
    let store = GraphStore::new();
    let tg = build(&store, &generic_fixture());

    let holder = tg.find_type("generics.seru", "Holder").unwrap();
    let closed = tg.new_type_reference(
        holder,
        vec![tg.int_type_reference().as_nullable()],
    );

    assert_eq!(closed.display(&tg), "Holder<int?>");
    assert_eq!(closed.as_nullable().display(&tg), "Holder<int?>?");
    assert_eq!(TypeReference::Any.display(&tg), "any");
    assert_eq!(
        tg.function_type_reference(TypeReference::Void).display(&tg),
        "function<void>"
    );
}
