//! The synthetic core types.
//!
//! `any`, `void`, and `null` are special reference variants; everything else
//! here is a real type node with no SRG source: the primitive nominals
//! (`bool`, `int`, `float`, `string`), the generic built-ins (`function<T>`,
//! `stream<T>`, `slice<T>`, `mapping<T>`), and their operators.

use serulian_graph::GraphStore;
use serulian_graph::store::NodeId;

use super::signature::MemberSignature;
use super::typeref::TypeReference;
use super::{TgKind, TgPredicate};

/// Handles to the built-in type nodes.
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub core_module: NodeId,
    pub bool_type: NodeId,
    pub int_type: NodeId,
    pub float_type: NodeId,
    pub string_type: NodeId,
    pub function_type: NodeId,
    pub stream_type: NodeId,
    pub slice_type: NodeId,
    pub mapping_type: NodeId,
}

impl Builtins {
    /// Whether the node is one of the primitive nominal types.
    pub fn is_primitive(&self, node: NodeId) -> bool {
        node == self.bool_type
            || node == self.int_type
            || node == self.float_type
            || node == self.string_type
    }

    /// Resolves a built-in type by its source-level name.
    pub fn by_name(&self, name: &str) -> Option<NodeId> {
        match name {
            "bool" => Some(self.bool_type),
            "int" => Some(self.int_type),
            "float" => Some(self.float_type),
            "string" => Some(self.string_type),
            "function" => Some(self.function_type),
            "stream" => Some(self.stream_type),
            "slice" => Some(self.slice_type),
            "mapping" => Some(self.mapping_type),
            _ => None,
        }
    }
}

struct OperatorSpec {
    name: &'static str,
    native: bool,
    /// Parameter count; parameters and return default to the owning type.
    parameter_count: usize,
    /// Overrides the return type.
    returns: Returns,
}

enum Returns {
    SelfType,
    Bool,
    Int,
    StreamOfSelf,
}

/// Creates the built-in types. Runs before any constructor passes so user
/// types can reference them.
pub(super) fn define_builtins(store: &GraphStore) -> Builtins {
    let mut modifier = store.modifier();

    let core_module = modifier.create_node(TgKind::Module);
    modifier.decorate(core_module, TgPredicate::ModulePath, "@core");

    fn new_type(
        modifier: &mut serulian_graph::Modifier<'_>,
        core_module: NodeId,
        kind: TgKind,
        name: &str,
    ) -> NodeId {
        let type_node = modifier.create_node(kind);
        modifier.decorate(type_node, TgPredicate::TypeName, name);
        modifier.connect(type_node, TgPredicate::TypeModule, core_module);
        type_node
    }

    let bool_type = new_type(&mut modifier, core_module, TgKind::Nominal, "bool");
    let int_type = new_type(&mut modifier, core_module, TgKind::Nominal, "int");
    let float_type = new_type(&mut modifier, core_module, TgKind::Nominal, "float");
    let string_type = new_type(&mut modifier, core_module, TgKind::Nominal, "string");
    let function_type = new_type(&mut modifier, core_module, TgKind::Class, "function");
    let stream_type = new_type(&mut modifier, core_module, TgKind::Interface, "stream");
    let slice_type = new_type(&mut modifier, core_module, TgKind::Class, "slice");
    let mapping_type = new_type(&mut modifier, core_module, TgKind::Class, "mapping");

    // Generic parameters for the generic built-ins.
    for (owner, generic_name) in [
        (function_type, "T"),
        (stream_type, "T"),
        (slice_type, "T"),
        (mapping_type, "T"),
    ] {
        let generic = modifier.create_node(TgKind::Generic);
        modifier.decorate(generic, TgPredicate::GenericName, generic_name);
        modifier.decorate(generic, TgPredicate::GenericIndex, 0i64);
        modifier.connect(owner, TgPredicate::TypeGeneric, generic);
    }

    modifier.apply();

    let builtins = Builtins {
        core_module,
        bool_type,
        int_type,
        float_type,
        string_type,
        function_type,
        stream_type,
        slice_type,
        mapping_type,
    };

    define_builtin_operators(store, &builtins);
    builtins
}

const NUMERIC_OPERATORS: &[OperatorSpec] = &[
    OperatorSpec { name: "plus", native: true, parameter_count: 2, returns: Returns::SelfType },
    OperatorSpec { name: "minus", native: true, parameter_count: 2, returns: Returns::SelfType },
    OperatorSpec { name: "times", native: true, parameter_count: 2, returns: Returns::SelfType },
    // Integer division requires flooring, so `div` is never native; float
    // shares this table and overrides below.
    OperatorSpec { name: "div", native: false, parameter_count: 2, returns: Returns::SelfType },
    OperatorSpec { name: "mod", native: true, parameter_count: 2, returns: Returns::SelfType },
    OperatorSpec { name: "compare", native: true, parameter_count: 2, returns: Returns::Int },
    OperatorSpec { name: "equals", native: true, parameter_count: 2, returns: Returns::Bool },
];

const INT_ONLY_OPERATORS: &[OperatorSpec] = &[
    OperatorSpec { name: "range", native: false, parameter_count: 2, returns: Returns::StreamOfSelf },
    OperatorSpec { name: "and", native: true, parameter_count: 2, returns: Returns::SelfType },
    OperatorSpec { name: "or", native: true, parameter_count: 2, returns: Returns::SelfType },
    OperatorSpec { name: "xor", native: true, parameter_count: 2, returns: Returns::SelfType },
    OperatorSpec { name: "leftshift", native: true, parameter_count: 2, returns: Returns::SelfType },
    OperatorSpec { name: "rightshift", native: true, parameter_count: 2, returns: Returns::SelfType },
    OperatorSpec { name: "not", native: true, parameter_count: 1, returns: Returns::SelfType },
];

const STRING_OPERATORS: &[OperatorSpec] = &[
    OperatorSpec { name: "plus", native: true, parameter_count: 2, returns: Returns::SelfType },
    OperatorSpec { name: "equals", native: true, parameter_count: 2, returns: Returns::Bool },
    OperatorSpec { name: "compare", native: true, parameter_count: 2, returns: Returns::Int },
    OperatorSpec { name: "index", native: false, parameter_count: 1, returns: Returns::SelfType },
    OperatorSpec { name: "slice", native: false, parameter_count: 2, returns: Returns::SelfType },
];

const BOOL_OPERATORS: &[OperatorSpec] = &[
    OperatorSpec { name: "equals", native: true, parameter_count: 2, returns: Returns::Bool },
];

fn define_builtin_operators(store: &GraphStore, builtins: &Builtins) {
    let mut modifier = store.modifier();

    let specs: &[(NodeId, &[OperatorSpec])] = &[
        (builtins.int_type, NUMERIC_OPERATORS),
        (builtins.int_type, INT_ONLY_OPERATORS),
        (builtins.float_type, NUMERIC_OPERATORS),
        (builtins.string_type, STRING_OPERATORS),
        (builtins.bool_type, BOOL_OPERATORS),
    ];

    for (owner, operators) in specs {
        for spec in *operators {
            // Float division is native; only int division carries the
            // flooring carve-out.
            let native =
                spec.native || (spec.name == "div" && *owner == builtins.float_type);

            let self_ref = TypeReference::normal(*owner);
            let return_type = match spec.returns {
                Returns::SelfType => self_ref.clone(),
                Returns::Bool => TypeReference::normal(builtins.bool_type),
                Returns::Int => TypeReference::normal(builtins.int_type),
                Returns::StreamOfSelf => {
                    TypeReference::normal(builtins.stream_type).with_generic(self_ref.clone())
                }
            };

            let mut member_type = TypeReference::normal(builtins.function_type)
                .with_generic(return_type.clone());
            for _ in 0..spec.parameter_count {
                member_type = member_type.with_parameter(self_ref.clone());
            }

            let operator = modifier.create_node(TgKind::Operator);
            modifier.decorate(operator, TgPredicate::MemberName, spec.name);
            modifier.decorate_tagged(operator, TgPredicate::MemberType, &member_type);
            modifier.decorate_tagged(operator, TgPredicate::MemberReturnType, &return_type);
            modifier.decorate(
                operator,
                TgPredicate::MemberSignature,
                MemberSignature::new(member_type, Vec::new()).serialize_value(),
            );
            modifier.decorate(operator, TgPredicate::MemberStatic, "true");
            modifier.decorate(operator, TgPredicate::MemberExported, "true");
            if native {
                modifier.decorate(operator, TgPredicate::MemberNative, "true");
            }
            modifier.connect(*owner, TgPredicate::TypeOperator, operator);
        }
    }

    // stream<T>.Next() -> T?
    {
        let stream_generic = store
            .from_node(builtins.stream_type)
            .out(&[TgPredicate::TypeGeneric])
            .get_node();
        let generic_ref = TypeReference::normal(stream_generic).as_nullable();
        let member_type =
            TypeReference::normal(builtins.function_type).with_generic(generic_ref.clone());

        let next_member = modifier.create_node(TgKind::Member);
        modifier.decorate(next_member, TgPredicate::MemberName, "Next");
        modifier.decorate_tagged(next_member, TgPredicate::MemberType, &member_type);
        modifier.decorate_tagged(next_member, TgPredicate::MemberReturnType, &generic_ref);
        modifier.decorate(
            next_member,
            TgPredicate::MemberSignature,
            MemberSignature::new(member_type, Vec::new()).serialize_value(),
        );
        modifier.decorate(next_member, TgPredicate::MemberExported, "true");
        modifier.connect(builtins.stream_type, TgPredicate::TypeMember, next_member);
    }

    // slice<T> and mapping<T> indexers.
    for (owner, key_type, nullable_value) in [
        (builtins.slice_type, builtins.int_type, false),
        (builtins.mapping_type, builtins.string_type, true),
    ] {
        let generic = store
            .from_node(owner)
            .out(&[TgPredicate::TypeGeneric])
            .get_node();
        let value_ref = if nullable_value {
            TypeReference::normal(generic).as_nullable()
        } else {
            TypeReference::normal(generic)
        };
        let member_type = TypeReference::normal(builtins.function_type)
            .with_generic(value_ref.clone())
            .with_parameter(TypeReference::normal(key_type));

        let indexer = modifier.create_node(TgKind::Operator);
        modifier.decorate(indexer, TgPredicate::MemberName, "index");
        modifier.decorate_tagged(indexer, TgPredicate::MemberType, &member_type);
        modifier.decorate_tagged(indexer, TgPredicate::MemberReturnType, &value_ref);
        modifier.decorate(
            indexer,
            TgPredicate::MemberSignature,
            MemberSignature::new(member_type, Vec::new()).serialize_value(),
        );
        modifier.decorate(indexer, TgPredicate::MemberStatic, "true");
        modifier.decorate(indexer, TgPredicate::MemberExported, "true");
        modifier.connect(owner, TgPredicate::TypeOperator, indexer);
    }

    modifier.apply();
}
