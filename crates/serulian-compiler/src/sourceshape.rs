//! Node kinds and predicates for the source representation graph.
//!
//! `SrgKind` tags every parsed node; `SrgPredicate` names every SRG edge.
//! Both are `repr(u16)` with a trailing sentinel so raw conversion is a
//! bounds check plus transmute.

use serulian_graph::store::{KindToken, Layer, PredicateToken};

/// All SRG node kinds: module structure, type definitions, members,
/// statements, and expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum SrgKind {
    // --- Module structure ---
    File = 0,
    Import,
    ImportPackage,

    // --- Type definitions ---
    Class,
    Interface,
    Nominal,
    Struct,
    Agent,
    Alias,
    Generic,

    // --- Members ---
    Variable,
    Field,
    Function,
    Constructor,
    Property,
    Operator,
    Parameter,

    // --- Type references ---
    TypeRefPath,
    TypeRefNullable,
    TypeRefStream,
    TypeRefAny,
    TypeRefVoid,

    // --- Statements ---
    StatementBlock,
    VariableStatement,
    ConditionalStatement,
    LoopStatement,
    WithStatement,
    MatchStatement,
    MatchCase,
    SwitchStatement,
    SwitchCase,
    ReturnStatement,
    RejectStatement,
    YieldStatement,
    BreakStatement,
    ContinueStatement,
    AssignStatement,
    ExpressionStatement,
    ArrowStatement,
    ResolveStatement,
    NamedValue,
    AssignedValue,

    // --- Access expressions ---
    IdentifierExpression,
    MemberAccessExpression,
    NullableMemberAccessExpression,
    DynamicMemberAccessExpression,
    StreamMemberAccessExpression,
    CastExpression,
    FunctionCallExpression,
    SliceExpression,
    GenericSpecifierExpression,

    // --- Operator expressions ---
    DefineRangeExpression,
    BinaryAddExpression,
    BinarySubtractExpression,
    BinaryMultiplyExpression,
    BinaryDivideExpression,
    BinaryModuloExpression,
    BitwiseAndExpression,
    BitwiseOrExpression,
    BitwiseXorExpression,
    BitwiseShiftLeftExpression,
    BitwiseShiftRightExpression,
    BitwiseNotExpression,
    BooleanAndExpression,
    BooleanOrExpression,
    BooleanNotExpression,
    KeywordNotExpression,
    ComparisonEqualsExpression,
    ComparisonNotEqualsExpression,
    ComparisonLTExpression,
    ComparisonLTEExpression,
    ComparisonGTExpression,
    ComparisonGTEExpression,
    NullComparisonExpression,
    IsComparisonExpression,
    InCollectionExpression,
    AssertNotNullExpression,
    RootTypeExpression,
    AwaitExpression,

    // --- Literal expressions ---
    BooleanLiteralExpression,
    NumericLiteralExpression,
    StringLiteralExpression,
    TemplateStringExpression,
    NullLiteralExpression,
    ThisLiteralExpression,
    ValLiteralExpression,
    ListLiteralExpression,
    MapLiteralExpression,
    MapLiteralEntry,
    StructuralNewExpression,
    StructuralNewEntry,
    LambdaExpression,

    // --- SML expressions ---
    SmlExpression,
    SmlAttribute,
    SmlText,

    /// Parser error recovery node.
    ErrorNode,

    #[doc(hidden)]
    __Last,
}

impl SrgKind {
    /// Whether this kind defines a type.
    pub fn is_type_definition(self) -> bool {
        matches!(
            self,
            SrgKind::Class
                | SrgKind::Interface
                | SrgKind::Nominal
                | SrgKind::Struct
                | SrgKind::Agent
                | SrgKind::Alias
        )
    }

    /// Whether this kind is a type member.
    pub fn is_member(self) -> bool {
        matches!(
            self,
            SrgKind::Variable
                | SrgKind::Field
                | SrgKind::Function
                | SrgKind::Constructor
                | SrgKind::Property
                | SrgKind::Operator
        )
    }

}

impl KindToken for SrgKind {
    const LAYER: Layer = Layer::SourceRepresentation;

    #[inline]
    fn to_raw(self) -> u16 {
        self as u16
    }

    #[inline]
    fn from_raw(raw: u16) -> Self {
        assert!(raw < SrgKind::__Last as u16);
        // SAFETY: bounds-checked above; SrgKind is repr(u16).
        unsafe { std::mem::transmute::<u16, SrgKind>(raw) }
    }
}

/// All SRG edge predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SrgPredicate {
    // --- Common decorations (every node) ---
    Source = 0,
    StartRune,
    EndRune,

    /// File or definition to its direct children.
    Child,

    // --- Imports ---
    ImportLocation,
    ImportSource,
    ImportPackageRef,
    ImportBindingName,
    ImportBindingSubsource,

    // --- Type definitions ---
    TypeName,
    TypeGeneric,
    TypeMember,
    TypeParentRef,
    TypeAliasRef,

    // --- Generics ---
    GenericName,
    GenericConstraintRef,

    // --- Members ---
    MemberName,
    MemberReturnTypeRef,
    MemberDeclaredTypeRef,
    MemberParameter,
    MemberGeneric,
    MemberBody,
    MemberExpression,
    OperatorName,
    PropertyGetter,
    PropertySetter,
    MemberReadOnly,

    // --- Parameters ---
    ParameterName,
    ParameterTypeRef,

    // --- Type references ---
    TypeRefPathName,
    TypeRefInner,
    TypeRefGenericArg,

    // --- Statements ---
    StatementChild,
    StatementLabel,
    VariableName,
    VariableDeclaredTypeRef,
    VariableExpression,
    ConditionalExpr,
    ConditionalThen,
    ConditionalElse,
    LoopExpr,
    LoopNamedValue,
    LoopBlock,
    WithExpr,
    WithNamedValue,
    WithBlock,
    MatchExpr,
    MatchNamedValue,
    MatchCaseRef,
    MatchCaseTypeRef,
    SwitchExpr,
    SwitchCaseRef,
    CaseExpr,
    CaseBlock,
    ReturnExpr,
    RejectExpr,
    YieldExpr,
    YieldStreamValue,
    BreakLabel,
    ContinueLabel,
    AssignTarget,
    AssignValue,
    ExpressionStatementExpr,
    ArrowDestination,
    ArrowRejection,
    ArrowSource,
    NamedValueName,

    // --- Expressions ---
    BinaryLeftExpr,
    BinaryRightExpr,
    UnaryChildExpr,
    AccessChildExpr,
    AccessMemberName,
    CastTypeRef,
    CallArgument,
    SliceChildExpr,
    SliceIndexExpr,
    SliceLeftExpr,
    SliceRightExpr,
    GenericSpecifierTypeRef,
    LiteralValue,
    ListElement,
    MapEntryRef,
    MapEntryKey,
    MapEntryValue,
    StructuralNewTypeExpr,
    StructuralNewEntryRef,
    StructuralNewEntryKey,
    StructuralNewEntryValue,
    LambdaParameter,
    LambdaBlock,
    LambdaExpr,

    // --- SML ---
    SmlTagExpr,
    SmlAttributeRef,
    SmlAttributeName,
    SmlAttributeValue,
    SmlChild,

    #[doc(hidden)]
    __Last,
}

impl PredicateToken for SrgPredicate {
    const LAYER: Layer = Layer::SourceRepresentation;

    #[inline]
    fn to_raw(self) -> u16 {
        self as u16
    }

    #[inline]
    fn from_raw(raw: u16) -> Self {
        assert!(raw < SrgPredicate::__Last as u16);
        // SAFETY: bounds-checked above; SrgPredicate is repr(u16).
        unsafe { std::mem::transmute::<u16, SrgPredicate>(raw) }
    }

    fn name(self) -> &'static str {
        match self {
            SrgPredicate::Source => "source",
            SrgPredicate::StartRune => "start-rune",
            SrgPredicate::EndRune => "end-rune",
            SrgPredicate::Child => "child",
            SrgPredicate::ImportLocation => "import-location",
            SrgPredicate::ImportSource => "import-source",
            SrgPredicate::ImportPackageRef => "import-package",
            SrgPredicate::ImportBindingName => "import-binding-name",
            SrgPredicate::ImportBindingSubsource => "import-binding-subsource",
            SrgPredicate::TypeName => "type-name",
            SrgPredicate::TypeGeneric => "type-generic",
            SrgPredicate::TypeMember => "type-member",
            SrgPredicate::TypeParentRef => "type-parent",
            SrgPredicate::TypeAliasRef => "type-alias",
            SrgPredicate::GenericName => "generic-name",
            SrgPredicate::GenericConstraintRef => "generic-constraint",
            SrgPredicate::MemberName => "member-name",
            SrgPredicate::MemberReturnTypeRef => "member-return-type",
            SrgPredicate::MemberDeclaredTypeRef => "member-declared-type",
            SrgPredicate::MemberParameter => "member-parameter",
            SrgPredicate::MemberGeneric => "member-generic",
            SrgPredicate::MemberBody => "member-body",
            SrgPredicate::MemberExpression => "member-expression",
            SrgPredicate::OperatorName => "operator-name",
            SrgPredicate::PropertyGetter => "property-getter",
            SrgPredicate::PropertySetter => "property-setter",
            SrgPredicate::MemberReadOnly => "member-readonly",
            SrgPredicate::ParameterName => "parameter-name",
            SrgPredicate::ParameterTypeRef => "parameter-type",
            SrgPredicate::TypeRefPathName => "typeref-path",
            SrgPredicate::TypeRefInner => "typeref-inner",
            SrgPredicate::TypeRefGenericArg => "typeref-generic-arg",
            SrgPredicate::StatementChild => "statement-child",
            SrgPredicate::StatementLabel => "statement-label",
            SrgPredicate::VariableName => "variable-name",
            SrgPredicate::VariableDeclaredTypeRef => "variable-declared-type",
            SrgPredicate::VariableExpression => "variable-expression",
            SrgPredicate::ConditionalExpr => "conditional-expr",
            SrgPredicate::ConditionalThen => "conditional-then",
            SrgPredicate::ConditionalElse => "conditional-else",
            SrgPredicate::LoopExpr => "loop-expr",
            SrgPredicate::LoopNamedValue => "loop-named-value",
            SrgPredicate::LoopBlock => "loop-block",
            SrgPredicate::WithExpr => "with-expr",
            SrgPredicate::WithNamedValue => "with-named-value",
            SrgPredicate::WithBlock => "with-block",
            SrgPredicate::MatchExpr => "match-expr",
            SrgPredicate::MatchNamedValue => "match-named-value",
            SrgPredicate::MatchCaseRef => "match-case",
            SrgPredicate::MatchCaseTypeRef => "match-case-type",
            SrgPredicate::SwitchExpr => "switch-expr",
            SrgPredicate::SwitchCaseRef => "switch-case",
            SrgPredicate::CaseExpr => "case-expr",
            SrgPredicate::CaseBlock => "case-block",
            SrgPredicate::ReturnExpr => "return-expr",
            SrgPredicate::RejectExpr => "reject-expr",
            SrgPredicate::YieldExpr => "yield-expr",
            SrgPredicate::YieldStreamValue => "yield-stream-value",
            SrgPredicate::BreakLabel => "break-label",
            SrgPredicate::ContinueLabel => "continue-label",
            SrgPredicate::AssignTarget => "assign-target",
            SrgPredicate::AssignValue => "assign-value",
            SrgPredicate::ExpressionStatementExpr => "expression-statement-expr",
            SrgPredicate::ArrowDestination => "arrow-destination",
            SrgPredicate::ArrowRejection => "arrow-rejection",
            SrgPredicate::ArrowSource => "arrow-source",
            SrgPredicate::NamedValueName => "named-value-name",
            SrgPredicate::BinaryLeftExpr => "binary-left",
            SrgPredicate::BinaryRightExpr => "binary-right",
            SrgPredicate::UnaryChildExpr => "unary-child",
            SrgPredicate::AccessChildExpr => "access-child",
            SrgPredicate::AccessMemberName => "access-member-name",
            SrgPredicate::CastTypeRef => "cast-type",
            SrgPredicate::CallArgument => "call-argument",
            SrgPredicate::SliceChildExpr => "slice-child",
            SrgPredicate::SliceIndexExpr => "slice-index",
            SrgPredicate::SliceLeftExpr => "slice-left",
            SrgPredicate::SliceRightExpr => "slice-right",
            SrgPredicate::GenericSpecifierTypeRef => "generic-specifier-type",
            SrgPredicate::LiteralValue => "literal-value",
            SrgPredicate::ListElement => "list-element",
            SrgPredicate::MapEntryRef => "map-entry",
            SrgPredicate::MapEntryKey => "map-entry-key",
            SrgPredicate::MapEntryValue => "map-entry-value",
            SrgPredicate::StructuralNewTypeExpr => "structural-new-type",
            SrgPredicate::StructuralNewEntryRef => "structural-new-entry",
            SrgPredicate::StructuralNewEntryKey => "structural-new-entry-key",
            SrgPredicate::StructuralNewEntryValue => "structural-new-entry-value",
            SrgPredicate::LambdaParameter => "lambda-parameter",
            SrgPredicate::LambdaBlock => "lambda-block",
            SrgPredicate::LambdaExpr => "lambda-expr",
            SrgPredicate::SmlTagExpr => "sml-tag",
            SrgPredicate::SmlAttributeRef => "sml-attribute",
            SrgPredicate::SmlAttributeName => "sml-attribute-name",
            SrgPredicate::SmlAttributeValue => "sml-attribute-value",
            SrgPredicate::SmlChild => "sml-child",
            SrgPredicate::__Last => unreachable!(),
        }
    }
}
