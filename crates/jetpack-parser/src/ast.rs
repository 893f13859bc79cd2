//! AST node types for JavaScript and JSX.
//!
//! Everything is an Expression, Binding, or Statement. Identifier
//! occurrences that can name a variable do not store their text inline:
//! each one owns a slot in the program's [`IdentTable`], so a rename pass
//! can rewrite names without walking or rebuilding the tree.

use crate::span::Span;

/// The root AST for a parsed module.
#[derive(Debug, Clone)]
pub struct Program {
    /// Top-level statements.
    pub body: Vec<Stmt>,
    /// Names of every identifier occurrence in `body`.
    pub idents: IdentTable,
    pub span: Span,
}

impl Program {
    pub fn new(body: Vec<Stmt>, idents: IdentTable, span: Span) -> Self {
        Self { body, idents, span }
    }

    /// Current name of an identifier occurrence.
    #[inline]
    pub fn name(&self, ident: &Ident) -> &str {
        self.idents.name(ident.id)
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Index of one identifier occurrence in an [`IdentTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentId(pub u32);

/// Backing store for identifier names. One entry per occurrence.
#[derive(Debug, Clone, Default)]
pub struct IdentTable {
    names: Vec<String>,
}

impl IdentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, name: impl Into<String>) -> IdentId {
        let id = IdentId(self.names.len() as u32);
        self.names.push(name.into());
        id
    }

    #[inline]
    pub fn name(&self, id: IdentId) -> &str {
        self.names.get(id.0 as usize).map_or("", String::as_str)
    }

    pub fn set(&mut self, id: IdentId, name: impl Into<String>) {
        if let Some(slot) = self.names.get_mut(id.0 as usize) {
            *slot = name.into();
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A binding-capable identifier occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident {
    pub id: IdentId,
    pub span: Span,
}

impl Ident {
    pub fn new(id: IdentId, span: Span) -> Self {
        Self { id, span }
    }
}

// =============================================================================
// Expressions
// =============================================================================

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // === Literals ===
    Null,
    Bool(bool),
    /// Number literal. `raw` is the source spelling, absent for
    /// synthesized values.
    Number { value: f64, raw: Option<String> },
    /// BigInt literal including the `n` suffix.
    BigInt(String),
    String(StrLit),
    Regex { pattern: String, flags: String },
    /// Template literal: `` `a${b}c` ``
    Template(Template),
    /// Tagged template: `` tag`a${b}` ``
    TaggedTemplate { tag: Box<Expr>, quasi: Template },

    // === Identifiers ===
    Ident(Ident),
    /// `#name` on the left of `in`.
    PrivateName(String),
    This,
    Super,

    // === Compound Expressions ===
    /// Array literal. `None` entries are holes: `[a, , b]`
    Array(Vec<Option<Expr>>),
    Object(Vec<ObjectMember>),
    Function(Box<Function>),
    Arrow(Box<ArrowFunction>),
    Class(Box<Class>),

    // === Operations ===
    Unary { op: UnaryOp, arg: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        arg: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// `a, b, c`
    Sequence(Vec<Expr>),

    // === Member Access ===
    /// `a.b`, `a?.b`, `a.#b`
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    /// `a[b]`, `a?.[b]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },

    // === Calls ===
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    New { callee: Box<Expr>, args: Vec<Expr> },
    /// `import(specifier)`
    Import(Box<Expr>),
    /// `new.target`, `import.meta`
    MetaProperty { meta: String, property: String },

    // === Other ===
    /// `...expr` in arrays and call arguments.
    Spread(Box<Expr>),
    Yield {
        arg: Option<Box<Expr>>,
        delegate: bool,
    },
    Await(Box<Expr>),
}

/// A string literal. `raw` keeps the original quoting.
#[derive(Debug, Clone, PartialEq)]
pub struct StrLit {
    pub value: String,
    pub raw: Option<String>,
}

impl StrLit {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            raw: None,
        }
    }
}

/// Template literal parts. `quasis` hold raw text and always have one more
/// element than `exprs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub quasis: Vec<String>,
    pub exprs: Vec<Expr>,
}

/// Member of an object literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectMember {
    Property(Property),
    /// `...expr`
    Spread(Expr),
}

/// Object literal property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: PropertyKey,
    /// For methods and accessors this is a `Function` expression.
    pub value: Expr,
    pub kind: PropertyKind,
    /// Written as `{ a }` or `{ a = 1 }`.
    pub shorthand: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Ident(String),
    String(StrLit),
    Number { value: f64, raw: Option<String> },
    Computed(Box<Expr>),
    /// Class-private name including the `#`.
    Private(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Init,
    Get,
    Set,
    Method,
}

// =============================================================================
// Operators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
    Typeof,
    Void,
    Delete,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Typeof => "typeof",
            UnaryOp::Void => "void",
            UnaryOp::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    And,
    Or,
    Nullish,
    In,
    Instanceof,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Exp => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Nullish => "??",
            BinaryOp::In => "in",
            BinaryOp::Instanceof => "instanceof",
        }
    }

    /// Binding power, matching [`crate::TokenKind::binary_precedence`].
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Nullish => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::BitOr => 4,
            BinaryOp::BitXor => 5,
            BinaryOp::BitAnd => 6,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 7,
            BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
            | BinaryOp::In
            | BinaryOp::Instanceof => 8,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 9,
            BinaryOp::Add | BinaryOp::Sub => 10,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 11,
            BinaryOp::Exp => 12,
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Nullish,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::Exp => "**=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::UShr => ">>>=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::And => "&&=",
            AssignOp::Or => "||=",
            AssignOp::Nullish => "??=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl UpdateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOp::Increment => "++",
            UpdateOp::Decrement => "--",
        }
    }
}

// =============================================================================
// Statements
// =============================================================================

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `var`/`let`/`const` declaration.
    Var(VarDecl),
    Function(Box<Function>),
    Class(Box<Class>),
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
    Empty,
    Debugger,

    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        left: ForHead,
        right: Expr,
        body: Box<Stmt>,
    },
    ForOf {
        left: ForHead,
        right: Expr,
        body: Box<Stmt>,
        is_await: bool,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Stmt>>,
    },
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    With {
        object: Expr,
        body: Box<Stmt>,
    },

    Import(Box<ImportDecl>),
    Export(Box<ExportDecl>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VarKind::Var => "var",
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: VarKind,
    pub decls: Vec<VarDeclarator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub binding: Binding,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Var(VarDecl),
    Expr(Expr),
}

/// Left side of `for (... in x)` / `for (... of x)`.
#[derive(Debug, Clone, PartialEq)]
pub enum ForHead {
    Var { kind: VarKind, binding: Binding },
    Target(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default:`.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<Binding>,
    pub body: Vec<Stmt>,
}

// =============================================================================
// Bindings
// =============================================================================

/// A binding target in a declaration or parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub kind: BindingKind,
    pub span: Span,
}

impl Binding {
    pub fn new(kind: BindingKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Every identifier bound by this pattern, in source order.
    pub fn idents(&self) -> Vec<Ident> {
        let mut out = Vec::new();
        self.collect_idents(&mut out);
        out
    }

    fn collect_idents(&self, out: &mut Vec<Ident>) {
        match &self.kind {
            BindingKind::Ident(ident) => out.push(*ident),
            BindingKind::Array(elements) => {
                for element in elements.iter().flatten() {
                    element.binding.collect_idents(out);
                }
            }
            BindingKind::Object(props) => {
                for prop in props {
                    match prop {
                        ObjectPatternProp::KeyValue { value, .. } => value.collect_idents(out),
                        ObjectPatternProp::Rest(binding) => binding.collect_idents(out),
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindingKind {
    Ident(Ident),
    /// `[a, , b = 1, ...rest]`
    Array(Vec<Option<ArrayPatternElement>>),
    /// `{ a, b: c, ...rest }`
    Object(Vec<ObjectPatternProp>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPatternElement {
    pub binding: Binding,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectPatternProp {
    KeyValue {
        key: PropertyKey,
        value: Binding,
        default: Option<Expr>,
        shorthand: bool,
    },
    Rest(Binding),
}

// =============================================================================
// Functions and Classes
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub id: Option<Ident>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
    pub is_generator: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub binding: Binding,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowFunction {
    pub params: Vec<Param>,
    pub body: ArrowBody,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub id: Option<Ident>,
    pub super_class: Option<Box<Expr>>,
    pub body: Vec<ClassMember>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Method {
        key: PropertyKey,
        value: Function,
        kind: MethodKind,
        is_static: bool,
    },
    Property {
        key: PropertyKey,
        value: Option<Expr>,
        is_static: bool,
    },
    /// `static { ... }`
    StaticBlock(Vec<Stmt>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Get,
    Set,
    Constructor,
}

// =============================================================================
// Modules
// =============================================================================

/// `import ... from 'source'` or a bare `import 'source'`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub specifiers: Vec<ImportSpecifier>,
    pub source: StrLit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpecifier {
    /// `import a from '...'`
    Default(Ident),
    /// `import * as a from '...'`
    Namespace(Ident),
    /// `import { imported as local } from '...'`
    Named { imported: String, local: Ident },
}

impl ImportSpecifier {
    pub fn local(&self) -> Ident {
        match self {
            ImportSpecifier::Default(local)
            | ImportSpecifier::Namespace(local)
            | ImportSpecifier::Named { local, .. } => *local,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportDecl {
    /// `export { a, b as c }` or `export { a } from '...'`
    Named {
        specifiers: Vec<ExportSpecifier>,
        source: Option<StrLit>,
    },
    /// `export default ...`
    Default(ExportDefault),
    /// `export var/let/const/function/class ...`
    Decl(Stmt),
    /// `export * from '...'` or `export * as ns from '...'`
    All {
        exported: Option<String>,
        source: StrLit,
    },
}

/// `local as exported`. For re-exports, `local` names the export of the
/// source module and is not a reference in this module's scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub local: Ident,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportDefault {
    Expr(Expr),
    Function(Function),
    Class(Class),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_table_set() {
        let mut table = IdentTable::new();
        let a = table.alloc("a");
        let b = table.alloc("a");
        table.set(b, "renamed");
        assert_eq!(table.name(a), "a");
        assert_eq!(table.name(b), "renamed");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_binding_idents_in_order() {
        let mut table = IdentTable::new();
        let span = Span::default();
        let a = Ident::new(table.alloc("a"), span);
        let b = Ident::new(table.alloc("b"), span);
        let rest = Ident::new(table.alloc("rest"), span);

        let binding = Binding::new(
            BindingKind::Object(vec![
                ObjectPatternProp::KeyValue {
                    key: PropertyKey::Ident("a".into()),
                    value: Binding::new(BindingKind::Ident(a), span),
                    default: None,
                    shorthand: true,
                },
                ObjectPatternProp::KeyValue {
                    key: PropertyKey::Ident("x".into()),
                    value: Binding::new(
                        BindingKind::Array(vec![
                            None,
                            Some(ArrayPatternElement {
                                binding: Binding::new(BindingKind::Ident(b), span),
                                default: None,
                                rest: false,
                            }),
                        ]),
                        span,
                    ),
                    default: None,
                    shorthand: false,
                },
                ObjectPatternProp::Rest(Binding::new(BindingKind::Ident(rest), span)),
            ]),
            span,
        );

        assert_eq!(binding.idents(), vec![a, b, rest]);
    }
}
