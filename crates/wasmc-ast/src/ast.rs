//! AST node types for the restricted surface grammar.
//!
//! Every node carries a [`Span`] so later phases can attach diagnostics to
//! it; nothing else about these nodes is opinionated about downstream use.

use wasmc_common::Span;

#[derive(Clone, Debug)]
pub struct Program {
    pub files: Vec<SourceFile>,
}

#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: String,
    pub statements: Vec<TopLevel>,
}

#[derive(Clone, Debug)]
pub enum TopLevel {
    Variable(VariableDecl),
    Function(FunctionDecl),
    Class(ClassDecl),
    Enum(EnumDecl),
    /// Accepted but otherwise ignored: `interface`/`type`/`import` declarations
    /// are host-level concerns this crate does not model further.
    Ignored(Span),
}

#[derive(Clone, Debug)]
pub struct TypeParam {
    pub name: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum TypeNode {
    Void(Span),
    Named {
        name: String,
        /// Type arguments from `Name<Arg, ...>`, empty for a non-generic
        /// reference.
        type_args: Vec<TypeNode>,
        span: Span,
    },
}

impl TypeNode {
    pub fn span(&self) -> Span {
        match self {
            TypeNode::Void(span) => *span,
            TypeNode::Named { span, .. } => *span,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Clone, Debug)]
pub struct VariableDecl {
    pub kind: DeclKind,
    pub name: String,
    pub ty: Option<TypeNode>,
    pub initializer: Option<Expr>,
    pub exported: bool,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub ty: TypeNode,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: TypeNode,
    pub body: Option<Vec<Stmt>>,
    pub exported: bool,
    pub imported: bool,
    /// `module$base` import qualifier, if the name contained a `$`.
    pub import_qualifier: Option<(String, String)>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
    StaticMethod,
    Constructor,
}

#[derive(Clone, Debug)]
pub struct ClassMember {
    pub kind: MemberKind,
    pub name: String,
    pub field_type: Option<TypeNode>,
    pub method: Option<FunctionDecl>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub members: Vec<ClassMember>,
    pub exported: bool,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub exported: bool,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Block(Vec<Stmt>, Span),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Return(Option<Expr>, Span),
    Variable(VariableDecl),
    Expr(Expr, Span),
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Plus,
    Neg,
    BitNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    ShrSigned,
    ShrUnsigned,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,
    LogicalAnd,
    LogicalOr,
}

#[derive(Clone, Debug)]
pub enum Literal {
    Number(String),
    Bool(bool),
    Null,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Literal(Literal, Span),
    Identifier(String, Span),
    Paren(Box<Expr>, Span),
    Cast {
        expr: Box<Expr>,
        ty: TypeNode,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        /// Explicit type arguments from `callee<Arg, ...>(args)`, empty for
        /// an ordinary (or not-yet-known-generic) call.
        type_args: Vec<TypeNode>,
        span: Span,
    },
    New {
        class_name: String,
        args: Vec<Expr>,
        type_args: Vec<TypeNode>,
        span: Span,
    },
    Property {
        base: Box<Expr>,
        name: String,
        span: Span,
    },
    Element {
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span)
            | Expr::Identifier(_, span)
            | Expr::Paren(_, span)
            | Expr::Cast { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Call { span, .. }
            | Expr::New { span, .. }
            | Expr::Property { span, .. }
            | Expr::Element { span, .. } => *span,
        }
    }
}
