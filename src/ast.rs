// program   ::= statement*
// statement ::= annotation | modifier* declaration | control | expr [';']
// decl      ::= TYPE ID ['=' expr] | TYPE ID (',' ID)+ ['=' expr]
//             | [TYPE] 'func' ID [generics] '(' params ')' ['->' TYPE] (block | '=>' expr)
//             | ID '(' params ')' block
//             | 'class' ID [generics] [parents] block
// control   ::= if | while | for | match | switch | try | return | throw
//             | 'break' | 'continue' | 'main' block | 'namespace' ID block
// block     ::= '{' statement* '}' | ':' NEWLINE INDENT statement* DEDENT
//
// Precedence (loosest first)
//
// = += -= ... (right)
// ?:
// || or
// && and
// |
// ^
// &
// == !=
// < <= > >=
// << >>
// + -
// * / %
// prefix ! not - + ~ ++ --
// postfix ++ --
// . :: [] ()

use std::collections::BTreeSet;

use crate::literal::NumberLiteral;

/// The root of the tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    /// Include directives requested by the source (`@include`).
    pub includes: BTreeSet<String>,
    pub body: Body,
}

/// An ordered block of statements. `indent` is relative to the enclosing
/// block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Body {
    pub children: Vec<Node>,
    pub indent: usize,
}

impl Body {
    pub fn new(children: Vec<Node>, indent: usize) -> Body {
        Body { children, indent }
    }

    /// A body nested one level under its parent.
    pub fn nested(children: Vec<Node>) -> Body {
        Body::new(children, 1)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    // Literals
    Number(NumberLiteral),
    /// A quoted string, quotes and escapes as written.
    Str(String),
    /// Contents of a raw string.
    RawStr(String),
    Interp(Interpolated),
    /// A quoted character, as written.
    Char(String),
    Bool(bool),
    Null,
    Container {
        kind: ContainerKind,
        items: Vec<Node>,
    },
    Map(Vec<(Node, Node)>),

    // Expressions
    Ident(String),
    /// A type used in value position: a cast, a constructor or the callee
    /// of a generic call.
    TypeName(String),
    This,
    Paren(Box<Node>),
    Arithmetic(Binary<ArithOp>),
    Shift(Binary<ShiftOp>),
    Bitwise(Bitwise),
    Comparison(Binary<CmpOp>),
    Logical(Binary<LogicOp>),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Ternary {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    Call(Call),
    Member {
        object: Box<Node>,
        name: String,
        access: Access,
    },
    Index {
        object: Box<Node>,
        index: Box<Node>,
    },
    Lambda(Lambda),

    // Declarations
    VarDecl(VarDecl),
    MultiVarDecl(MultiVarDecl),
    Function(Function),
    Class(Class),

    // Control flow
    If(If),
    While {
        cond: Box<Node>,
        body: Body,
    },
    ForIn(ForIn),
    ForC(ForC),
    Match(Match),
    Switch(Match),
    Try(Try),
    Break,
    Continue,
    Return(Option<Box<Node>>),
    Throw(Box<Node>),
    MainBlock(Body),

    // Annotations
    Define {
        name: String,
        value: Option<Box<Node>>,
    },
    Assert {
        cond: Box<Node>,
        message: Option<Box<Node>>,
    },
    Namespace {
        name: String,
        body: Body,
    },
    /// `using namespace <name>;`
    Using(String),
    Alias {
        name: String,
        target: String,
    },
    Panic(Option<Box<Node>>),
    Marker(Marker),
    /// Verbatim C++ text of a foreign block.
    Foreign(String),
    /// A comment, delimiters included.
    Comment(String),
    /// An access section of a class body.
    Divider {
        label: Option<Modifier>,
        body: Body,
    },
}

impl Node {
    /// Whether the node produces a value, and thus needs a terminator when
    /// used as a statement.
    pub fn is_value(&self) -> bool {
        use Node::*;
        matches!(
            self,
            Number(_)
                | Str(_)
                | RawStr(_)
                | Interp(_)
                | Char(_)
                | Bool(_)
                | Null
                | Container { .. }
                | Map(_)
                | Ident(_)
                | TypeName(_)
                | This
                | Paren(_)
                | Arithmetic(_)
                | Shift(_)
                | Bitwise(_)
                | Comparison(_)
                | Logical(_)
                | Unary { .. }
                | Ternary { .. }
                | Assign { .. }
                | Call(_)
                | Member { .. }
                | Index { .. }
                | Lambda(_)
        )
    }

    /// Whether the node may appear on the left of `=`.
    pub fn is_place(&self) -> bool {
        match self {
            Node::Ident(_) | Node::Member { .. } | Node::Index { .. } => true,
            Node::Unary { op, .. } => *op == UnaryOp::Deref,
            Node::Paren(inner) => inner.is_place(),
            _ => false,
        }
    }

    pub fn boxed(self) -> Box<Node> {
        Box::new(self)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    List,
    Set,
    Tuple,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Interpolated {
    pub fragments: Vec<Fragment>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Fragment {
    Text(String),
    Expr(Node),
}

/// Operator symbols, as emitted.
pub trait Operator: Copy {
    fn symbol(self) -> &'static str;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binary<Op> {
    pub op: Op,
    pub lhs: Box<Node>,
    pub rhs: Box<Node>,
}

/// Bitwise operators; `~` is the only one without a right operand.
#[derive(Clone, Debug, PartialEq)]
pub struct Bitwise {
    pub op: BitOp,
    pub lhs: Box<Node>,
    pub rhs: Option<Box<Node>>,
}

macro_rules! operators {
    ($(
        $(#[$meta:meta])*
        enum $name:ident { $($variant:ident => $symbol:literal),* $(,)? }
    )*) => {$(
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum $name { $($variant),* }

        impl Operator for $name {
            fn symbol(self) -> &'static str {
                match self { $($name::$variant => $symbol),* }
            }
        }
    )*};
}

operators! {
    enum ArithOp { Add => "+", Sub => "-", Mul => "*", Div => "/", Rem => "%" }
    enum ShiftOp { Shl => "<<", Shr => ">>" }
    enum BitOp { And => "&", Or => "|", Xor => "^", Not => "~" }
    enum CmpOp { Eq => "==", NotEq => "!=", Less => "<", LessEq => "<=", Greater => ">", GreaterEq => ">=" }
    /// `and`/`or` are emitted as their symbolic forms.
    enum LogicOp { And => "&&", Or => "||" }
    enum UnaryOp {
        Not => "!",
        Neg => "-",
        Plus => "+",
        PreInc => "++",
        PreDec => "--",
        PostInc => "++",
        PostDec => "--",
        Deref => "*",
        AddrOf => "&",
    }
}

impl UnaryOp {
    pub fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::PostInc | UnaryOp::PostDec)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    /// `a.b`, or `this->b` on `this`.
    Dot,
    /// `a::b`
    Scope,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub callee: Box<Node>,
    pub args: Vec<Arg>,
}

impl Call {
    pub fn has_named_args(&self) -> bool {
        self.args.iter().any(|arg| arg.name.is_some())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Arg {
    /// Set for `name = value` arguments.
    pub name: Option<String>,
    pub value: Node,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Modifier {
    Private,
    Public,
    Protected,
    Const,
    Consteval,
    Constexpr,
    Static,
    Abstract,
    Override,
    Virtual,
}

impl Modifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Modifier::Private => "private",
            Modifier::Public => "public",
            Modifier::Protected => "protected",
            Modifier::Const => "const",
            Modifier::Consteval => "consteval",
            Modifier::Constexpr => "constexpr",
            Modifier::Static => "static",
            Modifier::Abstract => "abstract",
            Modifier::Override => "override",
            Modifier::Virtual => "virtual",
        }
    }

    pub fn is_access(self) -> bool {
        matches!(
            self,
            Modifier::Private | Modifier::Public | Modifier::Protected
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub modifiers: Vec<Modifier>,
    pub ty: String,
    pub name: String,
    pub value: Option<Box<Node>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MultiVarDecl {
    pub modifiers: Vec<Modifier>,
    pub ty: String,
    pub names: Vec<String>,
    pub value: Option<Box<Node>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub modifiers: Vec<Modifier>,
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    /// `None` for constructors.
    pub ret: Option<String>,
    /// Constructor member initializers, `: a(x), b(y)`.
    pub inits: Vec<MemberInit>,
    pub body: Body,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemberInit {
    pub name: String,
    pub args: Vec<Node>,
}

/// `lambda[capture](params) -> ret => expr`, or `(params) => expr` when
/// every parameter is typed.
#[derive(Clone, Debug, PartialEq)]
pub struct Lambda {
    /// Capture list without its brackets; empty captures nothing.
    pub capture: String,
    pub params: Vec<Param>,
    pub ret: Option<String>,
    pub body: Body,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// `None` renders as `auto`.
    pub ty: Option<String>,
    pub name: String,
    pub default: Option<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericParam {
    pub name: String,
    /// Set for non-type parameters (`int N`).
    pub ty: Option<String>,
    pub default: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Class {
    pub modifiers: Vec<Modifier>,
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub parents: Vec<String>,
    /// A sequence of [`Node::Divider`] sections.
    pub body: Body,
}

#[derive(Clone, Debug, PartialEq)]
pub struct If {
    /// The `if` branch followed by every `elif`.
    pub branches: Vec<(Node, Body)>,
    pub otherwise: Option<Body>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForIn {
    pub ty: Option<String>,
    pub var: String,
    pub iter: Box<Node>,
    pub body: Body,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForC {
    pub init: Option<Box<Node>>,
    pub cond: Option<Box<Node>>,
    pub update: Option<Box<Node>>,
    pub body: Body,
}

/// Shared by `match` (lowered to an equality chain) and `switch`.
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    pub subject: Box<Node>,
    pub arms: Vec<(Node, Body)>,
    pub default: Option<Body>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Try {
    pub body: Body,
    pub handlers: Vec<Catch>,
    pub finally: Option<Body>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Catch {
    pub ty: Option<String>,
    pub name: Option<String>,
    pub body: Body,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    Io,
    Safe,
    Unsafe,
}

/// Annotations recognized after `@`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Annotation {
    Include,
    Using,
    Alias,
    Define,
    Assert,
    Namespace,
    Panic,
    Marker(Marker),
}

pub static ANNOTATIONS: phf::Map<&'static str, Annotation> = phf::phf_map! {
    "include" => Annotation::Include,
    "using" => Annotation::Using,
    "alias" => Annotation::Alias,
    "define" => Annotation::Define,
    "assert" => Annotation::Assert,
    "namespace" => Annotation::Namespace,
    "panic" => Annotation::Panic,
    "io" => Annotation::Marker(Marker::Io),
    "safe" => Annotation::Marker(Marker::Safe),
    "unsafe" => Annotation::Marker(Marker::Unsafe),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_families() {
        let ident = || Node::Ident("x".into());
        assert!(ident().is_value());
        assert!(Node::Call(Call {
            callee: ident().boxed(),
            args: vec![],
        })
        .is_value());
        assert!(Node::Map(vec![]).is_value());
        assert!(!Node::Break.is_value());
        assert!(!Node::Return(Some(ident().boxed())).is_value());
        assert!(!Node::VarDecl(VarDecl {
            modifiers: vec![],
            ty: "int".into(),
            name: "x".into(),
            value: None,
        })
        .is_value());
        assert!(!Node::Comment("// x".into()).is_value());
    }

    #[test]
    fn test_places() {
        let ident = || Node::Ident("x".into()).boxed();
        assert!(Node::Ident("x".into()).is_place());
        assert!(Node::Paren(ident()).is_place());
        assert!(Node::Index {
            object: ident(),
            index: ident(),
        }
        .is_place());
        assert!(!Node::Paren(Node::Bool(true).boxed()).is_place());
        assert!(!Node::Unary {
            op: UnaryOp::Neg,
            operand: ident(),
        }
        .is_place());
    }

    #[test]
    fn test_operator_symbols() {
        assert_eq!(CmpOp::GreaterEq.symbol(), ">=");
        assert_eq!(LogicOp::Or.symbol(), "||");
        assert_eq!(BitOp::Not.symbol(), "~");
        assert!(UnaryOp::PostDec.is_postfix());
        assert!(!UnaryOp::PreDec.is_postfix());
    }
}
