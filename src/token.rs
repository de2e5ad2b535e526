use std::{fmt, ops::Range};

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The lexeme, as written in the source. Merged generic types hold the
    /// concatenated text and foreign blocks hold the extracted block text.
    pub text: String,
    pub line: u32,
    pub column: u32,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: Position, span: Span) -> Token {
        Token {
            kind,
            text: text.into(),
            line: pos.line,
            column: pos.column,
            span,
        }
    }

    pub fn pos(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {:?}, {})", self.kind, self.text, self.pos())
    }
}

/// Byte range of a token in the tokenized text.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap_or(u32::MAX))
    }

    pub const fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns a span that covers both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new_of_bounds(self.lo.min(other.lo)..self.hi().max(other.hi()))
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.hi()]
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

/// A 1-based line and column.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Position {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Number,
    String,
    RawString,
    /// `$"..."`
    InterpString,
    Char,
    True,
    False,
    Null,

    Ident,
    /// `a::b::c`
    Path,
    /// Declared-type keyword, or a name fused with its generic arguments.
    Type,
    /// `<...>` right after a name; fused away by the merge pass.
    AngleSpan,
    /// `@name`; the token text holds the name only.
    Decorator,
    /// Index into the extracted foreign-block table.
    ForeignBlock(u32),
    Comment,

    Func,
    Lambda,
    Class,
    Main,
    This,
    If,
    Elif,
    Else,
    Switch,
    Case,
    Default,
    Match,
    While,
    For,
    In,
    Break,
    Continue,
    Try,
    Catch,
    Finally,
    Throw,
    Return,
    Namespace,
    And,
    Or,
    Not,

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

    /// `<<=`
    ShlEq,
    /// `>>=`
    ShrEq,
    ColonColon,
    /// `->`
    Arrow,
    /// `=>`
    FatArrow,
    PlusPlus,
    MinusMinus,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    EqEq,
    NotEq,
    LessEq,
    GreaterEq,
    PipePipe,
    AmpAmp,
    Shl,
    Shr,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Less,
    Greater,
    Bang,
    Tilde,
    Amp,
    Pipe,
    Caret,
    Question,
    Dot,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,

    Newline,
    Indent,
    Dedent,
    Eof,
}

impl TokenKind {
    /// Identifier-like tokens that may start a type or be fused with a
    /// generic-argument span.
    pub fn is_name(self) -> bool {
        matches!(self, TokenKind::Ident | TokenKind::Type | TokenKind::Path)
    }

    pub fn is_modifier(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Private
                | Public
                | Protected
                | Const
                | Consteval
                | Constexpr
                | Static
                | Abstract
                | Override
                | Virtual
        )
    }

    pub fn is_access(self) -> bool {
        matches!(
            self,
            TokenKind::Private | TokenKind::Public | TokenKind::Protected
        )
    }

    /// Human-readable description, used in diagnostics.
    pub fn describe(self) -> &'static str {
        use TokenKind::*;
        match self {
            Number => "number",
            String | RawString | InterpString => "string",
            Char => "character",
            True | False => "boolean",
            Null => "`null`",
            Ident => "identifier",
            Path => "path",
            Type => "type",
            AngleSpan => "generic arguments",
            Decorator => "annotation",
            ForeignBlock(_) => "foreign block",
            Comment => "comment",
            Func => "`func`",
            Lambda => "`lambda`",
            Class => "`class`",
            Main => "`main`",
            This => "`this`",
            If => "`if`",
            Elif => "`elif`",
            Else => "`else`",
            Switch => "`switch`",
            Case => "`case`",
            Default => "`default`",
            Match => "`match`",
            While => "`while`",
            For => "`for`",
            In => "`in`",
            Break => "`break`",
            Continue => "`continue`",
            Try => "`try`",
            Catch => "`catch`",
            Finally => "`finally`",
            Throw => "`throw`",
            Return => "`return`",
            Namespace => "`namespace`",
            And => "`and`",
            Or => "`or`",
            Not => "`not`",
            Private => "`private`",
            Public => "`public`",
            Protected => "`protected`",
            Const => "`const`",
            Consteval => "`consteval`",
            Constexpr => "`constexpr`",
            Static => "`static`",
            Abstract => "`abstract`",
            Override => "`override`",
            Virtual => "`virtual`",
            ShlEq => "`<<=`",
            ShrEq => "`>>=`",
            ColonColon => "`::`",
            Arrow => "`->`",
            FatArrow => "`=>`",
            PlusPlus => "`++`",
            MinusMinus => "`--`",
            PlusEq => "`+=`",
            MinusEq => "`-=`",
            StarEq => "`*=`",
            SlashEq => "`/=`",
            PercentEq => "`%=`",
            AmpEq => "`&=`",
            PipeEq => "`|=`",
            CaretEq => "`^=`",
            EqEq => "`==`",
            NotEq => "`!=`",
            LessEq => "`<=`",
            GreaterEq => "`>=`",
            PipePipe => "`||`",
            AmpAmp => "`&&`",
            Shl => "`<<`",
            Shr => "`>>`",
            Plus => "`+`",
            Minus => "`-`",
            Star => "`*`",
            Slash => "`/`",
            Percent => "`%`",
            Assign => "`=`",
            Less => "`<`",
            Greater => "`>`",
            Bang => "`!`",
            Tilde => "`~`",
            Amp => "`&`",
            Pipe => "`|`",
            Caret => "`^`",
            Question => "`?`",
            Dot => "`.`",
            LParen => "`(`",
            RParen => "`)`",
            LBracket => "`[`",
            RBracket => "`]`",
            LBrace => "`{`",
            RBrace => "`}`",
            Comma => "`,`",
            Semicolon => "`;`",
            Colon => "`:`",
            Newline => "line break",
            Indent => "indentation",
            Dedent => "dedentation",
            Eof => "end of input",
        }
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "func" => TokenKind::Func,
    "lambda" => TokenKind::Lambda,
    "class" => TokenKind::Class,
    "main" => TokenKind::Main,
    "this" => TokenKind::This,
    "if" => TokenKind::If,
    "elif" => TokenKind::Elif,
    "else" => TokenKind::Else,
    "switch" => TokenKind::Switch,
    "case" => TokenKind::Case,
    "default" => TokenKind::Default,
    "match" => TokenKind::Match,
    "while" => TokenKind::While,
    "for" => TokenKind::For,
    "in" => TokenKind::In,
    "break" => TokenKind::Break,
    "continue" => TokenKind::Continue,
    "try" => TokenKind::Try,
    "catch" => TokenKind::Catch,
    "finally" => TokenKind::Finally,
    "throw" => TokenKind::Throw,
    "return" => TokenKind::Return,
    "namespace" => TokenKind::Namespace,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
    "not" => TokenKind::Not,
    "private" => TokenKind::Private,
    "public" => TokenKind::Public,
    "protected" => TokenKind::Protected,
    "const" => TokenKind::Const,
    "consteval" => TokenKind::Consteval,
    "constexpr" => TokenKind::Constexpr,
    "static" => TokenKind::Static,
    "abstract" => TokenKind::Abstract,
    "override" => TokenKind::Override,
    "virtual" => TokenKind::Virtual,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "null" => TokenKind::Null,
};

/// Declared-type keywords, lexed as [`TokenKind::Type`].
pub static TYPE_KEYWORDS: phf::Set<&'static str> = phf::phf_set! {
    "byte", "short", "int", "long", "dlong",
    "ubyte", "ushort", "uint", "ulong", "dulong",
    "float8", "float16", "float", "double", "decimal",
    "fixed16_16", "fixed32_32",
    "bin", "hex", "oct",
    "char", "string", "bool", "void", "auto", "any",
    "list", "collection", "map", "set", "tuple", "union",
};
