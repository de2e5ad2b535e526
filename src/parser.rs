use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    ast::{
        Access, Annotation, Arg, ArithOp, Binary, BitOp, Bitwise, Body, Call, Catch, Class,
        CmpOp, ContainerKind, ForC, ForIn, Fragment, Function, GenericParam, If, Interpolated,
        Lambda, LogicOp, Match, MemberInit, Modifier, MultiVarDecl, Node, Param, Program, ShiftOp,
        Try, UnaryOp, VarDecl, ANNOTATIONS,
    },
    lexer::{self, extract},
    literal::{split_interpolation, NumberError, NumberLiteral, Piece},
    token::{Position, Span, Token, TokenKind},
};

type Result<T, E = ()> = std::result::Result<T, E>;

pub type ParseResult<T> = Result<T, (T, Vec<ParseError>)>;

/// Parses a whole program, stopping at the first error.
pub fn parse(tokens: &[Token], blocks: &[String]) -> Result<Program, ParseError> {
    let (program, errors) = run(tokens, blocks, false);
    match errors.into_iter().next() {
        Some(error) => Err(error),
        None => Ok(program),
    }
}

/// Parses a whole program, skipping to the next statement after each error.
/// On failure the partially built program is returned with every error.
pub fn parse_recovering(tokens: &[Token], blocks: &[String]) -> ParseResult<Program> {
    let (program, errors) = run(tokens, blocks, true);
    if errors.is_empty() {
        Ok(program)
    } else {
        Err((program, errors))
    }
}

fn run(tokens: &[Token], blocks: &[String], recover: bool) -> (Program, Vec<ParseError>) {
    let mut p = Parser::new(tokens, blocks, recover);
    let children = p.parse_statements(&[]);
    debug!(
        statements = children.len(),
        includes = p.includes.len(),
        errors = p.errors.len(),
        "parsed program"
    );
    let program = Program {
        includes: p.includes,
        body: Body::new(children, 0),
    };
    (program, p.errors)
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{pos}: {kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub pos: Position,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("expected {expected}, found {found}")]
    Unexpected {
        found: String,
        expected: &'static str,
    },
    #[error("unclosed {delimiter}")]
    Unclosed { delimiter: &'static str },
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("duplicate generic parameter `{0}`")]
    DuplicateGeneric(String),
    #[error("malformed generic parameter list `{0}`")]
    MalformedGenerics(String),
    #[error(transparent)]
    Number(#[from] NumberError),
    #[error("{0}")]
    Interpolation(String),
    #[error("unknown annotation `@{0}`")]
    UnknownAnnotation(String),
    #[error("`@cpp` must be followed by a `{{ ... }}` block")]
    MissingForeignBlock,
    #[error("unknown foreign block {0}")]
    UnknownForeignBlock(u32),
    #[error("named and positional arguments cannot be mixed in one call")]
    MixedArguments,
}

static EOF: Token = Token {
    kind: TokenKind::Eof,
    text: String::new(),
    line: 0,
    column: 0,
    span: Span::new_of_length(0, 0),
};

struct Parser<'tok> {
    tokens: &'tok [Token],
    blocks: &'tok [String],
    cursor: usize,
    errors: Vec<ParseError>,
    recover: bool,
    includes: BTreeSet<String>,
}

impl<'tok> Parser<'tok> {
    /// Parses statements until one of `end` (not consumed) or the end of
    /// input.
    fn parse_statements(&mut self, end: &[TokenKind]) -> Vec<Node> {
        let mut nodes = Vec::new();
        loop {
            self.skip_trivia(&mut nodes);
            let kind = self.peek().kind;
            if kind == TokenKind::Eof || end.contains(&kind) || self.halted() {
                break;
            }
            let start = self.cursor;
            match self.parse_statement() {
                Ok(Some(node)) => nodes.push(node),
                Ok(None) => (),
                Err(()) if self.recover => self.resynchronize(start, end),
                Err(()) => break,
            }
        }
        nodes
    }

    /// Drains comments into nodes and drops stray terminators.
    fn skip_trivia(&mut self, nodes: &mut Vec<Node>) {
        while let Some(token) = self.tokens.get(self.cursor) {
            match token.kind {
                TokenKind::Comment => nodes.push(Node::Comment(token.text.clone())),
                TokenKind::Newline | TokenKind::Semicolon => (),
                _ => break,
            }
            self.cursor += 1;
        }
    }

    /// Skips past the failed statement: through the next `;` or line break,
    /// up to the first token on a later line than the error, or up to the
    /// end of the enclosing block.
    fn resynchronize(&mut self, start: usize, end: &[TokenKind]) {
        let mut line = 0;
        if let Some(error) = self.errors.last() {
            debug!(%error, "recovering from parse error");
            line = error.pos.line;
        }
        loop {
            let token = self.peek();
            let kind = token.kind;
            match kind {
                _ if token.line > line && self.cursor != start => break,
                TokenKind::Eof | TokenKind::RBrace | TokenKind::Dedent => break,
                _ if end.contains(&kind) => break,
                TokenKind::Semicolon | TokenKind::Newline => {
                    self.advance();
                    break;
                }
                _ => {
                    self.advance();
                }
            }
        }
        if self.cursor == start {
            self.advance();
        }
    }

    fn parse_statement(&mut self) -> Result<Option<Node>> {
        let token = self.peek();
        let node = match token.kind {
            TokenKind::Decorator => return self.parse_annotation(),
            TokenKind::ForeignBlock(index) => {
                self.advance();
                match self.blocks.get(index as usize) {
                    Some(block) => Node::Foreign(block.clone()),
                    None => {
                        self.error(ParseErrorKind::UnknownForeignBlock(index), token.pos());
                        return Err(());
                    }
                }
            }
            kind if kind.is_access() && self.peek_nth(1).kind == TokenKind::Colon => {
                self.parse_label()?
            }
            kind if kind.is_modifier() => {
                let modifiers = self.parse_modifiers();
                self.parse_declaration(modifiers)?
            }
            TokenKind::Func => self.parse_function(Vec::new(), None)?,
            TokenKind::Class => self.parse_class(Vec::new())?,
            TokenKind::Main => {
                self.advance();
                Node::MainBlock(self.parse_block()?)
            }
            TokenKind::Namespace => {
                self.advance();
                let name = self.parse_name()?;
                let body = self.parse_block()?;
                Node::Namespace { name, body }
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => {
                self.advance();
                let cond = self.parse_condition()?.boxed();
                let body = self.parse_block()?;
                Node::While { cond, body }
            }
            TokenKind::For => self.parse_for()?,
            TokenKind::Match => {
                self.advance();
                Node::Match(self.parse_match()?)
            }
            TokenKind::Switch => {
                self.advance();
                Node::Switch(self.parse_match()?)
            }
            TokenKind::Try => self.parse_try()?,
            TokenKind::Return => {
                self.advance();
                let value = if self.continues_line(token.line) {
                    Some(self.parse_expr()?.boxed())
                } else {
                    None
                };
                Node::Return(value)
            }
            TokenKind::Throw => {
                self.advance();
                Node::Throw(self.parse_expr()?.boxed())
            }
            TokenKind::Break => {
                self.advance();
                Node::Break
            }
            TokenKind::Continue => {
                self.advance();
                Node::Continue
            }
            _ => self.parse_declaration_or_expr(Vec::new())?,
        };
        self.take(TokenKind::Semicolon);
        Ok(Some(node))
    }

    fn parse_modifiers(&mut self) -> Vec<Modifier> {
        let mut modifiers = Vec::new();
        loop {
            let modifier = match self.peek().kind {
                TokenKind::Private => Modifier::Private,
                TokenKind::Public => Modifier::Public,
                TokenKind::Protected => Modifier::Protected,
                TokenKind::Const => Modifier::Const,
                TokenKind::Consteval => Modifier::Consteval,
                TokenKind::Constexpr => Modifier::Constexpr,
                TokenKind::Static => Modifier::Static,
                TokenKind::Abstract => Modifier::Abstract,
                TokenKind::Override => Modifier::Override,
                TokenKind::Virtual => Modifier::Virtual,
                _ => return modifiers,
            };
            self.advance();
            modifiers.push(modifier);
        }
    }

    /// `public:` opens an access section. In indentation mode the section
    /// may own an indented block.
    fn parse_label(&mut self) -> Result<Node> {
        let label = self.parse_modifiers().into_iter().next();
        self.consume(TokenKind::Colon)?;
        let children = if self.is(TokenKind::Newline) && self.peek_nth(1).kind == TokenKind::Indent
        {
            self.advance();
            let indent = self.advance();
            let children = self.parse_statements(&[TokenKind::Dedent]);
            self.close_block(TokenKind::Dedent, indent)?;
            children
        } else {
            Vec::new()
        };
        Ok(Node::Divider {
            label,
            body: Body::nested(children),
        })
    }

    fn parse_declaration(&mut self, mut modifiers: Vec<Modifier>) -> Result<Node> {
        match self.peek().kind {
            TokenKind::Func => self.parse_function(modifiers, None),
            TokenKind::Class => self.parse_class(modifiers),
            _ => {
                if let Some(node) = self.try_declaration(&mut modifiers)? {
                    return Ok(node);
                }
                if let Some(node) = self.try_function_definition(&mut modifiers)? {
                    return Ok(node);
                }
                self.unexpected("declaration")
            }
        }
    }

    fn parse_declaration_or_expr(&mut self, mut modifiers: Vec<Modifier>) -> Result<Node> {
        if let Some(node) = self.try_declaration(&mut modifiers)? {
            return Ok(node);
        }
        if let Some(node) = self.try_function_definition(&mut modifiers)? {
            return Ok(node);
        }
        self.parse_expr()
    }

    /// `Type name [= value]`, `Type a, b [= value]` and `Type func ...`.
    ///
    /// Speculative: a type followed by a name on the same line, then `=`,
    /// `;`, `,` or the end of the line. Anything else rolls back.
    fn try_declaration(&mut self, modifiers: &mut Vec<Modifier>) -> Result<Option<Node>> {
        let start = self.cursor;
        let first = self.peek();
        let Some(ty) = self.speculate(Parser::parse_type) else {
            return Ok(None);
        };

        if self.is(TokenKind::Func) {
            return self
                .parse_function(std::mem::take(modifiers), Some(ty))
                .map(Some);
        }

        let name = self.peek();
        let after = self.peek_nth(1);
        let declares = name.kind == TokenKind::Ident
            && name.line == first.line
            && (after.line != name.line
                || matches!(
                    after.kind,
                    TokenKind::Assign
                        | TokenKind::Semicolon
                        | TokenKind::Comma
                        | TokenKind::RBrace
                        | TokenKind::Newline
                        | TokenKind::Dedent
                        | TokenKind::Eof
                ));
        if !declares {
            trace!(ty, "not a declaration, rolling back");
            self.cursor = start;
            return Ok(None);
        }
        self.advance();

        let mut names = vec![name.text.clone()];
        while self.take(TokenKind::Comma) {
            names.push(self.consume(TokenKind::Ident)?.text.clone());
        }
        let value = if self.take(TokenKind::Assign) {
            Some(self.parse_expr()?.boxed())
        } else {
            None
        };

        let modifiers = std::mem::take(modifiers);
        let node = if names.len() == 1 {
            Node::VarDecl(VarDecl {
                modifiers,
                ty,
                name: names.remove(0),
                value,
            })
        } else {
            Node::MultiVarDecl(MultiVarDecl {
                modifiers,
                ty,
                names,
                value,
            })
        };
        Ok(Some(node))
    }

    /// Constructor-style `Name(params) [: a(x), b(y)] block`. The parameter
    /// list is parsed tentatively; unless a body opener or an initializer
    /// list follows, it was a call.
    fn try_function_definition(&mut self, modifiers: &mut Vec<Modifier>) -> Result<Option<Node>> {
        if !(self.is(TokenKind::Ident) && self.peek_nth(1).kind == TokenKind::LParen) {
            return Ok(None);
        }
        let start = self.cursor;
        let name = self.advance().text.clone();
        let Some(params) = self.speculate(Parser::parse_params) else {
            self.cursor = start;
            return Ok(None);
        };
        let defines = match self.peek().kind {
            TokenKind::LBrace | TokenKind::FatArrow | TokenKind::Arrow => true,
            TokenKind::Colon => {
                self.peek_nth(1).kind == TokenKind::Newline || self.at_member_inits()
            }
            _ => false,
        };
        if !defines {
            trace!(name, "call, not a definition, rolling back");
            self.cursor = start;
            return Ok(None);
        }

        let ret = if self.take(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        // With a return type, `: f(x)` is a one-line body instead.
        let inits = if ret.is_none() && self.at_member_inits() {
            self.parse_member_inits()?
        } else {
            Vec::new()
        };
        let body = self.parse_function_body()?;
        Ok(Some(Node::Function(Function {
            modifiers: std::mem::take(modifiers),
            name,
            generics: Vec::new(),
            params,
            ret,
            inits,
            body,
        })))
    }

    fn at_member_inits(&self) -> bool {
        self.is(TokenKind::Colon)
            && self.peek_nth(1).kind == TokenKind::Ident
            && self.peek_nth(2).kind == TokenKind::LParen
    }

    fn parse_member_inits(&mut self) -> Result<Vec<MemberInit>> {
        self.consume(TokenKind::Colon)?;
        let mut inits = Vec::new();
        loop {
            let name = self.consume(TokenKind::Ident)?.text.clone();
            let open = self.consume(TokenKind::LParen)?;
            let args = self.parse_list(TokenKind::RParen, Parser::parse_expr)?;
            self.close(TokenKind::RParen, open)?;
            inits.push(MemberInit { name, args });
            if !self.take(TokenKind::Comma) {
                break Ok(inits);
            }
        }
    }

    /// `func name[generics](params) [-> Type] body`. `ret` carries the
    /// leading type of `Type func name(...)`.
    fn parse_function(&mut self, modifiers: Vec<Modifier>, ret: Option<String>) -> Result<Node> {
        self.consume(TokenKind::Func)?;
        let name_token = self.peek();
        if !matches!(
            name_token.kind,
            TokenKind::Ident | TokenKind::Type | TokenKind::Main
        ) {
            return self.unexpected("function name");
        }
        self.advance();
        let (name, generics) = self.parse_generic_name(name_token)?;
        let params = self.parse_params()?;

        let ret = if self.take(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else if ret.is_some() {
            ret
        } else if name == "main" {
            Some("int".to_owned())
        } else {
            Some("auto".to_owned())
        };
        let body = self.parse_function_body()?;

        Ok(Node::Function(Function {
            modifiers,
            name,
            generics,
            params,
            ret,
            inits: Vec::new(),
            body,
        }))
    }

    /// A block, or `=> expr` standing for a single `return`.
    fn parse_function_body(&mut self) -> Result<Body> {
        if self.take(TokenKind::FatArrow) {
            let value = self.parse_expr()?;
            return Ok(Body::nested(vec![Node::Return(Some(value.boxed()))]));
        }
        self.parse_block()
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        let open = self.consume(TokenKind::LParen)?;
        let params = self.parse_list(TokenKind::RParen, Parser::parse_param)?;
        self.close(TokenKind::RParen, open)?;
        Ok(params)
    }

    /// `name`, `Type name`, either with an optional `= default`.
    fn parse_param(&mut self) -> Result<Param> {
        let untyped = self.is(TokenKind::Ident)
            && matches!(
                self.peek_nth(1).kind,
                TokenKind::Comma | TokenKind::RParen | TokenKind::Assign
            );
        let ty = if untyped {
            None
        } else {
            Some(self.parse_type()?)
        };
        let name = self.consume(TokenKind::Ident)?.text.clone();
        let default = if self.take(TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Param { ty, name, default })
    }

    /// Splits a declared name from its generic parameters: either fused by
    /// the lexer (`Box<T>`) or written as an adjacent `[T]` list.
    fn parse_generic_name(&mut self, token: &'tok Token) -> Result<(String, Vec<GenericParam>)> {
        if let Some((name, rest)) = token.text.split_once('<') {
            let inner = rest.strip_suffix('>').unwrap_or(rest);
            let generics = self.parse_generics(inner, token.pos())?;
            return Ok((name.to_owned(), generics));
        }
        let next = self.peek();
        if next.kind == TokenKind::LBracket && next.span.lo == token.span.hi() {
            let text = self.bracketed_text()?;
            let inner = &text[1..text.len() - 1];
            let generics = self.parse_generics(inner, next.pos())?;
            return Ok((token.text.clone(), generics));
        }
        Ok((token.text.clone(), Vec::new()))
    }

    /// Parses `T, U = int, int N = 3`.
    fn parse_generics(&mut self, text: &str, pos: Position) -> Result<Vec<GenericParam>> {
        let mut generics: Vec<GenericParam> = Vec::new();
        for item in split_top_level(text, ',') {
            let (decl, default) = match split_top_level(item, '=').as_slice() {
                [decl] => (*decl, None),
                [decl, default] if !default.trim().is_empty() => {
                    (*decl, Some(default.trim().to_owned()))
                }
                _ => return self.malformed_generics(text, pos),
            };
            let words: Vec<_> = decl.split_whitespace().collect();
            let (ty, name) = match words.as_slice() {
                [name] => (None, *name),
                [ty @ .., name] if !ty.is_empty() => (Some(ty.join(" ")), *name),
                _ => return self.malformed_generics(text, pos),
            };
            if !is_identifier(name) {
                return self.malformed_generics(text, pos);
            }
            if generics.iter().any(|g| g.name == name) {
                self.error(ParseErrorKind::DuplicateGeneric(name.to_owned()), pos);
                return Err(());
            }
            generics.push(GenericParam {
                name: name.to_owned(),
                ty,
                default,
            });
        }
        Ok(generics)
    }

    fn malformed_generics<T>(&mut self, text: &str, pos: Position) -> Result<T> {
        self.error(ParseErrorKind::MalformedGenerics(text.trim().to_owned()), pos);
        Err(())
    }

    /// `class Name[generics] [(A, B) | : A, B] body`. The body is grouped
    /// into access sections.
    fn parse_class(&mut self, modifiers: Vec<Modifier>) -> Result<Node> {
        self.consume(TokenKind::Class)?;
        let name_token = self.peek();
        if !name_token.kind.is_name() {
            return self.unexpected("class name");
        }
        self.advance();
        let (name, generics) = self.parse_generic_name(name_token)?;

        let mut parents = Vec::new();
        if self.is(TokenKind::LParen) {
            let open = self.advance();
            parents = self.parse_list(TokenKind::RParen, Parser::parse_type)?;
            self.close(TokenKind::RParen, open)?;
        } else if self.is(TokenKind::Colon) && self.peek_nth(1).kind.is_name() {
            self.advance();
            parents.push(self.parse_type()?);
            while self.take(TokenKind::Comma) {
                parents.push(self.parse_type()?);
            }
        }

        let body = self.parse_block()?;
        let mut sections = Vec::new();
        let mut current: Option<(Option<Modifier>, Vec<Node>)> = None;
        let flush = |current: &mut Option<(Option<Modifier>, Vec<Node>)>, sections: &mut Vec<Node>| {
            if let Some((label, children)) = current.take() {
                sections.push(Node::Divider {
                    label,
                    body: Body::nested(children),
                });
            }
        };
        for node in body.children {
            match node {
                Node::Divider { label, body } if body.children.is_empty() => {
                    flush(&mut current, &mut sections);
                    current = Some((label, Vec::new()));
                }
                divider @ Node::Divider { .. } => {
                    flush(&mut current, &mut sections);
                    sections.push(divider);
                }
                member => current.get_or_insert_with(|| (None, Vec::new())).1.push(member),
            }
        }
        flush(&mut current, &mut sections);

        Ok(Node::Class(Class {
            modifiers,
            name,
            generics,
            parents,
            body: Body::new(sections, 0),
        }))
    }

    fn parse_if(&mut self) -> Result<Node> {
        self.consume(TokenKind::If)?;
        let mut branches = vec![(self.parse_condition()?, self.parse_block()?)];
        loop {
            if self.is(TokenKind::Else) && self.peek_nth(1).kind == TokenKind::If {
                self.advance();
            } else if !self.is(TokenKind::Elif) {
                break;
            }
            self.advance(); // `if` or `elif`
            branches.push((self.parse_condition()?, self.parse_block()?));
        }
        let otherwise = if self.take(TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Node::If(If {
            branches,
            otherwise,
        }))
    }

    /// `for x in xs`, `for Type x in xs` or `for init; cond; update`, each
    /// optionally parenthesized. The form is decided by looking for `in` at
    /// the head's top level.
    fn parse_for(&mut self) -> Result<Node> {
        self.consume(TokenKind::For)?;
        let open = if self.is(TokenKind::LParen) {
            Some(self.peek())
        } else {
            None
        };
        let for_in = self.head_has_in(open.is_some());
        if open.is_some() {
            self.advance();
        }

        let node = if for_in {
            let ty = if self.is(TokenKind::Ident) && self.peek_nth(1).kind == TokenKind::In {
                None
            } else {
                Some(self.parse_type()?)
            };
            let var = self.consume(TokenKind::Ident)?.text.clone();
            self.consume(TokenKind::In)?;
            let iter = self.parse_expr()?.boxed();
            if let Some(open) = open {
                self.close(TokenKind::RParen, open)?;
            }
            let body = self.parse_block()?;
            Node::ForIn(ForIn {
                ty,
                var,
                iter,
                body,
            })
        } else {
            let init = if self.is(TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_declaration_or_expr(Vec::new())?.boxed())
            };
            self.consume(TokenKind::Semicolon)?;
            let cond = if self.is(TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_expr()?.boxed())
            };
            self.consume(TokenKind::Semicolon)?;
            let update = if self.is(TokenKind::RParen) || self.at_block_opener() {
                None
            } else {
                Some(self.parse_expr()?.boxed())
            };
            if let Some(open) = open {
                self.close(TokenKind::RParen, open)?;
            }
            let body = self.parse_block()?;
            Node::ForC(ForC {
                init,
                cond,
                update,
                body,
            })
        };
        Ok(node)
    }

    /// Scans the loop head for a top-level `in` without consuming anything.
    fn head_has_in(&self, parenthesized: bool) -> bool {
        let mut depth = 0_usize;
        for token in &self.tokens[self.cursor.min(self.tokens.len())..] {
            match token.kind {
                TokenKind::In if depth == usize::from(parenthesized) => return true,
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::LBrace if depth == 0 => return false,
                TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth <= 1 && parenthesized {
                        return false;
                    }
                    depth = depth.saturating_sub(1);
                }
                TokenKind::Colon if depth == 0 => return false,
                TokenKind::Newline | TokenKind::Eof => return false,
                _ => (),
            }
        }
        false
    }

    /// `match`/`switch` after the keyword: a subject, then `case pattern`
    /// and `default` arms in a block.
    fn parse_match(&mut self) -> Result<Match> {
        let subject = self.parse_condition()?.boxed();
        let (end, open) = self.open_block()?;
        let mut arms = Vec::new();
        let mut default = None;
        loop {
            self.skip_trivia(&mut Vec::new());
            match self.peek().kind {
                kind if kind == end || kind == TokenKind::Eof => break,
                TokenKind::Case => {
                    self.advance();
                    let pattern = self.parse_expr()?;
                    arms.push((pattern, self.parse_arm_body()?));
                }
                TokenKind::Default | TokenKind::Else => {
                    self.advance();
                    default = Some(self.parse_arm_body()?);
                }
                _ => return self.unexpected("`case` or `default`"),
            }
        }
        self.close_block(end, open)?;
        Ok(Match {
            subject,
            arms,
            default,
        })
    }

    fn parse_arm_body(&mut self) -> Result<Body> {
        if self.take(TokenKind::FatArrow) {
            let children = self.parse_statement()?.into_iter().collect();
            return Ok(Body::nested(children));
        }
        self.parse_block()
    }

    fn parse_try(&mut self) -> Result<Node> {
        let try_token = self.consume(TokenKind::Try)?;
        let body = self.parse_block()?;
        let mut handlers = Vec::new();
        while self.take(TokenKind::Catch) {
            let open = if self.is(TokenKind::LParen) {
                Some(self.advance())
            } else {
                None
            };
            let (mut ty, mut name) = (None, None);
            let closed = self.is(TokenKind::RParen);
            if !closed && (open.is_some() || !self.at_block_opener()) {
                ty = Some(self.parse_type()?);
                if self.is(TokenKind::Ident) {
                    name = Some(self.advance().text.clone());
                }
            }
            if let Some(open) = open {
                self.close(TokenKind::RParen, open)?;
            }
            let body = self.parse_block()?;
            handlers.push(Catch { ty, name, body });
        }
        let finally = if self.take(TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handlers.is_empty() && finally.is_none() {
            let found = describe(self.peek());
            self.error(
                ParseErrorKind::Unexpected {
                    found,
                    expected: "`catch` or `finally`",
                },
                try_token.pos(),
            );
            return Err(());
        }
        Ok(Node::Try(Try {
            body,
            handlers,
            finally,
        }))
    }

    fn parse_annotation(&mut self) -> Result<Option<Node>> {
        let token = self.advance();
        let Some(&annotation) = ANNOTATIONS.get(token.text.as_str()) else {
            let kind = if token.text == "cpp" {
                ParseErrorKind::MissingForeignBlock
            } else {
                ParseErrorKind::UnknownAnnotation(token.text.clone())
            };
            self.error(kind, token.pos());
            return Err(());
        };

        let node = match annotation {
            Annotation::Include => {
                let header = self.peek();
                if !matches!(header.kind, TokenKind::AngleSpan | TokenKind::String) {
                    return self.unexpected("header after `@include`");
                }
                self.advance();
                debug!(header = %header.text, "include");
                self.includes.insert(header.text.clone());
                return Ok(None);
            }
            Annotation::Using => {
                self.take(TokenKind::Namespace);
                Node::Using(self.parse_name()?)
            }
            Annotation::Alias => {
                let name = self.consume(TokenKind::Ident)?.text.clone();
                self.consume(TokenKind::Assign)?;
                let target = self.parse_type()?;
                Node::Alias { name, target }
            }
            Annotation::Define => {
                let name = self.peek();
                if !name.kind.is_name() {
                    return self.unexpected("macro name");
                }
                self.advance();
                let value = if self.continues_line(name.line) {
                    Some(self.parse_expr()?.boxed())
                } else {
                    None
                };
                Node::Define {
                    name: name.text.clone(),
                    value,
                }
            }
            Annotation::Assert => {
                let (cond, message) = if self.is(TokenKind::LParen) {
                    let open = self.advance();
                    let cond = self.parse_expr()?;
                    let message = if self.take(TokenKind::Comma) {
                        Some(self.parse_expr()?.boxed())
                    } else {
                        None
                    };
                    self.close(TokenKind::RParen, open)?;
                    (cond, message)
                } else {
                    let cond = self.parse_expr()?;
                    let message = if self.take(TokenKind::Comma) {
                        Some(self.parse_expr()?.boxed())
                    } else {
                        None
                    };
                    (cond, message)
                };
                Node::Assert {
                    cond: cond.boxed(),
                    message,
                }
            }
            Annotation::Namespace => {
                let name = self.parse_name()?;
                let body = self.parse_block()?;
                Node::Namespace { name, body }
            }
            Annotation::Panic => {
                let message = if self.is(TokenKind::LParen) {
                    let open = self.advance();
                    let message = if self.is(TokenKind::RParen) {
                        None
                    } else {
                        Some(self.parse_expr()?.boxed())
                    };
                    self.close(TokenKind::RParen, open)?;
                    message
                } else if self.continues_line(token.line) {
                    Some(self.parse_expr()?.boxed())
                } else {
                    None
                };
                Node::Panic(message)
            }
            Annotation::Marker(marker) => Node::Marker(marker),
        };
        self.take(TokenKind::Semicolon);
        Ok(Some(node))
    }

    /// A `{ ... }` block, an indented `:` block, or `:` followed by a single
    /// statement on the same line.
    fn parse_block(&mut self) -> Result<Body> {
        if self.is(TokenKind::Colon) && self.peek_nth(1).kind != TokenKind::Newline {
            self.advance();
            let children = self.parse_statement()?.into_iter().collect();
            return Ok(Body::nested(children));
        }
        let (end, open) = self.open_block()?;
        let children = self.parse_statements(&[end]);
        self.close_block(end, open)?;
        Ok(Body::nested(children))
    }

    /// Consumes a block opener, returning the token that will close it.
    fn open_block(&mut self) -> Result<(TokenKind, &'tok Token)> {
        let token = self.peek();
        match token.kind {
            TokenKind::LBrace => {
                self.advance();
                Ok((TokenKind::RBrace, token))
            }
            TokenKind::Colon
                if self.peek_nth(1).kind == TokenKind::Newline
                    && self.peek_nth(2).kind == TokenKind::Indent =>
            {
                self.advance();
                self.advance();
                self.advance();
                Ok((TokenKind::Dedent, token))
            }
            _ => self.unexpected("block"),
        }
    }

    fn close_block(&mut self, end: TokenKind, open: &'tok Token) -> Result<()> {
        if self.halted() {
            return Err(());
        }
        self.close(end, open).map(drop)
    }

    fn at_block_opener(&self) -> bool {
        matches!(self.peek().kind, TokenKind::LBrace | TokenKind::Colon)
    }

    /// A condition; redundant outer parentheses are dropped since the
    /// emitted statement adds its own.
    fn parse_condition(&mut self) -> Result<Node> {
        match self.parse_expr()? {
            Node::Paren(inner) => Ok(*inner),
            other => Ok(other),
        }
    }

    /// A type in declaration position: a name (possibly fused with angle
    /// generics), an adjacent `[...]` argument list, then any adjacent `*`
    /// or `&`.
    fn parse_type(&mut self) -> Result<String> {
        let token = self.peek();
        if !token.kind.is_name() {
            return self.unexpected("type");
        }
        self.advance();
        let mut ty = token.text.clone();
        let mut end = token.span.hi();

        let next = self.peek();
        if next.kind == TokenKind::LBracket && next.span.lo == end {
            ty.push_str(&self.bracketed_text()?);
            end = self.previous().span.hi();
        }
        loop {
            let next = self.peek();
            if !matches!(next.kind, TokenKind::Star | TokenKind::Amp) || next.span.lo != end {
                break;
            }
            self.advance();
            ty.push_str(&next.text);
            end = next.span.hi();
        }
        Ok(ty)
    }

    /// Consumes a balanced `[...]` on one line and returns its text,
    /// brackets included, with the original spacing between tokens.
    fn bracketed_text(&mut self) -> Result<String> {
        let open = self.consume(TokenKind::LBracket)?;
        let mut text = open.text.clone();
        let mut end = open.span.hi();
        let mut depth = 1_usize;
        while depth > 0 {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof | TokenKind::Newline => {
                    self.error(
                        ParseErrorKind::Unclosed {
                            delimiter: open.kind.describe(),
                        },
                        open.pos(),
                    );
                    return Err(());
                }
                TokenKind::LBracket => depth += 1,
                TokenKind::RBracket => depth -= 1,
                _ => (),
            }
            self.advance();
            if token.span.lo != end {
                text.push(' ');
            }
            text.push_str(&token.text);
            end = token.span.hi();
        }
        Ok(text)
    }

    /// An identifier or `a::b` path.
    fn parse_name(&mut self) -> Result<String> {
        let token = self.peek();
        if !matches!(token.kind, TokenKind::Ident | TokenKind::Path) {
            return self.unexpected("name");
        }
        self.advance();
        Ok(token.text.clone())
    }

    /// Whether another operand follows on the line `line`.
    fn continues_line(&self, line: u32) -> bool {
        let next = self.peek();
        next.line == line
            && !matches!(
                next.kind,
                TokenKind::Semicolon
                    | TokenKind::Newline
                    | TokenKind::RBrace
                    | TokenKind::Dedent
                    | TokenKind::Eof
            )
    }
}

// Expressions.
impl<'tok> Parser<'tok> {
    fn parse_expr(&mut self) -> Result<Node> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Node> {
        // Closers are left in place for the enclosing construct.
        if matches!(
            self.peek().kind,
            TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Newline
                | TokenKind::Dedent
                | TokenKind::Semicolon
                | TokenKind::Eof
        ) {
            return self.unexpected("expression");
        }
        let mut lhs = match self.try_arrow_lambda()? {
            Some(lambda) => lambda,
            None => {
                let lhs_token = self.advance();
                self.parse_nud(lhs_token)?
            }
        };

        loop {
            let op_token = self.peek();

            if let Some(lbp) = Self::postfix_binding_power(op_token.kind) {
                if lbp < min_bp {
                    break;
                }
                self.advance(); // Operator
                lhs = self.parse_postfix(op_token, lhs)?;
                continue;
            }

            if let Some((lbp, rbp)) = Self::infix_binding_power(op_token.kind) {
                if lbp < min_bp {
                    // Operator binds less tightly than the minimum required
                    break;
                }
                self.advance(); // Operator
                lhs = self.parse_led(op_token, lhs, rbp)?;
            } else {
                // Not an infix operator
                break;
            }
        }

        Ok(lhs)
    }

    /// nud: Parses tokens that start an expression
    /// (prefix operators, literals, grouping)
    fn parse_nud(&mut self, token: &'tok Token) -> Result<Node> {
        let node = match token.kind {
            TokenKind::Number => self.number(token, false)?,
            TokenKind::String => Node::Str(token.text.clone()),
            TokenKind::RawString => Node::RawStr(extract::raw_string(token).to_owned()),
            TokenKind::InterpString => self.interpolation(token)?,
            TokenKind::Char => Node::Char(token.text.clone()),
            TokenKind::True => Node::Bool(true),
            TokenKind::False => Node::Bool(false),
            TokenKind::Null => Node::Null,
            TokenKind::Ident | TokenKind::Path => Node::Ident(token.text.clone()),
            TokenKind::Type => Node::TypeName(token.text.clone()),
            TokenKind::This => Node::This,
            TokenKind::Lambda => self.parse_lambda()?,

            // Grouping `(a)` or tuple `(a, b)`
            TokenKind::LParen => {
                let items = self.parse_list(TokenKind::RParen, Parser::parse_expr)?;
                let trailing_comma = self.previous().kind == TokenKind::Comma;
                self.close(TokenKind::RParen, token)?;
                match <[Node; 1]>::try_from(items) {
                    Ok([item]) if !trailing_comma => Node::Paren(item.boxed()),
                    Ok([item]) => Node::Container {
                        kind: ContainerKind::Tuple,
                        items: vec![item],
                    },
                    Err(items) => Node::Container {
                        kind: ContainerKind::Tuple,
                        items,
                    },
                }
            }

            // List `[a, b]`
            TokenKind::LBracket => {
                let items = self.parse_list(TokenKind::RBracket, Parser::parse_expr)?;
                self.close(TokenKind::RBracket, token)?;
                Node::Container {
                    kind: ContainerKind::List,
                    items,
                }
            }

            // Map `{k: v}` or set `{a, b}`
            TokenKind::LBrace => self.parse_braced(token)?,

            // Negative literals are folded so that based literals can be
            // re-encoded.
            TokenKind::Minus if self.is(TokenKind::Number) => {
                let number = self.advance();
                self.number(number, true)?
            }

            TokenKind::Tilde => {
                let rbp = Self::prefix_binding_power(token.kind).unwrap_or(u8::MAX);
                let operand = self.parse_expr_bp(rbp)?;
                Node::Bitwise(Bitwise {
                    op: BitOp::Not,
                    lhs: operand.boxed(),
                    rhs: None,
                })
            }

            kind @ (TokenKind::Bang
            | TokenKind::Not
            | TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus
            | TokenKind::Star
            | TokenKind::Amp) => {
                let op = match kind {
                    TokenKind::Bang | TokenKind::Not => UnaryOp::Not,
                    TokenKind::Minus => UnaryOp::Neg,
                    TokenKind::Plus => UnaryOp::Plus,
                    TokenKind::PlusPlus => UnaryOp::PreInc,
                    TokenKind::MinusMinus => UnaryOp::PreDec,
                    TokenKind::Star => UnaryOp::Deref,
                    _ => UnaryOp::AddrOf,
                };
                let rbp = Self::prefix_binding_power(kind).unwrap_or(u8::MAX);
                let operand = self.parse_expr_bp(rbp)?;
                Node::Unary {
                    op,
                    operand: operand.boxed(),
                }
            }

            _ => {
                let found = describe(token);
                self.error(
                    ParseErrorKind::Unexpected {
                        found,
                        expected: "expression",
                    },
                    token.pos(),
                );
                return Err(());
            }
        };
        Ok(node)
    }

    /// led: Parses infix operators following a left-hand-side expression.
    fn parse_led(&mut self, op_token: &'tok Token, lhs: Node, rbp: u8) -> Result<Node> {
        use TokenKind as T;

        let binary = |rhs: Node| -> Option<Node> {
            let (lhs, rhs) = (lhs.clone().boxed(), rhs.boxed());
            let node = match op_token.kind {
                T::Plus | T::PlusEq => Node::Arithmetic(Binary { op: ArithOp::Add, lhs, rhs }),
                T::Minus | T::MinusEq => Node::Arithmetic(Binary { op: ArithOp::Sub, lhs, rhs }),
                T::Star | T::StarEq => Node::Arithmetic(Binary { op: ArithOp::Mul, lhs, rhs }),
                T::Slash | T::SlashEq => Node::Arithmetic(Binary { op: ArithOp::Div, lhs, rhs }),
                T::Percent | T::PercentEq => {
                    Node::Arithmetic(Binary { op: ArithOp::Rem, lhs, rhs })
                }
                T::Shl | T::ShlEq => Node::Shift(Binary { op: ShiftOp::Shl, lhs, rhs }),
                T::Shr | T::ShrEq => Node::Shift(Binary { op: ShiftOp::Shr, lhs, rhs }),
                T::Amp | T::AmpEq => bitwise(BitOp::And, lhs, rhs),
                T::Pipe | T::PipeEq => bitwise(BitOp::Or, lhs, rhs),
                T::Caret | T::CaretEq => bitwise(BitOp::Xor, lhs, rhs),
                T::EqEq => Node::Comparison(Binary { op: CmpOp::Eq, lhs, rhs }),
                T::NotEq => Node::Comparison(Binary { op: CmpOp::NotEq, lhs, rhs }),
                T::Less => Node::Comparison(Binary { op: CmpOp::Less, lhs, rhs }),
                T::LessEq => Node::Comparison(Binary { op: CmpOp::LessEq, lhs, rhs }),
                T::Greater => Node::Comparison(Binary { op: CmpOp::Greater, lhs, rhs }),
                T::GreaterEq => Node::Comparison(Binary { op: CmpOp::GreaterEq, lhs, rhs }),
                T::AmpAmp | T::And => Node::Logical(Binary { op: LogicOp::And, lhs, rhs }),
                T::PipePipe | T::Or => Node::Logical(Binary { op: LogicOp::Or, lhs, rhs }),
                _ => return None,
            };
            Some(node)
        };

        match op_token.kind {
            // Ternary: cond ? then : otherwise
            T::Question => {
                let then = self.parse_expr()?;
                self.consume(T::Colon)?;
                let otherwise = self.parse_expr_bp(rbp)?;
                Ok(Node::Ternary {
                    cond: lhs.boxed(),
                    then: then.boxed(),
                    otherwise: otherwise.boxed(),
                })
            }

            // Assignment; compound forms desugar to `x = x OP (y)`
            T::Assign
            | T::PlusEq
            | T::MinusEq
            | T::StarEq
            | T::SlashEq
            | T::PercentEq
            | T::AmpEq
            | T::PipeEq
            | T::CaretEq
            | T::ShlEq
            | T::ShrEq => {
                if !lhs.is_place() {
                    self.error(ParseErrorKind::InvalidAssignmentTarget, op_token.pos());
                    return Err(());
                }
                let value = self.parse_expr_bp(rbp)?;
                let value = if op_token.kind == T::Assign {
                    value
                } else {
                    let operand = if is_compound(&value) {
                        Node::Paren(value.boxed())
                    } else {
                        value
                    };
                    match binary(operand) {
                        Some(node) => node,
                        None => return self.unexpected_at(op_token, "operator"),
                    }
                };
                Ok(Node::Assign {
                    target: lhs.boxed(),
                    value: value.boxed(),
                })
            }

            _ => {
                let rhs = self.parse_expr_bp(rbp)?;
                match binary(rhs) {
                    Some(node) => Ok(node),
                    None => self.unexpected_at(op_token, "operator"),
                }
            }
        }
    }

    /// Postfix `++`/`--`, member access, indexing and calls.
    fn parse_postfix(&mut self, op_token: &'tok Token, lhs: Node) -> Result<Node> {
        let node = match op_token.kind {
            TokenKind::PlusPlus | TokenKind::MinusMinus => Node::Unary {
                op: if op_token.kind == TokenKind::PlusPlus {
                    UnaryOp::PostInc
                } else {
                    UnaryOp::PostDec
                },
                operand: lhs.boxed(),
            },
            TokenKind::Dot | TokenKind::ColonColon => {
                let name = self.peek();
                if !name.kind.is_name() {
                    return self.unexpected("member name");
                }
                self.advance();
                Node::Member {
                    object: lhs.boxed(),
                    name: name.text.clone(),
                    access: if op_token.kind == TokenKind::Dot {
                        Access::Dot
                    } else {
                        Access::Scope
                    },
                }
            }
            TokenKind::LBracket => {
                let index = self.parse_expr()?;
                self.close(TokenKind::RBracket, op_token)?;
                Node::Index {
                    object: lhs.boxed(),
                    index: index.boxed(),
                }
            }
            TokenKind::LParen => {
                let args = self.parse_list(TokenKind::RParen, Parser::parse_arg)?;
                self.close(TokenKind::RParen, op_token)?;
                let named = args.iter().filter(|arg| arg.name.is_some()).count();
                if named != 0 && named != args.len() {
                    self.error(ParseErrorKind::MixedArguments, op_token.pos());
                    return Err(());
                }
                Node::Call(Call {
                    callee: lhs.boxed(),
                    args,
                })
            }
            _ => return self.unexpected_at(op_token, "operator"),
        };
        Ok(node)
    }

    /// After `lambda`: an optional `[capture]`, the parameters, then the
    /// rest of [`Parser::finish_lambda`].
    fn parse_lambda(&mut self) -> Result<Node> {
        let capture = if self.is(TokenKind::LBracket) {
            let text = self.bracketed_text()?;
            text[1..text.len() - 1].trim().to_owned()
        } else {
            String::new()
        };
        let params = self.parse_params()?;
        self.finish_lambda(capture, params)
    }

    /// An optional `-> Type`, then `=> expr` or a block.
    fn finish_lambda(&mut self, capture: String, params: Vec<Param>) -> Result<Node> {
        let ret = if self.take(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_function_body()?;
        Ok(Node::Lambda(Lambda {
            capture,
            params,
            ret,
            body,
        }))
    }

    /// `(Type a, Type b) => expr` without the keyword. Every parameter must
    /// be typed, so `case (x) => ...` keeps its parenthesized pattern.
    fn try_arrow_lambda(&mut self) -> Result<Option<Node>> {
        if !self.is(TokenKind::LParen) {
            return Ok(None);
        }
        let start = self.cursor;
        match self.speculate(Parser::parse_params) {
            Some(params)
                if params.iter().all(|param| param.ty.is_some())
                    && matches!(self.peek().kind, TokenKind::FatArrow | TokenKind::Arrow) =>
            {
                self.finish_lambda(String::new(), params).map(Some)
            }
            _ => {
                self.cursor = start;
                Ok(None)
            }
        }
    }

    /// `name = value` (named) or a positional expression.
    fn parse_arg(&mut self) -> Result<Arg> {
        if self.is(TokenKind::Ident) && self.peek_nth(1).kind == TokenKind::Assign {
            let name = self.advance().text.clone();
            self.advance();
            let value = self.parse_expr()?;
            return Ok(Arg {
                name: Some(name),
                value,
            });
        }
        Ok(Arg {
            name: None,
            value: self.parse_expr()?,
        })
    }

    fn parse_braced(&mut self, open: &'tok Token) -> Result<Node> {
        if self.is(TokenKind::RBrace) {
            self.advance();
            return Ok(Node::Map(Vec::new()));
        }
        let first = self.parse_expr()?;
        if !self.take(TokenKind::Colon) {
            let mut items = vec![first];
            while self.take(TokenKind::Comma) && !self.is(TokenKind::RBrace) {
                items.push(self.parse_expr()?);
            }
            self.close(TokenKind::RBrace, open)?;
            return Ok(Node::Container {
                kind: ContainerKind::Set,
                items,
            });
        }
        let mut pairs = vec![(first, self.parse_expr()?)];
        while self.take(TokenKind::Comma) && !self.is(TokenKind::RBrace) {
            let key = self.parse_expr()?;
            self.consume(TokenKind::Colon)?;
            pairs.push((key, self.parse_expr()?));
        }
        self.close(TokenKind::RBrace, open)?;
        Ok(Node::Map(pairs))
    }

    fn number(&mut self, token: &'tok Token, negative: bool) -> Result<Node> {
        match NumberLiteral::parse(&token.text, negative) {
            Ok(number) => Ok(Node::Number(number)),
            Err(error) => {
                self.error(error.into(), token.pos());
                Err(())
            }
        }
    }

    /// Splits `$"..."` and parses every embedded expression on its own.
    fn interpolation(&mut self, token: &'tok Token) -> Result<Node> {
        let pieces = match split_interpolation(extract::interpolated(token)) {
            Ok(pieces) => pieces,
            Err(error) => {
                self.error(ParseErrorKind::Interpolation(error.to_string()), token.pos());
                return Err(());
            }
        };
        let mut fragments = Vec::with_capacity(pieces.len());
        for piece in pieces {
            match piece {
                Piece::Text(text) => fragments.push(Fragment::Text(text)),
                Piece::Expr(src) => match parse_fragment(src, self.blocks) {
                    Some(expr) => fragments.push(Fragment::Expr(expr)),
                    None => {
                        let message = format!("invalid expression `{src}` in interpolated string");
                        self.error(ParseErrorKind::Interpolation(message), token.pos());
                        return Err(());
                    }
                },
            }
        }
        Ok(Node::Interp(Interpolated { fragments }))
    }

    fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8)> {
        use TokenKind as T;
        let bp = match kind {
            // Assignment (right-associative)
            T::Assign
            | T::PlusEq
            | T::MinusEq
            | T::StarEq
            | T::SlashEq
            | T::PercentEq
            | T::AmpEq
            | T::PipeEq
            | T::CaretEq
            | T::ShlEq
            | T::ShrEq => (2, 1),

            // Ternary (right-associative)
            T::Question => (4, 3),

            T::PipePipe | T::Or => (5, 6),
            T::AmpAmp | T::And => (7, 8),
            T::Pipe => (9, 10),
            T::Caret => (11, 12),
            T::Amp => (13, 14),
            T::EqEq | T::NotEq => (15, 16),
            T::Less | T::LessEq | T::Greater | T::GreaterEq => (17, 18),
            T::Shl | T::Shr => (19, 20),
            T::Plus | T::Minus => (21, 22),
            T::Star | T::Slash | T::Percent => (23, 24),

            _ => return None,
        };
        Some(bp)
    }

    fn prefix_binding_power(kind: TokenKind) -> Option<u8> {
        use TokenKind as T;
        match kind {
            T::Bang
            | T::Not
            | T::Minus
            | T::Plus
            | T::Tilde
            | T::PlusPlus
            | T::MinusMinus
            | T::Star
            | T::Amp => Some(25),
            _ => None,
        }
    }

    fn postfix_binding_power(kind: TokenKind) -> Option<u8> {
        use TokenKind as T;
        match kind {
            T::PlusPlus | T::MinusMinus => Some(27),
            T::Dot | T::ColonColon | T::LBracket | T::LParen => Some(29),
            _ => None,
        }
    }

    /// Parses `item (, item)*` until `end`, allowing a trailing comma. Does
    /// **NOT** consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end: TokenKind,
        parse_item: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while self.except([end]) {
            items.push(parse_item(self)?);
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }
}

impl<'tok> Parser<'tok> {
    fn new(tokens: &'tok [Token], blocks: &'tok [String], recover: bool) -> Parser<'tok> {
        Parser {
            tokens,
            blocks,
            cursor: 0,
            errors: Vec::with_capacity(8),
            recover,
            includes: BTreeSet::new(),
        }
    }

    /// Adds an error.
    fn error(&mut self, kind: ParseErrorKind, pos: Position) {
        self.errors.push(ParseError { kind, pos });
    }

    /// Records an unexpected current token.
    fn unexpected<T>(&mut self, expected: &'static str) -> Result<T> {
        let token = self.peek();
        self.unexpected_at(token, expected)
    }

    fn unexpected_at<T>(&mut self, token: &'tok Token, expected: &'static str) -> Result<T> {
        let found = describe(token);
        self.error(ParseErrorKind::Unexpected { found, expected }, token.pos());
        Err(())
    }

    /// Whether parsing must stop: the first error ends a non-recovering
    /// parse.
    fn halted(&self) -> bool {
        !self.recover && !self.errors.is_empty()
    }

    /// Runs `f`, restoring the cursor and discarding its errors if it
    /// fails.
    fn speculate<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Option<T> {
        let cursor = self.cursor;
        let errors = self.errors.len();
        match f(self) {
            Ok(value) => Some(value),
            Err(()) => {
                trace!(cursor, "speculative parse failed, rolling back");
                self.cursor = cursor;
                self.errors.truncate(errors);
                None
            }
        }
    }

    /// Returns the current token. Comments are skipped.
    fn peek(&self) -> &'tok Token {
        self.peek_nth(0)
    }

    /// Returns the `n`-th token after the current one, skipping comments.
    fn peek_nth(&self, n: usize) -> &'tok Token {
        let mut left = n;
        for token in self.tokens.get(self.cursor..).unwrap_or_default() {
            if token.kind == TokenKind::Comment {
                continue;
            }
            if left == 0 || token.is_eof() {
                return token;
            }
            left -= 1;
        }
        self.eof()
    }

    /// The last consumed token.
    fn previous(&self) -> &'tok Token {
        self.tokens[..self.cursor.min(self.tokens.len())]
            .iter()
            .rev()
            .find(|t| t.kind != TokenKind::Comment)
            .unwrap_or(&EOF)
    }

    fn eof(&self) -> &'tok Token {
        self.tokens.last().filter(|t| t.is_eof()).unwrap_or(&EOF)
    }

    /// Returns the current token and advances. Never moves past the end.
    fn advance(&mut self) -> &'tok Token {
        while self
            .tokens
            .get(self.cursor)
            .is_some_and(|t| t.kind == TokenKind::Comment)
        {
            self.cursor += 1;
        }
        let token = self.peek();
        if !token.is_eof() {
            self.cursor += 1;
        }
        token
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one. If not,
    /// records an error.
    fn consume(&mut self, expect: TokenKind) -> Result<&'tok Token> {
        if self.is(expect) {
            Ok(self.advance())
        } else {
            self.unexpected(expect.describe())
        }
    }

    /// Consumes the delimiter closing `open`, reporting an unclosed
    /// delimiter at `open` if the input ended first.
    fn close(&mut self, expect: TokenKind, open: &'tok Token) -> Result<&'tok Token> {
        if self.is(expect) {
            return Ok(self.advance());
        }
        if self.peek().is_eof() {
            self.error(
                ParseErrorKind::Unclosed {
                    delimiter: open.kind.describe(),
                },
                open.pos(),
            );
            return Err(());
        }
        self.unexpected(expect.describe())
    }

    /// Returns true while the current token does *not* match one of the
    /// provided ones. [`TokenKind::Eof`] is implicitly included in the list.
    fn except(&self, except: impl IntoIterator<Item = TokenKind>) -> bool {
        let c = self.peek();
        !c.is_eof() && except.into_iter().all(|e| c.kind != e)
    }
}

/// Lexes and parses the source of one interpolation fragment.
fn parse_fragment(src: &str, blocks: &[String]) -> Option<Node> {
    let (tokens, _) = lexer::tokenize(src).ok()?;
    let mut p = Parser::new(&tokens, blocks, false);
    let expr = p.parse_expr().ok()?;
    (p.errors.is_empty() && p.peek().is_eof()).then_some(expr)
}

fn bitwise(op: BitOp, lhs: Box<Node>, rhs: Box<Node>) -> Node {
    Node::Bitwise(Bitwise {
        op,
        lhs,
        rhs: Some(rhs),
    })
}

/// Right operands that need parentheses once placed under a desugared
/// compound operator.
fn is_compound(node: &Node) -> bool {
    matches!(
        node,
        Node::Arithmetic(_)
            | Node::Shift(_)
            | Node::Bitwise(Bitwise { rhs: Some(_), .. })
            | Node::Comparison(_)
            | Node::Logical(_)
            | Node::Ternary { .. }
            | Node::Assign { .. }
    )
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Eof | TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent => {
            token.kind.describe().to_owned()
        }
        TokenKind::ForeignBlock(_) => "foreign block".to_owned(),
        TokenKind::Decorator => format!("`@{}`", token.text),
        _ => format!("`{}`", token.text),
    }
}

/// Splits on `sep` outside of brackets.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' | '<' | '(' => depth += 1,
            ']' | '>' | ')' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => (),
        }
    }
    parts.push(&text[start..]);
    parts
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
