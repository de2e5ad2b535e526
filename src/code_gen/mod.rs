//! C++ emission.
//!
//! There is no separate pass: every node renders itself through [`Render`],
//! and [`Program::render`] stitches the include block on top of the rendered
//! root body.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::{
    ast::{
        Access, Binary, BitOp, Bitwise, Body, Call, Catch, Class, ForC, ForIn,
        Fragment, Function, GenericParam, If, Interpolated, Lambda, Marker, Match, Modifier,
        Node, Operator, Program, Try, UnaryOp,
    },
    types::{convert, TypeMapError},
};

#[cfg(test)]
mod tests;

const INDENT_WIDTH: usize = 4;
const DEFAULT_CODE_CAPACITY: usize = 4 * 1024; // 4 KiB

/// Included by every generated unit.
pub const RUNTIME_INCLUDE: &str = "<runtime.hpp>";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("operator `{op}` is missing its right operand")]
    MissingOperand { op: &'static str },
    #[error("operator `{op}` takes a single operand")]
    ExtraOperand { op: &'static str },
    #[error(transparent)]
    TypeMap(#[from] TypeMapError),
}

type Result<T, E = RenderError> = std::result::Result<T, E>;

pub trait Render {
    fn render(&self, cx: &mut Context) -> Result<String>;
}

/// State shared by a whole rendering: the headers the emitted code needs.
#[derive(Debug, Default)]
pub struct Context {
    includes: BTreeSet<String>,
}

impl Context {
    /// Requests `#include <header>`; `header` carries its own delimiters.
    pub fn include(&mut self, header: &str) {
        self.includes.insert(header.to_owned());
    }

    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(String::as_str)
    }
}

impl Program {
    /// Renders the whole unit: sorted includes, a blank line, then the body.
    pub fn render(&self) -> Result<String> {
        let mut cx = Context::default();
        cx.include(RUNTIME_INCLUDE);
        for include in &self.includes {
            cx.include(include);
        }
        let body = self.body.render(&mut cx)?;
        debug!(includes = cx.includes.len(), "rendered program");

        let mut code = String::with_capacity(DEFAULT_CODE_CAPACITY.max(body.len() + 256));
        for include in cx.includes() {
            code.push_str("#include ");
            code.push_str(include);
            code.push('\n');
        }
        code.push('\n');
        code.push_str(&body);
        code.push('\n');
        Ok(code)
    }
}

impl Render for Body {
    fn render(&self, cx: &mut Context) -> Result<String> {
        let mut rendered = Vec::with_capacity(self.children.len());
        for child in &self.children {
            let mut text = child.render(cx)?;
            if text.is_empty() {
                continue;
            }
            if child.is_value() && !text.ends_with(';') {
                text.push(';');
            }
            rendered.push(text);
        }
        Ok(indent(&rendered.join("\n"), self.indent))
    }
}

impl Render for Node {
    fn render(&self, cx: &mut Context) -> Result<String> {
        let code = match self {
            Node::Number(number) => number.render(),
            Node::Str(text) | Node::Char(text) | Node::Comment(text) => text.clone(),
            Node::RawStr(text) => format!("R\"({text})\""),
            Node::Interp(interpolated) => interpolated.render(cx)?,
            Node::Bool(value) => value.to_string(),
            Node::Null => "nullptr".to_owned(),
            Node::Container { items, .. } => format!("{{{}}}", list(items, cx)?),
            Node::Map(pairs) => {
                let mut rendered = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    rendered.push(format!("{{{}, {}}}", key.render(cx)?, value.render(cx)?));
                }
                format!("{{{}}}", rendered.join(", "))
            }

            Node::Ident(name) => name.clone(),
            Node::TypeName(ty) => convert(ty)?,
            Node::This => "this".to_owned(),
            Node::Paren(inner) => format!("({})", inner.render(cx)?),
            Node::Arithmetic(binary) => binary.render(cx)?,
            Node::Shift(binary) => binary.render(cx)?,
            Node::Comparison(binary) => binary.render(cx)?,
            Node::Logical(binary) => binary.render(cx)?,
            Node::Bitwise(bitwise) => bitwise.render(cx)?,
            Node::Unary { op, operand } => {
                let operand = operand.render(cx)?;
                let symbol = op.symbol();
                if op.is_postfix() {
                    format!("{operand}{symbol}")
                } else if matches!(op, UnaryOp::Neg | UnaryOp::Plus) && operand.starts_with(symbol) {
                    // `- -x` must not turn into a decrement.
                    format!("{symbol} {operand}")
                } else {
                    format!("{symbol}{operand}")
                }
            }
            Node::Ternary {
                cond,
                then,
                otherwise,
            } => format!(
                "{} ? {} : {}",
                cond.render(cx)?,
                then.render(cx)?,
                otherwise.render(cx)?
            ),
            Node::Assign { target, value } => {
                format!("{} = {}", target.render(cx)?, value.render(cx)?)
            }
            Node::Call(call) => call.render(cx)?,
            Node::Member {
                object,
                name,
                access,
            } => match (access, object.as_ref()) {
                (Access::Dot, Node::This) => format!("this->{name}"),
                (Access::Dot, object) => format!("{}.{name}", object.render(cx)?),
                (Access::Scope, object) => format!("{}::{name}", object.render(cx)?),
            },
            Node::Index { object, index } => {
                format!("{}[{}]", object.render(cx)?, index.render(cx)?)
            }
            Node::Lambda(lambda) => lambda.render(cx)?,

            Node::VarDecl(decl) => {
                let (prefix, _) = modifiers(&decl.modifiers);
                let value = initializer(decl.value.as_deref(), cx)?;
                format!("{prefix}{} {}{value};", convert(&decl.ty)?, decl.name)
            }
            Node::MultiVarDecl(decl) => {
                let (prefix, _) = modifiers(&decl.modifiers);
                let value = initializer(decl.value.as_deref(), cx)?;
                let names = decl.names.join(", ");
                format!("{prefix}{} {names}{value};", convert(&decl.ty)?)
            }
            Node::Function(function) => function.render(cx)?,
            Node::Class(class) => class.render(cx)?,

            Node::If(branches) => branches.render(cx)?,
            Node::While { cond, body } => {
                format!("while ({}) {}", cond.render(cx)?, block(body, cx)?)
            }
            Node::ForIn(for_in) => for_in.render(cx)?,
            Node::ForC(for_c) => for_c.render(cx)?,
            Node::Match(matching) => render_match(matching, cx)?,
            Node::Switch(switch) => render_switch(switch, cx)?,
            Node::Try(try_) => try_.render(cx)?,
            Node::Break => "break;".to_owned(),
            Node::Continue => "continue;".to_owned(),
            Node::Return(None) => "return;".to_owned(),
            Node::Return(Some(value)) => format!("return {};", value.render(cx)?),
            Node::Throw(value) => format!("throw {};", value.render(cx)?),
            Node::MainBlock(body) => format!("int main() {}", block(body, cx)?),

            Node::Define { name, value: None } => format!("#define {name}"),
            Node::Define {
                name,
                value: Some(value),
            } => format!("#define {name} {}", value.render(cx)?),
            Node::Assert {
                cond,
                message: None,
            } => {
                cx.include("<cassert>");
                format!("assert({});", cond.render(cx)?)
            }
            Node::Assert {
                cond,
                message: Some(message),
            } => {
                cx.include("<stdexcept>");
                let check = format!(
                    "throw std::runtime_error({});",
                    message.render(cx)?
                );
                format!(
                    "if (!({})) {{\n{}\n}}",
                    cond.render(cx)?,
                    indent(&check, 1)
                )
            }
            Node::Namespace { name, body } => format!("namespace {name} {}", block(body, cx)?),
            Node::Using(name) => format!("using namespace {name};"),
            Node::Alias { name, target } => format!("using {name} = {};", convert(target)?),
            Node::Panic(message) => {
                cx.include("<cstdlib>");
                match message {
                    Some(message) => {
                        cx.include("<iostream>");
                        format!(
                            "std::cerr << {} << std::endl;\nstd::abort();",
                            message.render(cx)?
                        )
                    }
                    None => "std::abort();".to_owned(),
                }
            }
            Node::Marker(marker) => match marker {
                Marker::Io => "//IO:",
                Marker::Safe => "//SAFE:",
                Marker::Unsafe => "//UNSAFE:",
            }
            .to_owned(),
            Node::Foreign(text) => dedent(text),
            Node::Divider { label, body } => {
                let body = body.render(cx)?;
                match label {
                    Some(label) if body.is_empty() => format!("{}:", label.keyword()),
                    Some(label) => format!("{}:\n{body}", label.keyword()),
                    None => body,
                }
            }
        };
        Ok(code)
    }
}

impl<Op: Operator> Render for Binary<Op> {
    fn render(&self, cx: &mut Context) -> Result<String> {
        Ok(format!(
            "{} {} {}",
            self.lhs.render(cx)?,
            self.op.symbol(),
            self.rhs.render(cx)?
        ))
    }
}

impl Render for Bitwise {
    fn render(&self, cx: &mut Context) -> Result<String> {
        let op = self.op.symbol();
        match (self.op, &self.rhs) {
            (BitOp::Not, None) => Ok(format!("{op}{}", self.lhs.render(cx)?)),
            (BitOp::Not, Some(_)) => Err(RenderError::ExtraOperand { op }),
            (_, None) => Err(RenderError::MissingOperand { op }),
            (_, Some(rhs)) => Ok(format!("{} {op} {}", self.lhs.render(cx)?, rhs.render(cx)?)),
        }
    }
}

impl Render for Interpolated {
    /// `std::format` with one positional placeholder per embedded
    /// expression, in source order.
    fn render(&self, cx: &mut Context) -> Result<String> {
        cx.include("<format>");
        let mut format = String::new();
        let mut args = Vec::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => {
                    format.push_str(&text.replace('{', "{{").replace('}', "}}"));
                }
                Fragment::Expr(expr) => {
                    format.push_str(&format!("{{{}}}", args.len()));
                    args.push(expr.render(cx)?);
                }
            }
        }
        if args.is_empty() {
            return Ok(format!("std::format(\"{format}\")"));
        }
        Ok(format!("std::format(\"{format}\", {})", args.join(", ")))
    }
}

impl Render for Call {
    /// Named arguments select the parameter-struct overload, built with
    /// designated initializers.
    fn render(&self, cx: &mut Context) -> Result<String> {
        let callee = self.callee.render(cx)?;
        let mut args = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            let value = arg.value.render(cx)?;
            args.push(match &arg.name {
                Some(name) => format!("._{name} = {value}"),
                None => value,
            });
        }
        let args = args.join(", ");
        if self.has_named_args() {
            Ok(format!("{callee}({{{args}}})"))
        } else {
            Ok(format!("{callee}({args})"))
        }
    }
}

impl Render for Function {
    /// Functions with parameters are emitted twice: the positional form, and
    /// an overload taking a synthesized `<Name>_Params` struct whose fields
    /// are unpacked into locals before the body. A constructor with member
    /// initializers delegates to the positional form instead.
    fn render(&self, cx: &mut Context) -> Result<String> {
        let template = template(&self.generics)?;
        let (prefix, suffix) = modifiers(&self.modifiers);
        let ret = match &self.ret {
            Some(ty) => format!("{} ", convert(ty)?),
            None => String::new(),
        };
        let name = &self.name;

        // A data member cannot be `auto`, so every untyped parameter adds a
        // type parameter to the struct and its overload.
        let mut struct_generics = self.generics.clone();
        let mut params = Vec::with_capacity(self.params.len());
        let mut fields = Vec::with_capacity(self.params.len());
        let mut unpacked = Vec::with_capacity(self.params.len());
        let mut forwarded = Vec::with_capacity(self.params.len());
        for param in &self.params {
            let (ty, field_ty) = match &param.ty {
                Some(ty) => {
                    let ty = convert(ty)?;
                    (ty.clone(), ty)
                }
                None => {
                    let generic = format!("T_{}", param.name);
                    struct_generics.push(GenericParam {
                        name: generic.clone(),
                        ty: None,
                        default: None,
                    });
                    ("auto".to_owned(), generic)
                }
            };
            let default = initializer(param.default.as_ref(), cx)?;
            params.push(format!("{ty} {}{default}", param.name));
            fields.push(format!("{field_ty} _{}{default};", param.name));
            unpacked.push(format!("{field_ty} {0} = params._{0};", param.name));
            forwarded.push(format!("params._{}", param.name));
        }

        let inits = if self.inits.is_empty() {
            String::new()
        } else {
            let mut rendered = Vec::with_capacity(self.inits.len());
            for init in &self.inits {
                rendered.push(format!("{}({})", init.name, list(&init.args, cx)?));
            }
            format!(" : {}", rendered.join(", "))
        };

        let body = self.body.render(cx)?;
        let positional = format!(
            "{template}{prefix}{ret}{name}({}){suffix}{inits} {}",
            params.join(", "),
            braced(&body)
        );
        if self.params.is_empty() {
            return Ok(positional);
        }

        let struct_template = self::template(&struct_generics)?;
        let struct_name = format!("{name}_Params");
        let struct_ty = if struct_generics.is_empty() {
            struct_name.clone()
        } else {
            let args: Vec<_> = struct_generics.iter().map(|g| g.name.as_str()).collect();
            format!("{struct_name}<{}>", args.join(", "))
        };
        let fields = indent(&fields.join("\n"), 1);
        let params_struct = format!("{struct_template}struct {struct_name} {{\n{fields}\n}};");

        let overload = if self.inits.is_empty() {
            let mut overload_body = indent(&unpacked.join("\n"), 1);
            if !body.is_empty() {
                overload_body.push('\n');
                overload_body.push_str(&body);
            }
            format!(
                "{struct_template}{prefix}{ret}{name}({struct_ty} params){suffix} {{\n{overload_body}\n}}"
            )
        } else {
            format!(
                "{struct_template}{prefix}{name}({struct_ty} params) : {name}({}) {}",
                forwarded.join(", "),
                braced("")
            )
        };

        Ok(format!("{positional}\n\n{params_struct}\n\n{overload}"))
    }
}

impl Render for Lambda {
    fn render(&self, cx: &mut Context) -> Result<String> {
        let mut params = Vec::with_capacity(self.params.len());
        for param in &self.params {
            let ty = match &param.ty {
                Some(ty) => convert(ty)?,
                None => "auto".to_owned(),
            };
            let default = initializer(param.default.as_ref(), cx)?;
            params.push(format!("{ty} {}{default}", param.name));
        }
        let ret = match &self.ret {
            Some(ty) => format!(" -> {}", convert(ty)?),
            None => String::new(),
        };
        Ok(format!(
            "[{}]({}){ret} {}",
            self.capture,
            params.join(", "),
            block(&self.body, cx)?
        ))
    }
}

impl Render for GenericParam {
    fn render(&self, _cx: &mut Context) -> Result<String> {
        let mut decl = match &self.ty {
            None => format!("typename {}", self.name),
            Some(ty) => format!("{} {}", convert(ty)?, self.name),
        };
        match (&self.ty, &self.default) {
            (None, Some(default)) => decl.push_str(&format!(" = {}", convert(default)?)),
            (Some(_), Some(default)) => decl.push_str(&format!(" = {default}")),
            (_, None) => (),
        }
        Ok(decl)
    }
}

impl Render for Class {
    fn render(&self, cx: &mut Context) -> Result<String> {
        let template = template(&self.generics)?;
        // C++ has no `abstract` classes; abstractness follows from pure
        // virtual members.
        let mods: Vec<_> = self
            .modifiers
            .iter()
            .copied()
            .filter(|m| *m != Modifier::Abstract)
            .collect();
        let (prefix, _) = modifiers(&mods);
        let mut parents = Vec::with_capacity(self.parents.len());
        for parent in &self.parents {
            parents.push(format!("public {}", convert(parent)?));
        }
        let parents = if parents.is_empty() {
            String::new()
        } else {
            format!(" : {}", parents.join(", "))
        };
        let body = self.body.render(cx)?;
        Ok(format!(
            "{template}{prefix}class {}{parents} {};",
            self.name,
            braced(&body)
        ))
    }
}

impl Render for If {
    fn render(&self, cx: &mut Context) -> Result<String> {
        let mut code = String::new();
        for (i, (cond, body)) in self.branches.iter().enumerate() {
            if i > 0 {
                code.push_str(" else ");
            }
            code.push_str(&format!("if ({}) {}", cond.render(cx)?, block(body, cx)?));
        }
        if let Some(otherwise) = &self.otherwise {
            code.push_str(&format!(" else {}", block(otherwise, cx)?));
        }
        Ok(code)
    }
}

impl Render for ForIn {
    fn render(&self, cx: &mut Context) -> Result<String> {
        let ty = match &self.ty {
            Some(ty) => convert(ty)?,
            None => "auto&&".to_owned(),
        };
        Ok(format!(
            "for ({ty} {} : {}) {}",
            self.var,
            self.iter.render(cx)?,
            block(&self.body, cx)?
        ))
    }
}

impl Render for ForC {
    fn render(&self, cx: &mut Context) -> Result<String> {
        let mut clause = |node: &Option<Box<Node>>| -> Result<String> {
            match node {
                Some(node) => Ok(node.render(cx)?.trim_end_matches(';').to_owned()),
                None => Ok(String::new()),
            }
        };
        let init = clause(&self.init)?;
        let cond = clause(&self.cond)?;
        let update = clause(&self.update)?;
        Ok(format!(
            "for ({init}; {cond}; {update}) {}",
            block(&self.body, cx)?
        ))
    }
}

/// `match` lowers to an equality chain over the subject.
fn render_match(matching: &Match, cx: &mut Context) -> Result<String> {
    let subject = matching.subject.render(cx)?;
    let mut code = String::new();
    for (i, (pattern, body)) in matching.arms.iter().enumerate() {
        if i > 0 {
            code.push_str(" else ");
        }
        code.push_str(&format!(
            "if ({subject} == {}) {}",
            pattern.render(cx)?,
            block(body, cx)?
        ));
    }
    if let Some(default) = &matching.default {
        if !code.is_empty() {
            code.push_str(" else ");
        }
        code.push_str(&block(default, cx)?);
    }
    Ok(code)
}

/// Case bodies are blocks and never fall through.
fn render_switch(switch: &Match, cx: &mut Context) -> Result<String> {
    let mut sections = Vec::with_capacity(switch.arms.len() + 1);
    for (pattern, body) in &switch.arms {
        let label = format!("case {}:", pattern.render(cx)?);
        sections.push(case_section(&label, body, cx)?);
    }
    if let Some(default) = &switch.default {
        sections.push(case_section("default:", default, cx)?);
    }
    Ok(format!(
        "switch ({}) {}",
        switch.subject.render(cx)?,
        braced(&indent(&sections.join("\n"), 1))
    ))
}

fn case_section(label: &str, body: &Body, cx: &mut Context) -> Result<String> {
    let mut inner = body.render(cx)?;
    let terminated = matches!(
        body.children.last(),
        Some(Node::Break | Node::Continue | Node::Return(_) | Node::Throw(_))
    );
    if !terminated {
        if !inner.is_empty() {
            inner.push('\n');
        }
        inner.push_str(&indent("break;", body.indent));
    }
    Ok(format!("{label} {}", braced(&inner)))
}

impl Render for Try {
    /// `finally` has no C++ counterpart; its body follows the handlers as a
    /// plain block. A handler-less `try` rethrows after running it.
    fn render(&self, cx: &mut Context) -> Result<String> {
        let mut code = format!("try {}", block(&self.body, cx)?);
        for handler in &self.handlers {
            code.push_str(&format!(" {}", handler.render(cx)?));
        }
        if let Some(finally) = &self.finally {
            let cleanup = finally.render(cx)?;
            if self.handlers.is_empty() {
                let mut rethrow = cleanup.clone();
                if !rethrow.is_empty() {
                    rethrow.push('\n');
                }
                rethrow.push_str(&indent("throw;", 1));
                code.push_str(&format!(" catch (...) {}", braced(&rethrow)));
            }
            code.push('\n');
            code.push_str(&braced(&cleanup));
        }
        Ok(code)
    }
}

impl Render for Catch {
    fn render(&self, cx: &mut Context) -> Result<String> {
        let name = self.name.as_deref().unwrap_or("e");
        let header = match &self.ty {
            Some(ty) => format!("catch (const {}& {name})", convert(ty)?),
            None => "catch (...)".to_owned(),
        };
        Ok(format!("{header} {}", block(&self.body, cx)?))
    }
}

/// `{`, the rendered body, `}`.
fn block(body: &Body, cx: &mut Context) -> Result<String> {
    Ok(braced(&body.render(cx)?))
}

fn braced(inner: &str) -> String {
    if inner.is_empty() {
        "{\n}".to_owned()
    } else {
        format!("{{\n{inner}\n}}")
    }
}

fn list(items: &[Node], cx: &mut Context) -> Result<String> {
    let mut rendered = Vec::with_capacity(items.len());
    for item in items {
        rendered.push(item.render(cx)?);
    }
    Ok(rendered.join(", "))
}

fn initializer(value: Option<&Node>, cx: &mut Context) -> Result<String> {
    match value {
        Some(value) => Ok(format!(" = {}", value.render(cx)?)),
        None => Ok(String::new()),
    }
}

fn template(generics: &[GenericParam]) -> Result<String> {
    if generics.is_empty() {
        return Ok(String::new());
    }
    let mut cx = Context::default();
    let mut params = Vec::with_capacity(generics.len());
    for generic in generics {
        params.push(generic.render(&mut cx)?);
    }
    Ok(format!("template<{}>\n", params.join(", ")))
}

/// Splits modifiers into the prefix and suffix keyword text. `override`
/// goes after the parameter list, `abstract` becomes `virtual` and access
/// modifiers become labels.
fn modifiers(mods: &[Modifier]) -> (String, String) {
    let mut prefix = String::new();
    let mut suffix = String::new();
    for &modifier in mods.iter().filter(|m| m.is_access()) {
        prefix.push_str(modifier.keyword());
        prefix.push_str(": ");
    }
    for &modifier in mods.iter().filter(|m| !m.is_access()) {
        match modifier {
            Modifier::Override => suffix.push_str(" override"),
            Modifier::Abstract => prefix.push_str("virtual "),
            other => {
                prefix.push_str(other.keyword());
                prefix.push(' ');
            }
        }
    }
    (prefix, suffix)
}

/// Prefixes every non-empty line with `levels` indentation steps.
fn indent(text: &str, levels: usize) -> String {
    if levels == 0 {
        return text.to_owned();
    }
    let pad = " ".repeat(INDENT_WIDTH * levels);
    let lines: Vec<_> = text
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect();
    lines.join("\n")
}

/// Trims surrounding blank lines of a foreign block and strips the
/// indentation common to its non-comment lines.
fn dedent(text: &str) -> String {
    let is_blank = |line: &&str| line.trim().is_empty();
    let is_comment = |line: &str| {
        let trimmed = line.trim_start();
        trimmed.starts_with("//")
            || trimmed.starts_with("/*")
            || trimmed.starts_with("*/")
            || trimmed.starts_with("* ")
            || trimmed == "*"
    };
    let width = |line: &str| line.len() - line.trim_start_matches([' ', '\t']).len();

    let mut lines: Vec<&str> = text.lines().skip_while(is_blank).collect();
    while lines.last().is_some_and(is_blank) {
        lines.pop();
    }

    let common = lines
        .iter()
        .filter(|line| !is_blank(line) && !is_comment(line))
        .map(|line| width(line))
        .min()
        .unwrap_or(0);

    let dedented: Vec<_> = lines
        .iter()
        .map(|line| {
            if is_blank(line) {
                ""
            } else if is_comment(line) {
                line.trim_end()
            } else {
                line[common..].trim_end()
            }
        })
        .collect();
    dedented.join("\n")
}
