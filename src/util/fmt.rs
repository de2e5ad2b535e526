use std::io::{self, Write};

use crate::ast::*;

const INDENT_WIDTH: usize = 2;

fn sp(w: &mut impl Write, i: usize) -> io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

pub fn print_program_string(program: &Program) -> io::Result<String> {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Writes an indented outline of the tree, one node per line.
pub fn print_program(w: &mut impl Write, program: &Program) -> io::Result<()> {
    for include in &program.includes {
        writeln!(w, "include {include}")?;
    }
    print_body(w, 0, &program.body)
}

fn print_body(w: &mut impl Write, i: usize, body: &Body) -> io::Result<()> {
    for child in &body.children {
        print_node(w, i, child)?;
    }
    Ok(())
}

fn print_opt(w: &mut impl Write, i: usize, node: Option<&Node>) -> io::Result<()> {
    match node {
        Some(node) => print_node(w, i, node),
        None => Ok(()),
    }
}

fn line(w: &mut impl Write, i: usize, text: impl std::fmt::Display) -> io::Result<()> {
    sp(w, i)?;
    writeln!(w, "{text}")
}

fn print_node(w: &mut impl Write, i: usize, node: &Node) -> io::Result<()> {
    match node {
        Node::Number(number) => line(w, i, format!("number {} ({})", number.render(), number.ty)),
        Node::Str(text) => line(w, i, format!("string {text}")),
        Node::RawStr(text) => line(w, i, format!("raw string {text:?}")),
        Node::Interp(Interpolated { fragments }) => {
            line(w, i, "interpolation")?;
            for fragment in fragments {
                match fragment {
                    Fragment::Text(text) => line(w, i + 1, format!("text {text:?}"))?,
                    Fragment::Expr(expr) => print_node(w, i + 1, expr)?,
                }
            }
            Ok(())
        }
        Node::Char(text) => line(w, i, format!("char {text}")),
        Node::Bool(value) => line(w, i, format!("bool {value}")),
        Node::Null => line(w, i, "null"),
        Node::Container { kind, items } => {
            let name = match kind {
                ContainerKind::List => "list",
                ContainerKind::Set => "set",
                ContainerKind::Tuple => "tuple",
            };
            line(w, i, name)?;
            items.iter().try_for_each(|item| print_node(w, i + 1, item))
        }
        Node::Map(pairs) => {
            line(w, i, "map")?;
            for (key, value) in pairs {
                line(w, i + 1, "entry")?;
                print_node(w, i + 2, key)?;
                print_node(w, i + 2, value)?;
            }
            Ok(())
        }

        Node::Ident(name) => line(w, i, format!("ident {name}")),
        Node::TypeName(name) => line(w, i, format!("type {name}")),
        Node::This => line(w, i, "this"),
        Node::Paren(inner) => {
            line(w, i, "paren")?;
            print_node(w, i + 1, inner)
        }
        Node::Arithmetic(binary) => print_binary(w, i, "arithmetic", binary),
        Node::Shift(binary) => print_binary(w, i, "shift", binary),
        Node::Comparison(binary) => print_binary(w, i, "comparison", binary),
        Node::Logical(binary) => print_binary(w, i, "logical", binary),
        Node::Bitwise(Bitwise { op, lhs, rhs }) => {
            line(w, i, format!("bitwise {}", op.symbol()))?;
            print_node(w, i + 1, lhs)?;
            print_opt(w, i + 1, rhs.as_deref())
        }
        Node::Unary { op, operand } => {
            let fixity = if op.is_postfix() { "postfix" } else { "prefix" };
            line(w, i, format!("unary {fixity} {}", op.symbol()))?;
            print_node(w, i + 1, operand)
        }
        Node::Ternary {
            cond,
            then,
            otherwise,
        } => {
            line(w, i, "ternary")?;
            print_node(w, i + 1, cond)?;
            print_node(w, i + 1, then)?;
            print_node(w, i + 1, otherwise)
        }
        Node::Assign { target, value } => {
            line(w, i, "assign")?;
            print_node(w, i + 1, target)?;
            print_node(w, i + 1, value)
        }
        Node::Call(Call { callee, args }) => {
            line(w, i, "call")?;
            print_node(w, i + 1, callee)?;
            for arg in args {
                match &arg.name {
                    Some(name) => {
                        line(w, i + 1, format!("named {name}"))?;
                        print_node(w, i + 2, &arg.value)?;
                    }
                    None => print_node(w, i + 1, &arg.value)?,
                }
            }
            Ok(())
        }
        Node::Member {
            object,
            name,
            access,
        } => {
            let sep = match access {
                Access::Dot => ".",
                Access::Scope => "::",
            };
            line(w, i, format!("member {sep}{name}"))?;
            print_node(w, i + 1, object)
        }
        Node::Index { object, index } => {
            line(w, i, "index")?;
            print_node(w, i + 1, object)?;
            print_node(w, i + 1, index)
        }
        Node::Lambda(lambda) => print_lambda(w, i, lambda),

        Node::VarDecl(decl) => {
            let mods = modifiers(&decl.modifiers);
            line(w, i, format!("var {mods}{} {}", decl.ty, decl.name))?;
            print_opt(w, i + 1, decl.value.as_deref())
        }
        Node::MultiVarDecl(decl) => {
            let mods = modifiers(&decl.modifiers);
            let names = decl.names.join(", ");
            line(w, i, format!("vars {mods}{} {names}", decl.ty))?;
            print_opt(w, i + 1, decl.value.as_deref())
        }
        Node::Function(function) => print_function(w, i, function),
        Node::Class(class) => {
            sp(w, i)?;
            write!(
                w,
                "class {}{}{}",
                modifiers(&class.modifiers),
                class.name,
                generics(&class.generics)
            )?;
            if !class.parents.is_empty() {
                write!(w, " : {}", class.parents.join(", "))?;
            }
            writeln!(w)?;
            print_body(w, i + 1, &class.body)
        }

        Node::If(If {
            branches,
            otherwise,
        }) => {
            for (n, (cond, body)) in branches.iter().enumerate() {
                line(w, i, if n == 0 { "if" } else { "elif" })?;
                print_node(w, i + 1, cond)?;
                line(w, i + 1, "then")?;
                print_body(w, i + 2, body)?;
            }
            if let Some(body) = otherwise {
                line(w, i, "else")?;
                print_body(w, i + 1, body)?;
            }
            Ok(())
        }
        Node::While { cond, body } => {
            line(w, i, "while")?;
            print_node(w, i + 1, cond)?;
            line(w, i + 1, "do")?;
            print_body(w, i + 2, body)
        }
        Node::ForIn(ForIn {
            ty,
            var,
            iter,
            body,
        }) => {
            match ty {
                Some(ty) => line(w, i, format!("for {ty} {var} in"))?,
                None => line(w, i, format!("for {var} in"))?,
            }
            print_node(w, i + 1, iter)?;
            line(w, i + 1, "do")?;
            print_body(w, i + 2, body)
        }
        Node::ForC(ForC {
            init,
            cond,
            update,
            body,
        }) => {
            line(w, i, "for")?;
            for (label, clause) in [("init", init), ("cond", cond), ("update", update)] {
                if let Some(clause) = clause {
                    line(w, i + 1, label)?;
                    print_node(w, i + 2, clause)?;
                }
            }
            line(w, i + 1, "do")?;
            print_body(w, i + 2, body)
        }
        Node::Match(m) => print_match(w, i, "match", m),
        Node::Switch(m) => print_match(w, i, "switch", m),
        Node::Try(Try {
            body,
            handlers,
            finally,
        }) => {
            line(w, i, "try")?;
            print_body(w, i + 1, body)?;
            for handler in handlers {
                sp(w, i)?;
                write!(w, "catch")?;
                if let Some(ty) = &handler.ty {
                    write!(w, " {ty}")?;
                }
                if let Some(name) = &handler.name {
                    write!(w, " {name}")?;
                }
                writeln!(w)?;
                print_body(w, i + 1, &handler.body)?;
            }
            if let Some(body) = finally {
                line(w, i, "finally")?;
                print_body(w, i + 1, body)?;
            }
            Ok(())
        }
        Node::Break => line(w, i, "break"),
        Node::Continue => line(w, i, "continue"),
        Node::Return(value) => {
            line(w, i, "return")?;
            print_opt(w, i + 1, value.as_deref())
        }
        Node::Throw(value) => {
            line(w, i, "throw")?;
            print_node(w, i + 1, value)
        }
        Node::MainBlock(body) => {
            line(w, i, "main")?;
            print_body(w, i + 1, body)
        }

        Node::Define { name, value } => {
            line(w, i, format!("define {name}"))?;
            print_opt(w, i + 1, value.as_deref())
        }
        Node::Assert { cond, message } => {
            line(w, i, "assert")?;
            print_node(w, i + 1, cond)?;
            print_opt(w, i + 1, message.as_deref())
        }
        Node::Namespace { name, body } => {
            line(w, i, format!("namespace {name}"))?;
            print_body(w, i + 1, body)
        }
        Node::Using(name) => line(w, i, format!("using {name}")),
        Node::Alias { name, target } => line(w, i, format!("alias {name} = {target}")),
        Node::Panic(message) => {
            line(w, i, "panic")?;
            print_opt(w, i + 1, message.as_deref())
        }
        Node::Marker(marker) => {
            let name = match marker {
                Marker::Io => "io",
                Marker::Safe => "safe",
                Marker::Unsafe => "unsafe",
            };
            line(w, i, format!("marker {name}"))
        }
        Node::Foreign(text) => line(w, i, format!("foreign {text:?}")),
        Node::Comment(text) => line(w, i, format!("comment {text}")),
        Node::Divider { label, body } => {
            match label {
                Some(label) => line(w, i, format!("section {}", label.keyword()))?,
                None => line(w, i, "section")?,
            }
            print_body(w, i + 1, body)
        }
    }
}

fn print_binary<Op: Operator>(
    w: &mut impl Write,
    i: usize,
    name: &str,
    binary: &Binary<Op>,
) -> io::Result<()> {
    line(w, i, format!("{name} {}", binary.op.symbol()))?;
    print_node(w, i + 1, &binary.lhs)?;
    print_node(w, i + 1, &binary.rhs)
}

fn print_function(w: &mut impl Write, i: usize, function: &Function) -> io::Result<()> {
    sp(w, i)?;
    write!(
        w,
        "function {}{}{}({})",
        modifiers(&function.modifiers),
        function.name,
        generics(&function.generics),
        params(&function.params)
    )?;
    if let Some(ret) = &function.ret {
        write!(w, " -> {ret}")?;
    }
    writeln!(w)?;
    print_defaults(w, i + 1, &function.params)?;
    for init in &function.inits {
        line(w, i + 1, format!("init {}", init.name))?;
        for arg in &init.args {
            print_node(w, i + 2, arg)?;
        }
    }
    print_body(w, i + 1, &function.body)
}

fn print_lambda(w: &mut impl Write, i: usize, lambda: &Lambda) -> io::Result<()> {
    sp(w, i)?;
    write!(w, "lambda [{}]({})", lambda.capture, params(&lambda.params))?;
    if let Some(ret) = &lambda.ret {
        write!(w, " -> {ret}")?;
    }
    writeln!(w)?;
    print_defaults(w, i + 1, &lambda.params)?;
    print_body(w, i + 1, &lambda.body)
}

fn params(params: &[Param]) -> String {
    let params: Vec<_> = params
        .iter()
        .map(|param| match &param.ty {
            Some(ty) => format!("{ty} {}", param.name),
            None => param.name.clone(),
        })
        .collect();
    params.join(", ")
}

fn print_defaults(w: &mut impl Write, i: usize, params: &[Param]) -> io::Result<()> {
    for param in params {
        if let Some(default) = &param.default {
            line(w, i, format!("default {}", param.name))?;
            print_node(w, i + 1, default)?;
        }
    }
    Ok(())
}

fn print_match(w: &mut impl Write, i: usize, name: &str, m: &Match) -> io::Result<()> {
    line(w, i, name)?;
    print_node(w, i + 1, &m.subject)?;
    for (pattern, body) in &m.arms {
        line(w, i + 1, "case")?;
        print_node(w, i + 2, pattern)?;
        line(w, i + 2, "do")?;
        print_body(w, i + 3, body)?;
    }
    if let Some(body) = &m.default {
        line(w, i + 1, "default")?;
        print_body(w, i + 2, body)?;
    }
    Ok(())
}

fn modifiers(modifiers: &[Modifier]) -> String {
    modifiers.iter().map(|m| format!("{} ", m.keyword())).collect()
}

fn generics(generics: &[GenericParam]) -> String {
    if generics.is_empty() {
        return String::new();
    }
    let params: Vec<_> = generics
        .iter()
        .map(|g| {
            let mut param = match &g.ty {
                Some(ty) => format!("{ty} {}", g.name),
                None => g.name.clone(),
            };
            if let Some(default) = &g.default {
                param.push_str(" = ");
                param.push_str(default);
            }
            param
        })
        .collect();
    format!("<{}>", params.join(", "))
}
