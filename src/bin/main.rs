use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use anyhow::{bail, Context as _};
use clap::{Parser, ValueEnum};
use espresso::{lexer, parser, util::fmt::print_program, Config};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "espressoc",
    about = "Transpiles Espresso sources into C++",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    /// Source file; reads standard input when omitted or `-`
    input: Option<PathBuf>,

    /// Output file; writes to standard output when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parse the indentation-sensitive layout instead of braces
    #[arg(long)]
    indent: bool,

    /// Carry source comments into the output
    #[arg(long)]
    comments: bool,

    /// What to print
    #[arg(long, value_enum, default_value_t = Emit::Cpp)]
    emit: Emit,

    /// Report every parse error instead of stopping at the first one
    #[arg(long)]
    all_errors: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Emit {
    Tokens,
    Tree,
    Cpp,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let src = read_input(cli.input.as_ref())?;
    let config = Config {
        indentation: cli.indent,
        comments: cli.comments,
    };

    let (tokens, blocks) = lexer::tokenize_with(&src, &config)?;
    debug!(tokens = tokens.len(), "lexed input");

    let mut out = Vec::with_capacity(src.len() * 2);
    match cli.emit {
        Emit::Tokens => {
            for token in &tokens {
                writeln!(out, "{token:?}")?;
            }
        }
        Emit::Tree | Emit::Cpp => {
            let program = if cli.all_errors {
                match parser::parse_recovering(&tokens, &blocks) {
                    Ok(program) => program,
                    Err((_, errors)) => {
                        for error in &errors {
                            eprintln!("error: {error}");
                        }
                        bail!("aborting due to {} parse error(s)", errors.len());
                    }
                }
            } else {
                parser::parse(&tokens, &blocks)?
            };
            if cli.emit == Emit::Tree {
                print_program(&mut out, &program)?;
            } else {
                out.extend_from_slice(program.render()?.as_bytes());
            }
        }
    }

    match &cli.output {
        Some(path) => {
            fs::write(path, &out).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = out.len(), "wrote output");
        }
        None => io::stdout().write_all(&out)?,
    }
    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        _ => {
            let mut src = String::new();
            io::stdin()
                .read_to_string(&mut src)
                .context("failed to read standard input")?;
            Ok(src)
        }
    }
}
