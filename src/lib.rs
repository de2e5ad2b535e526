//! Espresso to C++ transpiler.
//!
//! The pipeline is [`lexer`] (foreign-block extraction, tokenization and the
//! generic merge), [`parser`] (tokens to [`ast`]) and [`code_gen`], where every
//! node renders itself. [`transpile`] runs all of it.

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// Rendering of the AST into C++ source.
pub mod code_gen;

pub mod ast;
pub mod literal;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

use thiserror::Error;

pub use crate::{
    code_gen::RenderError,
    lexer::{Config, LexError},
    parser::{ParseError, ParseErrorKind},
    types::TypeMapError,
};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    TypeMap(#[from] TypeMapError),
}

/// Transpiles a whole Espresso unit into C++, failing on the first error.
pub fn transpile(src: &str, config: &Config) -> Result<String, Error> {
    let (tokens, blocks) = lexer::tokenize_with(src, config)?;
    let program = parser::parse(&tokens, &blocks)?;
    Ok(program.render()?)
}
