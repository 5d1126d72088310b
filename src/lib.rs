//! Front-end for the kaleidoscope language: a lazy lexer, a
//! precedence-climbing parser and an LLVM code generator that grows one
//! module per session.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod driver;
pub mod error;
pub mod jit;
pub mod lexer;
pub mod parser;

pub use codegen::{Codegen, CodegenError};
pub use config::Config;
pub use driver::{Driver, Outcome, Summary};
pub use error::Error;
pub use parser::{parse_str, Parser, ParserError};
