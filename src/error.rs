use crate::{codegen::CodegenError, jit::JitError, parser::ParserError};

/// Any failure while handling one top-level unit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParserError),
    #[error("codegen error: {0}")]
    Codegen(#[from] CodegenError),
    #[error("evaluation error: {0}")]
    Jit(#[from] JitError),
}
