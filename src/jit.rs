use std::{ffi::CString, ptr};

use inkwell::{
    execution_engine::{FunctionLookupError, JitFunction},
    llvm_sys::support::{LLVMLoadLibraryPermanently, LLVMSearchForAddressOfSymbol},
    values::FunctionValue,
    OptimizationLevel,
};

use crate::codegen::Codegen;

type EntryFunc = unsafe extern "C" fn() -> f64;

#[derive(Debug, thiserror::Error)]
pub enum JitError {
    #[error("function {0} takes arguments and cannot be evaluated")]
    NotNullary(String),
    #[error("function {0} has no body")]
    Undefined(String),
    #[error("module is invalid: {0}")]
    InvalidModule(String),
    #[error("failed to create execution engine: {0}")]
    Engine(String),
    #[error("failed to look up {0}: {1}")]
    Lookup(String, FunctionLookupError),
    #[error("extern {0} does not resolve to any symbol in this process")]
    UnresolvedSymbol(String),
}

/// Whether `name` can be linked against a symbol already loaded in the process.
fn resolves_in_process(name: &str) -> bool {
    let symbol = match CString::new(name) {
        Ok(symbol) => symbol,
        Err(_) => return false,
    };

    // SAFETY: a null filename makes the running program itself searchable,
    // and the symbol name is a valid nul-terminated string
    unsafe {
        if LLVMLoadLibraryPermanently(ptr::null()) != 0 {
            return false;
        }
        !LLVMSearchForAddressOfSymbol(symbol.as_ptr()).is_null()
    }
}

/// JIT-compile a copy of the session module and call the nullary `function`.
///
/// The copy only keeps the bodies of functions reachable from `function`, so
/// unrelated definitions that call unresolved externs never get linked.
pub fn evaluate(codegen: &Codegen<'_>, function: FunctionValue<'_>) -> Result<f64, JitError> {
    let name = function.get_name().to_string_lossy().into_owned();

    if function.count_params() != 0 {
        return Err(JitError::NotNullary(name));
    }
    if function.count_basic_blocks() == 0 {
        return Err(JitError::Undefined(name));
    }

    codegen
        .module()
        .verify()
        .map_err(|e| JitError::InvalidModule(e.to_string()))?;

    let keep = codegen.reachable_from(&name);

    let mut externs: Vec<&String> = keep
        .iter()
        .filter(|callee| {
            codegen
                .get_function(callee)
                .map_or(false, |f| f.count_basic_blocks() == 0)
        })
        .collect();
    externs.sort();
    if let Some(missing) = externs.into_iter().find(|callee| !resolves_in_process(callee)) {
        return Err(JitError::UnresolvedSymbol(missing.clone()));
    }

    let module = codegen.module().clone();

    for func in module.get_functions() {
        let func_name = func.get_name().to_string_lossy().into_owned();
        if keep.contains(&func_name) {
            continue;
        }

        for block in func.get_basic_blocks() {
            // SAFETY: the whole body goes, so no branch is left pointing at it
            unsafe { block.delete() }
                .map_err(|()| JitError::InvalidModule(format!("cannot strip {}", func_name)))?;
        }
    }

    let ee = module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|e| JitError::Engine(e.to_string()))?;

    let entry: JitFunction<EntryFunc> =
        unsafe { ee.get_function(&name) }.map_err(|e| JitError::Lookup(name.clone(), e))?;

    let value = unsafe { entry.call() };
    tracing::debug!(name = %name, value, "evaluated function");

    Ok(value)
}
