use std::collections::{HashMap, HashSet};

use inkwell::{
    builder::{Builder, BuilderError},
    context::Context,
    module::Module,
    passes::PassManager,
    types::BasicMetadataTypeEnum,
    values::{AnyValue, BasicMetadataValueEnum, FloatValue, FunctionValue},
    FloatPredicate,
};

use crate::ast::{ASTNode, Expression, Function, Prototype};

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("unknown variable referenced {0}")]
    UnknownVariable(String),
    #[error("unknown function referenced {0}")]
    UnknownFunction(String),
    #[error("invalid number of args in call to {name}: expected {expected}, found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("invalid binary operator {0}")]
    InvalidOperator(char),
    #[error("function {name} was declared with {expected} args, redeclared with {found}")]
    SignatureConflict {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("function {0} cannot be redefined")]
    Redefinition(String),
    #[error("failed to verify function {0}")]
    InvalidFunction(String),
    #[error("failed to build instruction: {0}")]
    Builder(#[from] BuilderError),
}

fn function_name(function: FunctionValue<'_>) -> String {
    function.get_name().to_string_lossy().into_owned()
}

fn param_names(function: FunctionValue<'_>) -> Vec<String> {
    function
        .get_param_iter()
        .map(|arg| {
            arg.into_float_value()
                .get_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

/// Render one function as textual IR.
pub fn print_function(function: FunctionValue<'_>) -> String {
    function.print_to_string().to_string()
}

fn set_param_names(function: FunctionValue<'_>, names: &[String]) {
    for (arg, name) in function.get_param_iter().zip(names) {
        arg.into_float_value().set_name(name);
    }
}

/// Emit IR for top-level units into a single module that lives as long as
/// the session.
pub struct Codegen<'ctx> {
    context: &'ctx Context,
    fpm: Option<PassManager<FunctionValue<'ctx>>>,
    builder: Builder<'ctx>,
    module: Module<'ctx>,
    named_values: HashMap<String, FloatValue<'ctx>>,
    // functions called by the body being generated
    callees: HashSet<String>,
    call_graph: HashMap<String, HashSet<String>>,
}

impl<'ctx> Codegen<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Codegen<'ctx> {
        let module = context.create_module(module_name);
        let builder = context.create_builder();

        Codegen {
            context,
            fpm: None,
            builder,
            module,
            named_values: HashMap::new(),
            callees: HashSet::new(),
            call_graph: HashMap::new(),
        }
    }

    /// Run the standard function pass pipeline over every finished function.
    pub fn with_optimizations(mut self) -> Self {
        let fpm: PassManager<FunctionValue<'ctx>> = PassManager::create(&self.module);

        fpm.add_instruction_combining_pass();
        fpm.add_reassociate_pass();
        fpm.add_gvn_pass();
        fpm.add_cfg_simplification_pass();
        fpm.initialize();

        self.fpm = Some(fpm);
        self
    }

    pub fn module(&self) -> &Module<'ctx> {
        &self.module
    }

    pub fn get_function(&self, name: &str) -> Option<FunctionValue<'ctx>> {
        self.module.get_function(name)
    }

    pub fn print_module(&self) -> String {
        self.module.print_to_string().to_string()
    }

    /// Names of every function transitively called by `name`, itself included.
    pub fn reachable_from(&self, name: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut pending = vec![name.to_string()];

        while let Some(current) = pending.pop() {
            if let Some(callees) = self.call_graph.get(&current) {
                pending.extend(callees.iter().filter(|c| !seen.contains(*c)).cloned());
            }
            seen.insert(current);
        }

        seen
    }

    fn codegen_expr(&mut self, expr: &Expression) -> Result<FloatValue<'ctx>, CodegenError> {
        match expr {
            Expression::Literal(value) => Ok(self.context.f64_type().const_float(*value)),
            Expression::Variable(name) => match self.named_values.get(name) {
                Some(var) => Ok(*var),
                None => Err(CodegenError::UnknownVariable(name.clone())),
            },
            Expression::Binary(op, left, right) => {
                let lhs = self.codegen_expr(left)?;
                let rhs = self.codegen_expr(right)?;

                match op {
                    '+' => Ok(self.builder.build_float_add(lhs, rhs, "addtmp")?),
                    '-' => Ok(self.builder.build_float_sub(lhs, rhs, "subtmp")?),
                    '*' => Ok(self.builder.build_float_mul(lhs, rhs, "multmp")?),
                    '/' => Ok(self.builder.build_float_div(lhs, rhs, "divtmp")?),
                    '<' | '>' => {
                        let predicate = if *op == '<' {
                            FloatPredicate::ULT
                        } else {
                            FloatPredicate::UGT
                        };
                        let cmp = self
                            .builder
                            .build_float_compare(predicate, lhs, rhs, "cmptmp")?;
                        Ok(self.builder.build_unsigned_int_to_float(
                            cmp,
                            self.context.f64_type(),
                            "booltmp",
                        )?)
                    }
                    _ => Err(CodegenError::InvalidOperator(*op)),
                }
            }
            Expression::Call(callee, args) => {
                let func = self
                    .module
                    .get_function(callee)
                    .ok_or_else(|| CodegenError::UnknownFunction(callee.clone()))?;

                let expected = func.count_params() as usize;
                if expected != args.len() {
                    return Err(CodegenError::ArityMismatch {
                        name: callee.clone(),
                        expected,
                        found: args.len(),
                    });
                }

                let mut argsv: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
                for arg in args {
                    argsv.push(self.codegen_expr(arg)?.into());
                }

                self.callees.insert(callee.clone());

                self.builder
                    .build_call(func, argsv.as_slice(), "calltmp")?
                    .try_as_basic_value()
                    .left()
                    .map(|value| value.into_float_value())
                    .ok_or_else(|| CodegenError::InvalidFunction(callee.clone()))
            }
        }
    }

    fn compile_proto(&self, proto: &Prototype) -> Result<FunctionValue<'ctx>, CodegenError> {
        if let Some(existing) = self.module.get_function(&proto.name) {
            let expected = existing.count_params() as usize;
            if expected != proto.args.len() {
                return Err(CodegenError::SignatureConflict {
                    name: proto.name.clone(),
                    expected,
                    found: proto.args.len(),
                });
            }
            return Ok(existing);
        }

        let f64_type = self.context.f64_type();
        let args_types = std::iter::repeat(f64_type)
            .take(proto.args.len())
            .map(|f| f.into())
            .collect::<Vec<BasicMetadataTypeEnum>>();

        let fn_type = f64_type.fn_type(args_types.as_slice(), false);
        let fn_val = self.module.add_function(proto.name.as_str(), fn_type, None);
        set_param_names(fn_val, &proto.args);

        tracing::debug!(name = %proto.name, arity = proto.args.len(), "declared function");
        Ok(fn_val)
    }

    fn compile_body(
        &mut self,
        function: FunctionValue<'ctx>,
        body: &Expression,
    ) -> Result<(), CodegenError> {
        let value = self.codegen_expr(body)?;

        self.builder.build_return(Some(&value))?;

        if !function.verify(true) {
            return Err(CodegenError::InvalidFunction(function_name(function)));
        }

        if let Some(fpm) = &self.fpm {
            fpm.run_on(&function);
        }

        Ok(())
    }

    /// Roll back a failed definition. A function that only existed as a
    /// declaration before goes back to being one.
    fn discard(&mut self, function: FunctionValue<'ctx>, previous_args: Option<Vec<String>>) {
        tracing::warn!(name = %function_name(function), "discarding partial function");

        self.builder.clear_insertion_position();
        self.named_values.clear();
        self.callees.clear();

        match previous_args {
            Some(args) => {
                for block in function.get_basic_blocks() {
                    // SAFETY: only this function's own instructions refer to its blocks
                    if unsafe { block.delete() }.is_err() {
                        tracing::error!("failed to delete block of {}", function_name(function));
                    }
                }
                set_param_names(function, &args);
            }
            // SAFETY: a function created by this definition has no callers outside its body
            None => unsafe { function.delete() },
        }
    }

    fn compile_fn(&mut self, function: Function) -> Result<FunctionValue<'ctx>, CodegenError> {
        let Function {
            prototype: proto,
            body,
        } = function;

        let previous_args = self.module.get_function(&proto.name).map(param_names);
        let llvm_func = self.compile_proto(&proto)?;

        if llvm_func.count_basic_blocks() > 0 {
            return Err(CodegenError::Redefinition(proto.name));
        }

        set_param_names(llvm_func, &proto.args);

        let entry = self.context.append_basic_block(llvm_func, "entry");
        self.builder.position_at_end(entry);

        // parameters are the only names visible in a body
        self.named_values.clear();
        self.named_values.reserve(proto.args.len());
        for (name, arg) in proto.args.iter().zip(llvm_func.get_param_iter()) {
            self.named_values.insert(name.clone(), arg.into_float_value());
        }
        self.callees.clear();

        match self.compile_body(llvm_func, &body) {
            Ok(()) => {
                let callees = std::mem::take(&mut self.callees);
                self.call_graph.insert(proto.name.clone(), callees);

                tracing::debug!(name = %proto.name, "generated function");
                Ok(llvm_func)
            }
            Err(err) => {
                self.discard(llvm_func, previous_args);
                Err(err)
            }
        }
    }

    /// Generate one top-level unit. The node is consumed; on failure the
    /// module is left as it was before the call.
    pub fn compile(&mut self, node: ASTNode) -> Result<FunctionValue<'ctx>, CodegenError> {
        match node {
            ASTNode::Extern(proto) => self.compile_proto(&proto),
            ASTNode::Function(func) | ASTNode::TopLevelExpression(func) => self.compile_fn(func),
        }
    }
}
