use std::io::{self, BufRead, Write};

use inkwell::context::Context;

use crate::{
    ast::ASTNode,
    codegen::{self, Codegen},
    config::Config,
    error::Error,
    jit,
    lexer::Lexer,
    parser::Parser,
};

/// What a successfully handled top-level unit produced.
#[derive(Debug, PartialEq, Clone)]
pub enum Outcome {
    Definition { name: String, ir: String },
    Extern { name: String, ir: String },
    Expression {
        name: String,
        ir: String,
        value: Option<f64>,
    },
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct Summary {
    pub units: usize,
    pub errors: usize,
}

/// The read-generate loop: pulls one top-level unit at a time from the
/// parser and hands it to the code generator.
pub struct Driver<'ctx, R> {
    parser: Parser<R>,
    codegen: Codegen<'ctx>,
    config: Config,
}

impl<'ctx, R: BufRead> Driver<'ctx, R> {
    pub fn new(context: &'ctx Context, input: R, config: Config) -> Self {
        let mut codegen = Codegen::new(context, &config.module_name);
        if config.optimize {
            codegen = codegen.with_optimizations();
        }

        print_prompt(&config);
        let parser = Parser::new(Lexer::new(input));

        Driver {
            parser,
            codegen,
            config,
        }
    }

    pub fn codegen(&self) -> &Codegen<'ctx> {
        &self.codegen
    }

    /// Handle the next top-level unit, `None` once input is exhausted.
    ///
    /// A parse failure skips the offending token so the next call starts
    /// from fresh input. A unit that parsed but failed to generate leaves
    /// the stream at the start of the following unit.
    pub fn handle_next(&mut self) -> Option<Result<Outcome, Error>> {
        let node = match self.parser.parse_top_level()? {
            Ok(node) => node,
            Err(err) => {
                let skipped = self.parser.current().clone();
                self.parser.advance();
                tracing::warn!("skipped {} after parse error", skipped);
                return Some(Err(err.into()));
            }
        };

        Some(self.generate(node))
    }

    fn generate(&mut self, node: ASTNode) -> Result<Outcome, Error> {
        let name = node.name().to_string();
        tracing::debug!(?node, "parsed unit");

        match node {
            ASTNode::Extern(_) => {
                let func = self.codegen.compile(node)?;
                let ir = codegen::print_function(func);
                Ok(Outcome::Extern { name, ir })
            }
            ASTNode::Function(_) => {
                let func = self.codegen.compile(node)?;
                let ir = codegen::print_function(func);
                Ok(Outcome::Definition { name, ir })
            }
            ASTNode::TopLevelExpression(_) => {
                let func = self.codegen.compile(node)?;
                let ir = codegen::print_function(func);
                let value = if self.config.evaluate {
                    Some(jit::evaluate(&self.codegen, func)?)
                } else {
                    None
                };
                Ok(Outcome::Expression { name, ir, value })
            }
        }
    }

    fn report<W: Write>(&self, outcome: &Outcome, out: &mut W) -> io::Result<()> {
        let (header, ir) = match outcome {
            Outcome::Definition { ir, .. } => ("Read function definition:", ir),
            Outcome::Extern { ir, .. } => ("Read extern:", ir),
            Outcome::Expression { ir, .. } => ("Read top-level expression:", ir),
        };

        if self.config.emit_ir {
            writeln!(out, "{}", header)?;
            writeln!(out, "{}", ir.trim_end())?;
        }

        if let Outcome::Expression {
            value: Some(value), ..
        } = outcome
        {
            writeln!(out, "Evaluated to {}", value)?;
        }

        Ok(())
    }

    /// Run until end of input, writing IR dumps and results to `out`.
    /// Failed units are logged and counted but never stop the session.
    pub fn run<W: Write>(&mut self, out: &mut W) -> io::Result<Summary> {
        let mut summary = Summary::default();

        while let Some(result) = self.handle_next() {
            summary.units += 1;

            match result {
                Ok(outcome) => self.report(&outcome, out)?,
                Err(err) => {
                    summary.errors += 1;
                    tracing::error!("{}", err);
                }
            }

            out.flush()?;
            print_prompt(&self.config);
        }

        if self.config.dump_module {
            writeln!(out, "{}", self.codegen.print_module().trim_end())?;
        }

        tracing::info!(units = summary.units, errors = summary.errors, "session finished");
        Ok(summary)
    }
}

fn print_prompt(config: &Config) {
    if let Some(prompt) = &config.prompt {
        eprint!("{}", prompt);
        let _ = io::stderr().flush();
    }
}
