// Program - modules, the target they were compiled for, and evaluation
//
// LIFECYCLE
//
//   Program::new()           one empty module, "main"
//   main_module_mut()...     importer inserts instructions
//   compile(&target)         validate + lower every module, keep the context
//   eval(&bindings)          walk "main" in stored order
//
// Evaluation runs every instruction with the compiled target's context (or
// the default NullContext before compilation). The first failure aborts the
// walk and nothing is returned. Values are `Argument`s, so views produced
// by layout operators keep sharing their source buffers.

use std::collections::HashMap;
use std::fmt;

use lynx_core::{Argument, Context, Error, Result};

use crate::config::ProgramConfig;
use crate::module::{InstructionKind, Module};
use crate::target::Target;

pub const MAIN_MODULE: &str = "main";

/// A set of modules plus compilation state.
#[derive(Debug)]
pub struct Program {
    modules: Vec<Module>,
    config: ProgramConfig,
    target: Option<String>,
    context: Context,
}

impl Default for Program {
    fn default() -> Self {
        Program::new()
    }
}

impl Program {
    pub fn new() -> Self {
        Program {
            modules: vec![Module::new(MAIN_MODULE)],
            config: ProgramConfig::default(),
            target: None,
            context: Context::default(),
        }
    }

    pub fn with_config(mut self, config: ProgramConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    pub fn main_module(&self) -> &Module {
        &self.modules[0]
    }

    pub fn main_module_mut(&mut self) -> &mut Module {
        &mut self.modules[0]
    }

    /// Add an empty module. Names are unique within a program.
    pub fn add_module(&mut self, name: &str) -> Result<&mut Module> {
        if self.get_module(name).is_some() {
            return Err(Error::structural(format!("module '{}' already exists", name)));
        }
        self.modules.push(Module::new(name));
        let last = self.modules.len() - 1;
        Ok(&mut self.modules[last])
    }

    pub fn get_module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name() == name)
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn is_compiled(&self) -> bool {
        self.target.is_some()
    }

    /// Name of the target this program was compiled for.
    pub fn target_name(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Validate and lower every module for `target`. Allowed once.
    ///
    /// Modules are lowered as copies. On failure the program is left exactly
    /// as it was and can be compiled again.
    pub fn compile(&mut self, target: &dyn Target) -> Result<()> {
        if let Some(current) = &self.target {
            return Err(Error::structural(format!(
                "program is already compiled for target '{}'",
                current
            )));
        }
        log::info!(
            "compiling {} module(s) for target '{}'",
            self.modules.len(),
            target.name()
        );
        let mut lowered = self.modules.clone();
        for module in &mut lowered {
            module.validate()?;
            target.lower(module)?;
            module.validate()?;
        }
        self.modules = lowered;
        self.context = target.context();
        self.target = Some(target.name().to_string());
        log::info!("compiled for target '{}'", target.name());
        Ok(())
    }

    /// Evaluate `main` with its parameters bound by name.
    ///
    /// Returns the values of the return instruction's operands, in order.
    pub fn eval(&mut self, params: &HashMap<String, Argument>) -> Result<Vec<Argument>> {
        let main = &self.modules[0];
        let context = &mut self.context;
        let config = self.config;

        let ret = main.return_ref().ok_or_else(|| {
            Error::structural(format!("module '{}' has no return instruction", main.name()))
        })?;

        for (name, shape) in main.parameter_shapes() {
            match params.get(name) {
                None => {
                    return Err(Error::structural(format!(
                        "parameter '{}' is not bound",
                        name
                    )))
                }
                Some(arg) if arg.shape() != shape => {
                    return Err(Error::shape_mismatch(
                        None,
                        format!(
                            "parameter '{}' expects {} but was bound to {}",
                            name,
                            shape,
                            arg.shape()
                        ),
                    ))
                }
                Some(_) => {}
            }
        }

        let mut values: Vec<Argument> = Vec::with_capacity(main.len());
        for (r, ins) in main.iter() {
            let value = match ins.kind() {
                InstructionKind::Parameter { name } => {
                    params.get(name).cloned().ok_or_else(|| {
                        Error::structural(format!("parameter '{}' is not bound", name))
                    })?
                }
                InstructionKind::Literal(value) => value.clone(),
                InstructionKind::Operation(op) => {
                    let args: Vec<Argument> = ins
                        .inputs()
                        .iter()
                        .map(|i| values[i.index()].clone())
                        .collect();
                    let out = op
                        .compute(context, ins.shape(), &args)
                        .map_err(|e| e.with_op(op.name()))?;
                    if config.verify_shapes && out.shape() != ins.shape() {
                        return Err(Error::shape_mismatch(
                            Some(op.name()),
                            format!(
                                "{} computed {} but {} was inferred",
                                r,
                                out.shape(),
                                ins.shape()
                            ),
                        ));
                    }
                    out
                }
                InstructionKind::Return => Argument::empty(),
            };
            if config.trace_eval {
                log::trace!("{} = {} -> {}", r, ins.name(), value.shape());
            }
            values.push(value);
        }

        let outputs: Vec<Argument> = main
            .get(ret)
            .map(|ins| {
                ins.inputs()
                    .iter()
                    .map(|i| values[i.index()].clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(outputs)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for module in &self.modules {
            writeln!(f, "module {}:", module.name())?;
            write!(f, "{}", module)?;
        }
        Ok(())
    }
}
