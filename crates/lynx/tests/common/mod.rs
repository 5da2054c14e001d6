// Shared test target - a tiny CPU target that can run element-wise arithmetic
//
// Lowering replaces every `add`/`sub`/`mul`/`div` with `cpu::<op>`, which
// computes through `BinaryOp::apply` and refuses to run without a CpuContext.

#![allow(dead_code)]

use std::collections::HashMap;

use lynx::prelude::*;

#[derive(Debug, Default)]
pub struct CpuContext {
    pub kernels_run: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CpuBinary {
    name: String,
    inner: Binary,
}

impl CpuBinary {
    pub fn new(inner: Binary) -> Self {
        CpuBinary {
            name: format!("cpu::{}", inner.op.as_str()),
            inner,
        }
    }
}

impl Operator for CpuBinary {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        self.inner.compute_shape(inputs)
    }

    fn compute(&self, ctx: &mut Context, output: &Shape, args: &[Argument]) -> Result<Argument> {
        ctx.get_mut::<CpuContext>(self.name())?.kernels_run += 1;
        let lhs = &args[0];
        let rhs = match self.inner.broadcast {
            Some(axis) => args[1].view(Shape::broadcast(lhs.shape(), args[1].shape(), axis)?)?,
            None => args[1].clone(),
        };
        let values: Vec<f64> = lhs
            .to_f64_vec()?
            .into_iter()
            .zip(rhs.to_f64_vec()?)
            .map(|(a, b)| self.inner.op.apply(a, b))
            .collect();
        Argument::new(output.to_standard(), Storage::from_f64(output.dtype(), values))
    }
}

pub struct CpuTarget;

impl Target for CpuTarget {
    fn name(&self) -> &str {
        "cpu"
    }

    fn lower(&self, module: &mut Module) -> Result<()> {
        let binaries: Vec<(InstructionRef, Binary)> = module
            .iter()
            .filter_map(|(r, ins)| {
                ins.operation()
                    .and_then(|op| op.downcast_ref::<Binary>())
                    .map(|b| (r, *b))
            })
            .collect();
        for (r, binary) in binaries {
            module.replace_operation(r, CpuBinary::new(binary))?;
        }
        Ok(())
    }

    fn context(&self) -> Context {
        Context::new(CpuContext::default())
    }
}

pub fn f32s(lens: &[usize]) -> Shape {
    Shape::new(DType::F32, lens.to_vec())
}

pub fn bind(pairs: &[(&str, Argument)]) -> HashMap<String, Argument> {
    pairs
        .iter()
        .map(|(name, arg)| (name.to_string(), arg.clone()))
        .collect()
}
