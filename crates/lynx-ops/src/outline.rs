// Shape-only and diagnostic operators
//
// `Outline` declares a value by shape alone; evaluating it yields a
// placeholder argument with no buffer. `CheckContext<T>` takes no inputs
// and only verifies that the evaluation context is a `T`.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;

use serde::Deserialize;

use lynx_core::{Argument, CheckShapes, Context, Result, Shape};

use crate::operator::Operator;

// OUTLINE

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Outline {
    pub shape: Shape,
}

impl Outline {
    pub fn new(shape: Shape) -> Self {
        Outline { shape }
    }
}

impl Operator for Outline {
    fn name(&self) -> &str {
        "outline"
    }

    fn compute_shape(&self, inputs: &[Shape]) -> Result<Shape> {
        CheckShapes::new(inputs, Some(self.name())).has(0)?;
        self.shape
            .checked_elements()
            .map_err(|e| e.with_op(self.name()))?;
        Ok(self.shape.clone())
    }

    fn compute(&self, _ctx: &mut Context, output: &Shape, _args: &[Argument]) -> Result<Argument> {
        Ok(Argument::placeholder(output.clone()))
    }

    fn fmt_attrs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape={{{}}}", self.shape)
    }
}

// CHECK CONTEXT

/// Fails evaluation unless the context holds a `T`.
pub struct CheckContext<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> CheckContext<T> {
    pub fn new() -> Self {
        CheckContext {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for CheckContext<T> {
    fn default() -> Self {
        CheckContext::new()
    }
}

impl<T> Clone for CheckContext<T> {
    fn clone(&self) -> Self {
        CheckContext::new()
    }
}

impl<T> PartialEq for CheckContext<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T> fmt::Debug for CheckContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CheckContext<{}>", type_name::<T>())
    }
}

impl<T: Any> Operator for CheckContext<T> {
    fn name(&self) -> &str {
        "check_context"
    }

    fn compute_shape(&self, _inputs: &[Shape]) -> Result<Shape> {
        Ok(Shape::default())
    }

    fn compute(&self, ctx: &mut Context, _output: &Shape, _args: &[Argument]) -> Result<Argument> {
        ctx.get::<T>(self.name())?;
        Ok(Argument::empty())
    }
}
