use crate::error::{Error, Result};
use crate::shape::Shape;

// CheckShapes - Fluent preconditions over an operator's input shapes
//
// Every operator starts its shape inference by stating what it expects of
// its inputs, e.g. for convolution:
//
//   CheckShapes::new(inputs, Some(self.name()))
//       .has(2)?
//       .same_type()?
//       .same_ndims()?
//       .only_dims(4)?;
//
// Each check either returns `&Self` for the next link or fails immediately
// with a ShapeMismatch prefixed by the operator name. Checks over "all
// inputs" are vacuously true for an empty list.

/// Precondition checker over a list of input shapes.
#[derive(Debug, Clone, Copy)]
pub struct CheckShapes<'a> {
    shapes: &'a [Shape],
    name: Option<&'a str>,
}

impl<'a> CheckShapes<'a> {
    /// Checker whose failures are prefixed with `name` when given.
    pub fn new(shapes: &'a [Shape], name: Option<&'a str>) -> Self {
        CheckShapes { shapes, name }
    }

    pub fn shapes(&self) -> &'a [Shape] {
        self.shapes
    }

    #[track_caller]
    fn fail(&self, reason: String) -> Error {
        Error::shape_mismatch(self.name, reason)
    }

    /// Exactly `n` inputs.
    #[track_caller]
    pub fn has(&self, n: usize) -> Result<&Self> {
        if self.shapes.len() != n {
            return Err(self.fail(format!(
                "wrong number of arguments: expected {} but given {}",
                n,
                self.shapes.len()
            )));
        }
        Ok(self)
    }

    /// Every input has rank `n`.
    #[track_caller]
    pub fn only_dims(&self, n: usize) -> Result<&Self> {
        if !self.all_of(|s| s.rank() == n) {
            return Err(self.fail(format!("only {}d supported", n)));
        }
        Ok(self)
    }

    /// Every input has rank of at least `n`.
    #[track_caller]
    pub fn min_ndims(&self, n: usize) -> Result<&Self> {
        if !self.all_of(|s| s.rank() >= n) {
            return Err(self.fail(format!("number of dimensions should be at least {}", n)));
        }
        Ok(self)
    }

    #[track_caller]
    pub fn same_shape(&self) -> Result<&Self> {
        if !self.same(|s| s.clone()) {
            return Err(self.fail("shapes do not match".to_string()));
        }
        Ok(self)
    }

    #[track_caller]
    pub fn same_type(&self) -> Result<&Self> {
        if !self.same(|s| s.dtype()) {
            return Err(self.fail(format!("types do not match: {}", self.types())));
        }
        Ok(self)
    }

    #[track_caller]
    pub fn same_dims(&self) -> Result<&Self> {
        if !self.same(|s| s.lens().to_vec()) {
            return Err(self.fail(format!("dimensions do not match: {}", self.lens())));
        }
        Ok(self)
    }

    #[track_caller]
    pub fn same_ndims(&self) -> Result<&Self> {
        if !self.same(|s| s.rank()) {
            return Err(self.fail(format!("number of dimensions do not match: {}", self.lens())));
        }
        Ok(self)
    }

    /// The projection `f` gives the same value for every input.
    pub fn same<K, F>(&self, f: F) -> bool
    where
        K: PartialEq,
        F: Fn(&Shape) -> K,
    {
        match self.shapes.first() {
            None => true,
            Some(first) => {
                let key = f(first);
                self.all_of(|s| f(s) == key)
            }
        }
    }

    /// Every input satisfies `predicate`.
    pub fn all_of<P>(&self, predicate: P) -> bool
    where
        P: Fn(&Shape) -> bool,
    {
        self.shapes.iter().all(predicate)
    }

    fn types(&self) -> String {
        self.shapes
            .iter()
            .map(|s| s.dtype().as_str())
            .collect::<Vec<_>>()
            .join(" vs ")
    }

    fn lens(&self) -> String {
        self.shapes
            .iter()
            .map(|s| format!("{:?}", s.lens()))
            .collect::<Vec<_>>()
            .join(" vs ")
    }
}
