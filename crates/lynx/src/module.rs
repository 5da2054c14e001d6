// Module - An append-only instruction graph with cached shapes
//
// Instructions live in an arena; operands refer to earlier instructions by
// index (`InstructionRef`). Every insertion infers its shape on the spot
// from the operands' cached shapes, so a module is always fully shaped:
//
//   @0 = @param:x -> f32, {1, 3, 32, 32}, {3072, 1024, 32, 1}
//   @1 = @literal -> f32, {8, 3, 3, 3}, {27, 9, 3, 1}
//   @2 = convolution[padding={1, 1}, ...](@0, @1) -> f32, {1, 8, 32, 32}, ...
//   @3 = @return(@2) -> f32, {1, 8, 32, 32}, ...
//
// INVARIANTS
//
//   - Operands always point to earlier instructions, so stored order is a
//     topological order and cycles cannot be built.
//   - A failed insertion leaves the module exactly as it was.
//   - At most one return instruction; once it is added the module is
//     sealed and accepts no further instructions.
//   - Lowering may swap an operator, but never changes a cached shape.

use std::fmt;

use lynx_core::{Argument, Error, Result, Shape};
use lynx_ops::Operation;

/// Index of an instruction inside its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionRef(usize);

impl InstructionRef {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstructionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    /// Named input, bound at evaluation time.
    Parameter { name: String },
    /// Constant value embedded in the graph.
    Literal(Argument),
    Operation(Operation),
    /// The module's outputs are its operands.
    Return,
}

/// One node of the graph: what it is, what it reads and its inferred shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    kind: InstructionKind,
    inputs: Vec<InstructionRef>,
    shape: Shape,
}

impl Instruction {
    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[InstructionRef] {
        &self.inputs
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn operation(&self) -> Option<&Operation> {
        match &self.kind {
            InstructionKind::Operation(op) => Some(op),
            _ => None,
        }
    }

    /// Operator name, or `@param` / `@literal` / `@return`.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Parameter { .. } => "@param",
            InstructionKind::Literal(_) => "@literal",
            InstructionKind::Operation(op) => op.name(),
            InstructionKind::Return => "@return",
        }
    }
}

/// A named instruction graph.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    instructions: Vec<Instruction>,
    return_ref: Option<InstructionRef>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            instructions: Vec::new(),
            return_ref: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // Construction

    /// Declare a named input of the given shape.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        shape: Shape,
    ) -> Result<InstructionRef> {
        let name = name.into();
        self.check_open()?;
        if self.get_parameter_shape(&name).is_some() {
            return Err(Error::structural(format!(
                "module '{}' already has a parameter named '{}'",
                self.name, name
            )));
        }
        log::debug!("{}: parameter '{}' -> {}", self.name, name, shape);
        Ok(self.push(InstructionKind::Parameter { name }, Vec::new(), shape))
    }

    /// Embed a constant. The argument must carry data.
    pub fn add_literal(&mut self, value: Argument) -> Result<InstructionRef> {
        self.check_open()?;
        if !value.has_data() {
            return Err(Error::structural(format!(
                "literal of shape {} has no data",
                value.shape()
            )));
        }
        let shape = value.shape().clone();
        log::debug!("{}: literal -> {}", self.name, shape);
        Ok(self.push(InstructionKind::Literal(value), Vec::new(), shape))
    }

    /// Append `op` applied to `inputs`, inferring and caching its shape.
    ///
    /// Fails without modifying the module if an operand is invalid or the
    /// operator rejects the operand shapes.
    pub fn add_instruction(
        &mut self,
        op: impl Into<Operation>,
        inputs: &[InstructionRef],
    ) -> Result<InstructionRef> {
        let op = op.into();
        self.check_open()?;
        let shape = self.infer(&op, inputs)?;
        log::debug!(
            "{}: {} = {}({}) -> {}",
            self.name,
            InstructionRef(self.instructions.len()),
            op,
            join_refs(inputs),
            shape
        );
        Ok(self.push(InstructionKind::Operation(op), inputs.to_vec(), shape))
    }

    /// Mark `outputs` as the module's results. Allowed once.
    pub fn add_return(&mut self, outputs: &[InstructionRef]) -> Result<InstructionRef> {
        self.check_open()?;
        self.check_refs(outputs)?;
        let shape = match outputs {
            [single] => self.instructions[single.0].shape.clone(),
            _ => Shape::default(),
        };
        log::debug!("{}: return({})", self.name, join_refs(outputs));
        let ins = self.push(InstructionKind::Return, outputs.to_vec(), shape);
        self.return_ref = Some(ins);
        Ok(ins)
    }

    /// Swap the operator of an operation instruction.
    ///
    /// The replacement must infer the same shape from the same operands;
    /// otherwise nothing changes.
    pub fn replace_operation(
        &mut self,
        ins: InstructionRef,
        op: impl Into<Operation>,
    ) -> Result<()> {
        let op = op.into();
        let current = self.get(ins).ok_or_else(|| self.unknown_ref(ins))?;
        if current.operation().is_none() {
            return Err(Error::structural(format!(
                "{} is a {} instruction, not an operation",
                ins,
                current.name()
            )));
        }
        let shape = self.infer(&op, &current.inputs)?;
        if shape != current.shape {
            return Err(Error::shape_mismatch(
                Some(op.name()),
                format!(
                    "replacement for {} infers {} instead of {}",
                    ins, shape, current.shape
                ),
            ));
        }
        log::debug!("{}: {} replaced by {}", self.name, ins, op);
        self.instructions[ins.0].kind = InstructionKind::Operation(op);
        Ok(())
    }

    // Queries

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, ins: InstructionRef) -> Option<&Instruction> {
        self.instructions.get(ins.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstructionRef, &Instruction)> + '_ {
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, ins)| (InstructionRef(i), ins))
    }

    pub fn shape_of(&self, ins: InstructionRef) -> Result<&Shape> {
        self.get(ins)
            .map(Instruction::shape)
            .ok_or_else(|| self.unknown_ref(ins))
    }

    /// Parameters in declaration order.
    pub fn parameter_shapes(&self) -> Vec<(&str, &Shape)> {
        self.instructions
            .iter()
            .filter_map(|ins| match &ins.kind {
                InstructionKind::Parameter { name } => Some((name.as_str(), &ins.shape)),
                _ => None,
            })
            .collect()
    }

    pub fn get_parameter_shape(&self, name: &str) -> Option<&Shape> {
        self.parameter_shapes()
            .into_iter()
            .find(|(param, _)| *param == name)
            .map(|(_, shape)| shape)
    }

    /// Shapes of the returned values, empty when there is no return yet.
    pub fn output_shapes(&self) -> Vec<Shape> {
        match self.return_ref.and_then(|r| self.get(r)) {
            Some(ret) => ret
                .inputs
                .iter()
                .map(|i| self.instructions[i.0].shape.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn return_ref(&self) -> Option<InstructionRef> {
        self.return_ref
    }

    /// A module is complete once it has a return and every operand points
    /// backwards to a non-return instruction.
    pub fn validate(&self) -> Result<()> {
        if self.return_ref.is_none() {
            return Err(Error::structural(format!(
                "module '{}' has no return instruction",
                self.name
            )));
        }
        for (r, ins) in self.iter() {
            for input in &ins.inputs {
                if input.0 >= r.0 || Some(*input) == self.return_ref {
                    return Err(Error::structural(format!(
                        "{} in module '{}' reads {}, which is not an earlier value",
                        r, self.name, input
                    )));
                }
            }
        }
        Ok(())
    }

    // Internals

    fn push(
        &mut self,
        kind: InstructionKind,
        inputs: Vec<InstructionRef>,
        shape: Shape,
    ) -> InstructionRef {
        self.instructions.push(Instruction { kind, inputs, shape });
        InstructionRef(self.instructions.len() - 1)
    }

    fn check_open(&self) -> Result<()> {
        match self.return_ref {
            Some(r) => Err(Error::structural(format!(
                "module '{}' is sealed by its return instruction {}",
                self.name, r
            ))),
            None => Ok(()),
        }
    }

    fn check_refs(&self, inputs: &[InstructionRef]) -> Result<()> {
        for &input in inputs {
            if input.0 >= self.instructions.len() {
                return Err(self.unknown_ref(input));
            }
            if Some(input) == self.return_ref {
                return Err(Error::structural(format!(
                    "{} is the return instruction and cannot be an operand",
                    input
                )));
            }
        }
        Ok(())
    }

    fn infer(&self, op: &Operation, inputs: &[InstructionRef]) -> Result<Shape> {
        self.check_refs(inputs)?;
        let shapes: Vec<Shape> = inputs
            .iter()
            .map(|i| self.instructions[i.0].shape.clone())
            .collect();
        op.compute_shape(&shapes).map_err(|e| e.with_op(op.name()))
    }

    fn unknown_ref(&self, ins: InstructionRef) -> Error {
        Error::structural(format!(
            "{} does not exist in module '{}' ({} instructions)",
            ins,
            self.name,
            self.instructions.len()
        ))
    }
}

/// Same instructions in the same order. Module names are not compared.
impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.instructions == other.instructions
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, ins) in self.iter() {
            write!(f, "{} = ", r)?;
            match &ins.kind {
                InstructionKind::Parameter { name } => write!(f, "@param:{}", name)?,
                InstructionKind::Literal(_) => write!(f, "@literal")?,
                InstructionKind::Operation(op) => write!(f, "{}", op)?,
                InstructionKind::Return => write!(f, "@return")?,
            }
            if !ins.inputs.is_empty() {
                write!(f, "({})", join_refs(&ins.inputs))?;
            }
            writeln!(f, " -> {}", ins.shape)?;
        }
        Ok(())
    }
}

fn join_refs(refs: &[InstructionRef]) -> String {
    refs.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lynx_core::{DType, ErrorKind};
    use lynx_ops::{Binary, Gemm, Transpose, Unary};

    fn f32s(lens: &[usize]) -> Shape {
        Shape::new(DType::F32, lens.to_vec())
    }

    #[test]
    fn test_insertion_caches_shapes() {
        let mut m = Module::new("main");
        let a = m.add_parameter("a", f32s(&[4, 5])).unwrap();
        let b = m.add_parameter("b", f32s(&[5, 3])).unwrap();
        let c = m.add_instruction(Gemm, &[a, b]).unwrap();
        assert_eq!(m.shape_of(c).unwrap(), &f32s(&[4, 3]));
        assert_eq!(m.get(c).unwrap().name(), "gemm");
        assert_eq!(m.get(c).unwrap().inputs(), &[a, b]);
    }

    #[test]
    fn test_failed_insertion_leaves_module_unchanged() {
        let mut m = Module::new("main");
        let a = m.add_parameter("a", f32s(&[4, 5])).unwrap();
        let before = m.clone();

        let err = m.add_instruction(Gemm, &[a, a]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert_eq!(err.op(), Some("gemm"));

        let err = m.add_instruction(Gemm, &[a, InstructionRef(7)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(m, before);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_duplicate_parameter() {
        let mut m = Module::new("main");
        m.add_parameter("x", f32s(&[2])).unwrap();
        let err = m.add_parameter("x", f32s(&[3])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert_eq!(m.get_parameter_shape("x"), Some(&f32s(&[2])));
    }

    #[test]
    fn test_literal_needs_data() {
        let mut m = Module::new("main");
        assert!(m.add_literal(Argument::placeholder(f32s(&[2]))).is_err());
        let lit = m
            .add_literal(Argument::from_slice([2], &[1.0f32, 2.0]).unwrap())
            .unwrap();
        assert_eq!(m.get(lit).unwrap().name(), "@literal");
    }

    #[test]
    fn test_return_seals_module() {
        let mut m = Module::new("main");
        let x = m.add_parameter("x", f32s(&[2, 3])).unwrap();
        let y = m.add_instruction(Unary::identity(), &[x]).unwrap();
        let ret = m.add_return(&[y]).unwrap();
        assert_eq!(m.return_ref(), Some(ret));
        assert_eq!(m.shape_of(ret).unwrap(), &f32s(&[2, 3]));
        assert_eq!(m.output_shapes(), vec![f32s(&[2, 3])]);

        assert_eq!(m.add_return(&[y]).unwrap_err().kind(), ErrorKind::Structural);
        assert!(m.add_instruction(Unary::identity(), &[y]).is_err());
        assert!(m.add_parameter("z", f32s(&[1])).is_err());
        assert_eq!(m.len(), 3);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_multi_output_return_shape() {
        let mut m = Module::new("main");
        let x = m.add_parameter("x", f32s(&[2, 3])).unwrap();
        let t = m.add_instruction(Transpose::new([1, 0]), &[x]).unwrap();
        let ret = m.add_return(&[x, t]).unwrap();
        assert_eq!(m.shape_of(ret).unwrap(), &Shape::default());
        assert_eq!(m.output_shapes().len(), 2);
    }

    #[test]
    fn test_validate_requires_return() {
        let mut m = Module::new("main");
        m.add_parameter("x", f32s(&[2])).unwrap();
        assert_eq!(m.validate().unwrap_err().kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_replace_operation() {
        let mut m = Module::new("main");
        let x = m.add_parameter("x", f32s(&[2, 3])).unwrap();
        let y = m.add_parameter("y", f32s(&[2, 3])).unwrap();
        let add = m.add_instruction(Binary::add(), &[x, y]).unwrap();

        m.replace_operation(add, Binary::mul()).unwrap();
        assert_eq!(m.get(add).unwrap().name(), "mul");

        let before = m.clone();
        let err = m.replace_operation(add, Transpose::new([1, 0])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert!(m.replace_operation(x, Binary::add()).is_err());
        assert_eq!(m, before);
    }

    #[test]
    fn test_display() {
        let mut m = Module::new("main");
        let x = m.add_parameter("x", f32s(&[2, 3])).unwrap();
        let t = m.add_instruction(Transpose::new([1, 0]), &[x]).unwrap();
        m.add_return(&[t]).unwrap();
        let text = m.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "@0 = @param:x -> f32, {2, 3}, {3, 1}");
        assert_eq!(lines[1], "@1 = transpose[dims={1, 0}](@0) -> f32, {3, 2}, {1, 3}");
        assert_eq!(lines[2], "@2 = @return(@1) -> f32, {3, 2}, {1, 3}");
    }
}
