use std::fmt::Debug;

use crate::error::OptikitError;
use crate::tensor::Tensor;

/// Defines the interface for the backward pass of a differentiable tensor operation.
///
/// Any operation that creates a non-leaf `Tensor` stores an implementation of
/// this trait in the output's `grad_fn`. `backward()` walks these nodes to
/// propagate gradients by the chain rule.
pub trait BackwardOp: Debug + Send + Sync {
    /// Given dL/dOutput, returns dL/dInput_i for each input, in the order of
    /// [`inputs`](BackwardOp::inputs). Each gradient must have the shape,
    /// device and dtype of its input, and must not alias `grad_output`.
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, OptikitError>;

    /// Handles to the tensors this operation consumed.
    fn inputs(&self) -> Vec<Tensor>;
}
