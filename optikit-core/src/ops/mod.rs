//! Differentiable tensor operations.
//!
//! Only same-shape element-wise arithmetic and a full sum are provided;
//! enough to express losses whose gradients feed the optimizers.

pub mod elementwise;
pub mod reduce;

pub use elementwise::{add_op, mul_op, mul_scalar_op, sub_op};
pub use reduce::sum_op;

use std::sync::Arc;

use crate::autograd::BackwardOp;
use crate::tensor::Tensor;

/// Marks `output` as produced by `grad_fn` when any input requires gradients.
pub(crate) fn attach_grad_fn(output: &Tensor, inputs: &[&Tensor], grad_fn: Arc<dyn BackwardOp>) {
    if inputs.iter().any(|t| t.requires_grad()) {
        output.set_grad_fn(Some(grad_fn));
        output.write_data().requires_grad = true;
    }
}
