use std::sync::Arc;

use crate::autograd::BackwardOp;
use crate::buffer::Buffer;
use crate::error::OptikitError;
use crate::ops::attach_grad_fn;
use crate::tensor::Tensor;

#[derive(Debug)]
struct SumBackward {
    input: Tensor,
}

impl BackwardOp for SumBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, OptikitError> {
        let upstream = grad_output.item()?;
        let guard = self.input.read_data();
        let grad = Tensor::from_buffer(
            Buffer::from_f64(guard.dtype(), &vec![upstream; guard.numel()]),
            guard.shape.clone(),
            guard.device,
        )?;
        Ok(vec![grad])
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.input.clone()]
    }
}

/// Sum of all elements, as a 0-dimensional tensor.
pub fn sum_op(input: &Tensor) -> Result<Tensor, OptikitError> {
    let (total, dtype, device) = {
        let guard = input.read_data();
        let total: f64 = guard.buffer.to_f64_vec().iter().sum();
        (total, guard.dtype(), guard.device)
    };
    let out = Tensor::from_buffer(Buffer::from_f64(dtype, &[total]), vec![], device)?;
    attach_grad_fn(
        &out,
        &[input],
        Arc::new(SumBackward {
            input: input.clone(),
        }),
    );
    Ok(out)
}
