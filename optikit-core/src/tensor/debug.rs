use std::fmt;

use crate::tensor::Tensor;

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.try_read() {
            Ok(guard) => write!(
                f,
                "Tensor(shape={:?}, device={}, dtype={}, requires_grad={}, has_grad={}, has_grad_fn={})",
                guard.shape,
                guard.device,
                guard.dtype(),
                guard.requires_grad,
                guard.grad.is_some(),
                guard.grad_fn.is_some()
            ),
            Err(_) => write!(f, "Tensor(<locked>)"),
        }
    }
}
