use std::sync::Arc;

use crate::autograd::BackwardOp;
use crate::error::OptikitError;
use crate::ops::attach_grad_fn;
use crate::tensor::Tensor;

#[derive(Debug)]
struct AddBackward {
    a: Tensor,
    b: Tensor,
}

impl BackwardOp for AddBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, OptikitError> {
        Ok(vec![grad_output.detach(), grad_output.detach()])
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

#[derive(Debug)]
struct SubBackward {
    a: Tensor,
    b: Tensor,
}

impl BackwardOp for SubBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, OptikitError> {
        let neg = grad_output.detach();
        neg.mul_scalar_(-1.0);
        Ok(vec![grad_output.detach(), neg])
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Keeps value snapshots of the operands taken at forward time, so an
/// in-place update between forward and backward does not skew the result.
#[derive(Debug)]
struct MulBackward {
    a: Tensor,
    b: Tensor,
    a_value: Tensor,
    b_value: Tensor,
}

impl BackwardOp for MulBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, OptikitError> {
        let grad_a = grad_output.detach();
        grad_a.mul_(&self.b_value)?;
        let grad_b = grad_output.detach();
        grad_b.mul_(&self.a_value)?;
        Ok(vec![grad_a, grad_b])
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

#[derive(Debug)]
struct MulScalarBackward {
    a: Tensor,
    scalar: f64,
}

impl BackwardOp for MulScalarBackward {
    fn backward(&self, grad_output: &Tensor) -> Result<Vec<Tensor>, OptikitError> {
        let grad = grad_output.detach();
        grad.mul_scalar_(self.scalar);
        Ok(vec![grad])
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// `a + b`, element-wise. Shapes, devices and dtypes must match.
pub fn add_op(a: &Tensor, b: &Tensor) -> Result<Tensor, OptikitError> {
    let out = a.detach();
    out.add_(b)?;
    attach_grad_fn(
        &out,
        &[a, b],
        Arc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
        }),
    );
    Ok(out)
}

/// `a - b`, element-wise.
pub fn sub_op(a: &Tensor, b: &Tensor) -> Result<Tensor, OptikitError> {
    let out = a.detach();
    out.sub_(b)?;
    attach_grad_fn(
        &out,
        &[a, b],
        Arc::new(SubBackward {
            a: a.clone(),
            b: b.clone(),
        }),
    );
    Ok(out)
}

/// `a * b`, element-wise.
pub fn mul_op(a: &Tensor, b: &Tensor) -> Result<Tensor, OptikitError> {
    let out = a.detach();
    out.mul_(b)?;
    attach_grad_fn(
        &out,
        &[a, b],
        Arc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            a_value: a.detach(),
            b_value: b.detach(),
        }),
    );
    Ok(out)
}

/// `a * scalar`.
pub fn mul_scalar_op(a: &Tensor, scalar: f64) -> Result<Tensor, OptikitError> {
    let out = a.detach();
    out.mul_scalar_(scalar);
    attach_grad_fn(
        &out,
        &[a],
        Arc::new(MulScalarBackward {
            a: a.clone(),
            scalar,
        }),
    );
    Ok(out)
}
