use optikit_core::ops::{mul_op, sub_op, sum_op};
use optikit_core::Tensor;
use optikit_optim::OptimError;

#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(dead_code)]
pub fn create_param(data: Vec<f64>) -> Tensor {
    let len = data.len();
    let t = Tensor::new_f64(data, vec![len]).expect("Test tensor creation failed");
    t.set_requires_grad(true).expect("requires_grad");
    t
}

/// `sum((w * x - y)^2)`, backpropagated into `w`.
#[allow(dead_code)]
pub fn regression_loss(w: &Tensor, x: &Tensor, y: &Tensor) -> Result<Tensor, OptimError> {
    let residual = sub_op(&mul_op(w, x)?, y)?;
    let loss = sum_op(&mul_op(&residual, &residual)?)?;
    loss.backward()?;
    Ok(loss)
}
