use optikit_core::tensor::{randn, Tensor};
use optikit_core::DType;

#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(dead_code)]
pub fn create_test_tensor(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
    Tensor::new(data, shape).expect("Test tensor creation failed")
}

#[allow(dead_code)]
pub fn create_test_param(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
    let t = create_test_tensor(data, shape);
    t.set_requires_grad(true).expect("requires_grad");
    t
}

/// Standard-normal `f64` parameter of the given shape.
#[allow(dead_code)]
pub fn create_random_param(shape: &[usize]) -> Tensor {
    let t = randn(shape, DType::F64).expect("randn");
    t.set_requires_grad(true).expect("requires_grad");
    t
}
