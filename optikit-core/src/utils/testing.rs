use crate::tensor::Tensor;

/// Checks that two tensors are approximately equal (shape and values within
/// `tolerance`). Works for any dtype. Panics on mismatch.
pub fn check_tensor_near(actual: &Tensor, expected_shape: &[usize], expected_data: &[f64], tolerance: f64) {
    assert_eq!(actual.shape(), expected_shape, "Shape mismatch");
    let actual_data = actual.to_f64_vec();
    assert_eq!(actual_data.len(), expected_data.len(), "Data length mismatch");
    for (i, (a, e)) in actual_data.iter().zip(expected_data.iter()).enumerate() {
        let diff = (a - e).abs();
        if diff > tolerance {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                i, a, e, diff, tolerance
            );
        }
    }
}

/// Creates a leaf F32 tensor that requires gradients.
pub fn create_test_param(data: Vec<f32>, shape: Vec<usize>) -> Tensor {
    let tensor = Tensor::new(data, shape).expect("Failed to create test tensor");
    tensor
        .set_requires_grad(true)
        .expect("Failed to set requires_grad on test tensor");
    tensor
}

/// Creates a leaf F64 tensor that requires gradients.
pub fn create_test_param_f64(data: Vec<f64>, shape: Vec<usize>) -> Tensor {
    let tensor = Tensor::new_f64(data, shape).expect("Failed to create test tensor");
    tensor
        .set_requires_grad(true)
        .expect("Failed to set requires_grad on test tensor");
    tensor
}
