#[cfg(test)]
mod tests {
    use crate::error::OptikitError;
    use crate::ops::{mul_scalar_op, sum_op};
    use crate::tensor::Tensor;
    use crate::utils::testing::create_test_param;

    #[test]
    fn test_leaf_classification() -> Result<(), OptikitError> {
        let p = create_test_param(vec![1.0, 2.0], vec![2]);
        assert!(p.is_leaf());
        let y = mul_scalar_op(&p, 2.0)?;
        assert!(!y.is_leaf());
        assert!(y.detach().is_leaf());
        Ok(())
    }

    #[test]
    fn test_detach_inplace_cuts_history() -> Result<(), OptikitError> {
        let p = create_test_param(vec![1.0], vec![1]);
        let y = mul_scalar_op(&p, 2.0)?;
        let addr = y.storage_addr();
        y.detach_();
        assert!(y.is_leaf());
        assert!(!y.requires_grad());
        assert_eq!(y.storage_addr(), addr);
        Ok(())
    }

    #[test]
    fn test_acc_grad_initializes_then_accumulates() -> Result<(), OptikitError> {
        let p = create_test_param(vec![0.0, 0.0], vec![2]);
        let g = Tensor::new(vec![1.0, 2.0], vec![2])?;
        p.acc_grad(g.clone())?;
        let stored = p.grad().unwrap();
        assert!(!Tensor::ptr_eq(&stored, &g));
        p.acc_grad(g)?;
        assert_eq!(p.grad().unwrap().get_f32_data()?, vec![2.0, 4.0]);
        assert!(Tensor::ptr_eq(&stored, &p.grad().unwrap()));
        Ok(())
    }

    #[test]
    fn test_set_grad_rejects_wrong_shape() {
        let p = create_test_param(vec![0.0, 0.0], vec![2]);
        let g = Tensor::new(vec![1.0], vec![1]).unwrap();
        assert!(matches!(p.set_grad(Some(g)), Err(OptikitError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_backward_non_scalar_requires_gradient() -> Result<(), OptikitError> {
        let p = create_test_param(vec![1.0, 2.0], vec![2]);
        let y = mul_scalar_op(&p, 2.0)?;
        assert_eq!(y.backward(), Err(OptikitError::BackwardNonScalar));
        y.backward_with(Some(Tensor::new(vec![1.0, 1.0], vec![2])?))?;
        assert_eq!(p.grad().unwrap().get_f32_data()?, vec![2.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_backward_without_tracking_is_noop() -> Result<(), OptikitError> {
        let t = Tensor::new(vec![1.0], vec![1])?;
        sum_op(&t)?.backward()?;
        assert!(t.grad().is_none());
        Ok(())
    }
}
