#[cfg(test)]
mod tests {
    use optikit_core::ops::mul_scalar_op;
    use optikit_core::utils::testing::{create_test_param, create_test_param_f64};
    use optikit_core::{DType, StorageDevice, Tensor};
    use serde::{Deserialize, Serialize};

    use crate::buffer_table::BufferTable;
    use crate::error::OptimError;
    use crate::optimizer_base::OptimizerBase;
    use crate::optimizer_state::ParamId;
    use crate::optimizer_trait::{NoArgStep, Optimizer, OptimizerCore};
    use crate::options::OptimizerOptions;
    use crate::param_group::ParamGroup;
    use crate::serialize::{load_optimizer, save_optimizer, OutputArchive};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestOptions {
        lr: f64,
    }

    impl OptimizerOptions for TestOptions {
        fn lr(&self) -> f64 {
            self.lr
        }

        fn set_lr(&mut self, lr: f64) {
            self.lr = lr;
        }
    }

    type Base = OptimizerBase<TestOptions, ()>;

    fn opts(lr: f64) -> TestOptions {
        TestOptions { lr }
    }

    fn param(data: Vec<f32>) -> Tensor {
        let len = data.len();
        create_test_param(data, vec![len])
    }

    fn assert_invalid<T: std::fmt::Debug>(result: Result<T, OptimError>, needle: &str) {
        match result {
            Err(OptimError::InvalidArgument(msg)) => {
                assert!(msg.contains(needle), "unexpected message: {}", msg)
            }
            other => panic!("Expected InvalidArgument({}), got {:?}", needle, other),
        }
    }

    /// Optimizer relying on the default persistence hooks.
    struct Noop {
        base: Base,
    }

    impl OptimizerCore for Noop {
        type Options = TestOptions;
        type State = ();
        type StepKind = NoArgStep;

        fn base(&self) -> &Base {
            &self.base
        }

        fn base_mut(&mut self) -> &mut Base {
            &mut self.base
        }
    }

    impl Optimizer for Noop {
        fn step(&mut self) -> Result<(), OptimError> {
            Ok(())
        }
    }

    #[test]
    fn test_parameters_follow_registration_order() -> Result<(), OptimError> {
        let (a, b, c) = (param(vec![1.0]), param(vec![2.0]), param(vec![3.0]));
        let base = Base::with_groups(
            vec![
                ParamGroup::new(vec![a.clone(), b.clone()]),
                ParamGroup::with_options(vec![c.clone()], opts(0.5)),
            ],
            opts(0.1),
        )?;
        assert_eq!(base.size(), 3);
        let params = base.parameters();
        assert!(Tensor::ptr_eq(&params[0], &a));
        assert!(Tensor::ptr_eq(&params[1], &b));
        assert!(Tensor::ptr_eq(&params[2], &c));
        assert_eq!(base.param_id(&c), Some(ParamId::new(2)));
        assert_eq!(base.param_id(&param(vec![3.0])), None);

        let ids: Vec<usize> = base.param_groups()[1].entries().map(|(id, _)| id.index()).collect();
        assert_eq!(ids, vec![2]);
        assert!(Tensor::ptr_eq(base.parameter(ParamId::new(1))?, &b));
        assert!(matches!(
            base.parameter(ParamId::new(3)),
            Err(OptimError::OutOfRange { index: 3, len: 3 })
        ));
        Ok(())
    }

    #[test]
    fn test_non_leaf_parameter_is_rejected() -> Result<(), OptimError> {
        let leaf = param(vec![1.0, 2.0]);
        let derived = mul_scalar_op(&leaf, 2.0)?;
        assert!(!derived.is_leaf());

        let mut base = Base::new(vec![param(vec![0.0])], opts(0.1))?;
        assert_invalid(base.add_param_group(ParamGroup::new(vec![derived.clone()])), "non-leaf");
        assert_eq!(base.param_groups().len(), 1);
        assert_eq!(base.size(), 1);

        assert_invalid(Base::from_parameters(vec![derived]), "non-leaf");
        Ok(())
    }

    #[test]
    fn test_groups_snapshot_defaults() -> Result<(), OptimError> {
        let mut base = Base::with_groups(vec![], opts(0.1))?;
        base.add_param_group(ParamGroup::new(vec![param(vec![1.0])]))?;
        base.set_defaults(opts(0.2));
        base.add_param_group(ParamGroup::new(vec![param(vec![2.0])]))?;

        assert_eq!(base.param_groups()[0].lr(), Some(0.1));
        assert_eq!(base.param_groups()[1].lr(), Some(0.2));
        assert_eq!(base.defaults(), Some(&opts(0.2)));

        base.set_lr(0, 0.05)?;
        assert_eq!(base.options_for(0)?.lr, 0.05);
        assert_eq!(base.defaults(), Some(&opts(0.2)));
        Ok(())
    }

    #[test]
    fn test_implicit_group_then_grouped_registration() -> Result<(), OptimError> {
        let mut base = Base::from_parameters(vec![param(vec![0.0]), param(vec![1.0])])?;
        assert_eq!(base.size(), 2);

        base.set_defaults(opts(0.1));
        base.add_param_group(ParamGroup::new(vec![param(vec![2.0])]))?;
        assert_eq!(base.param_groups()[1].options(), Some(&opts(0.1)));

        base.set_defaults(opts(0.2));
        assert_eq!(base.param_groups()[1].options(), Some(&opts(0.1)));
        assert_eq!(base.size(), 3);
        Ok(())
    }

    #[test]
    fn test_group_without_options_needs_defaults() -> Result<(), OptimError> {
        let mut base = Base::from_parameters(vec![param(vec![1.0])])?;
        assert!(base.defaults().is_none());
        assert!(!base.param_groups()[0].has_options());
        assert_invalid(base.add_param_group(ParamGroup::new(vec![param(vec![2.0])])), "no defaults");
        assert_eq!(base.size(), 1);

        base.set_defaults(opts(0.3));
        base.add_param_group(ParamGroup::new(vec![param(vec![2.0])]))?;
        assert_eq!(base.param_groups()[1].lr(), Some(0.3));
        // The implicit group falls back to the defaults.
        assert_eq!(base.options_for(0)?.lr, 0.3);
        Ok(())
    }

    #[test]
    fn test_duplicate_parameters_are_rejected() -> Result<(), OptimError> {
        let a = param(vec![1.0]);
        let b = param(vec![2.0]);
        let mut base = Base::new(vec![a.clone()], opts(0.1))?;

        assert_invalid(
            base.add_param_group(ParamGroup::new(vec![b.clone(), a.clone()])),
            "more than one parameter group",
        );
        assert_eq!(base.size(), 1);
        assert_eq!(base.param_groups().len(), 1);

        assert_invalid(
            base.add_param_group(ParamGroup::new(vec![b.clone(), b.clone()])),
            "more than one parameter group",
        );
        assert_invalid(Base::from_parameters(vec![a.clone(), a.clone()]), "more than one");

        base.add_param_group(ParamGroup::new(vec![b]))?;
        assert_eq!(base.size(), 2);
        Ok(())
    }

    #[test]
    fn test_add_parameters_extends_implicit_group() -> Result<(), OptimError> {
        let (a, b) = (param(vec![1.0]), param(vec![2.0]));
        let mut base = Base::from_parameters(vec![a])?;
        base.add_parameters(vec![b.clone()])?;
        assert_eq!(base.param_groups().len(), 1);
        assert_eq!(base.param_groups()[0].len(), 2);
        assert_eq!(base.param_id(&b), Some(ParamId::new(1)));

        assert_invalid(base.add_parameters(vec![b]), "more than one");
        Ok(())
    }

    #[test]
    fn test_mixing_registration_styles_is_rejected() -> Result<(), OptimError> {
        let mut legacy = Base::from_parameters(vec![param(vec![1.0])])?;
        legacy.set_defaults(opts(0.1));
        legacy.add_param_group(ParamGroup::new(vec![param(vec![2.0])]))?;
        assert_invalid(legacy.add_parameters(vec![param(vec![3.0])]), "add_parameters");
        assert_eq!(legacy.size(), 2);

        let mut grouped = Base::new(vec![param(vec![1.0])], opts(0.1))?;
        assert_invalid(grouped.add_parameters(vec![param(vec![3.0])]), "add_parameters");
        Ok(())
    }

    #[test]
    fn test_zero_grad_zeroes_in_place() -> Result<(), OptimError> {
        let with_grad = param(vec![1.0, 2.0]);
        let without_grad = param(vec![3.0]);
        with_grad.acc_grad(Tensor::new(vec![0.5, -0.5], vec![2])?)?;
        let grad = with_grad.grad().unwrap();
        let addr = grad.storage_addr();

        let mut base = Base::new(vec![with_grad.clone(), without_grad.clone()], opts(0.1))?;
        base.zero_grad();

        let after = with_grad.grad().unwrap();
        assert!(Tensor::ptr_eq(&after, &grad));
        assert_eq!(after.storage_addr(), addr);
        assert_eq!(after.get_f32_data()?, vec![0.0, 0.0]);
        assert!(without_grad.grad().is_none());
        Ok(())
    }

    #[test]
    fn test_zero_grad_detaches_gradient_history() -> Result<(), OptimError> {
        let p = param(vec![1.0]);
        let source = param(vec![4.0]);
        let grad_with_history = mul_scalar_op(&source, 1.0)?;
        assert!(!grad_with_history.is_leaf());
        p.set_grad(Some(grad_with_history.clone()))?;

        let mut base = Base::from_parameters(vec![p.clone()])?;
        base.zero_grad();

        let grad = p.grad().unwrap();
        assert!(grad.is_leaf());
        assert!(!grad.requires_grad());
        assert_eq!(grad.get_f32_data()?, vec![0.0]);
        // The source of the history is untouched.
        assert_eq!(source.get_f32_data()?, vec![4.0]);
        Ok(())
    }

    #[test]
    fn test_buffer_at_is_idempotent() -> Result<(), OptimError> {
        let base = Base::new(vec![param(vec![1.0, 2.0, 3.0])], opts(0.1))?;
        let mut buffers: BufferTable<Tensor> = BufferTable::new();

        let first = base.buffer_at(&mut buffers, 0)?.clone();
        first.fill_(2.5);
        let second = base.buffer_at(&mut buffers, 0)?.clone();
        assert!(Tensor::ptr_eq(&first, &second));
        assert_eq!(second.storage_addr(), first.storage_addr());
        assert_eq!(second.get_f32_data()?, vec![2.5, 2.5, 2.5]);
        assert_eq!(buffers.len(), 1);
        Ok(())
    }

    #[test]
    fn test_buffer_at_grows_every_slot_up_to_index() -> Result<(), OptimError> {
        let params: Vec<Tensor> = (0..4).map(|i| param(vec![i as f32; i + 1])).collect();
        let base = Base::new(params, opts(0.1))?;
        let mut buffers: BufferTable<Tensor> = BufferTable::new();

        base.buffer_at(&mut buffers, 3)?;
        assert_eq!(buffers.len(), 4);
        for (i, slot) in buffers.slots().iter().enumerate() {
            assert_eq!(slot.shape(), vec![i + 1]);
            assert_eq!(slot.to_f64_vec(), vec![0.0; i + 1]);
        }

        let mut counters: BufferTable<u64> = BufferTable::new();
        *counters.at(3) += 1;
        assert_eq!(counters.slots(), &[0, 0, 0, 1]);

        assert!(matches!(
            base.buffer_at(&mut buffers, 4),
            Err(OptimError::OutOfRange { index: 4, len: 4 })
        ));
        Ok(())
    }

    #[test]
    fn test_buffer_at_follows_parameter_placement() -> Result<(), OptimError> {
        let p = param(vec![1.0, 2.0]);
        let base = Base::new(vec![p.clone()], opts(0.1))?;
        let mut buffers: BufferTable<Tensor> = BufferTable::new();
        base.buffer_at(&mut buffers, 0)?.fill_(1.5);

        p.set_placement_(StorageDevice::GPU(1), DType::F64)?;
        let slot = base.buffer_at(&mut buffers, 0)?.clone();
        assert_eq!(slot.device(), StorageDevice::GPU(1));
        assert_eq!(slot.dtype(), DType::F64);
        assert_eq!(slot.get_f64_data()?, vec![1.5, 1.5]);

        // Already in sync: the slot is returned as is.
        let again = base.buffer_at(&mut buffers, 0)?.clone();
        assert!(Tensor::ptr_eq(&again, &slot));
        Ok(())
    }

    #[test]
    fn test_default_persistence_hooks_do_nothing() -> Result<(), OptimError> {
        let mut noop = Noop {
            base: Base::new(vec![create_test_param_f64(vec![1.0], vec![1])], opts(0.1))?,
        };
        noop.step()?;

        let mut archive = OutputArchive::new();
        save_optimizer(&mut archive, &noop)?;
        assert!(archive.is_empty());

        load_optimizer(&archive.into_input(), &mut noop)?;
        assert_eq!(noop.size(), 1);
        assert_eq!(noop.param_groups()[0].lr(), Some(0.1));
        Ok(())
    }

    #[test]
    fn test_param_groups_roundtrip_through_archive() -> Result<(), OptimError> {
        let source = Base::with_groups(
            vec![
                ParamGroup::new(vec![param(vec![1.0])]),
                ParamGroup::with_options(vec![param(vec![2.0]), param(vec![3.0])], opts(0.7)),
            ],
            opts(0.1),
        )?;
        let mut archive = OutputArchive::new();
        source.save_param_groups(&mut archive, "test")?;
        let input = archive.into_input();

        let mut target = Base::with_groups(
            vec![
                ParamGroup::new(vec![param(vec![1.0])]),
                ParamGroup::new(vec![param(vec![2.0]), param(vec![3.0])]),
            ],
            opts(0.9),
        )?;
        target.load_param_groups(&input, "test", |_| Ok(()))?;
        assert_eq!(target.defaults(), Some(&opts(0.1)));
        assert_eq!(target.param_groups()[0].lr(), Some(0.1));
        assert_eq!(target.param_groups()[1].lr(), Some(0.7));

        let mut other_layout = Base::new(vec![param(vec![1.0])], opts(0.9))?;
        assert_invalid(other_layout.load_param_groups(&input, "test", |_| Ok(())), "sizes");
        Ok(())
    }

    #[test]
    fn test_options_mut_leaves_membership_untouched() -> Result<(), OptimError> {
        let a = param(vec![1.0]);
        let b = param(vec![2.0]);
        let mut base = Base::with_groups(
            vec![
                ParamGroup::new(vec![a.clone()]),
                ParamGroup::with_options(vec![b.clone()], opts(0.5)),
            ],
            opts(0.1),
        )?;

        base.options_mut(1)?.lr = 0.25;
        base.set_lr(0, 0.01)?;

        assert_eq!(base.options_for(0)?.lr, 0.01);
        assert_eq!(base.options_for(1)?.lr, 0.25);
        assert_eq!(base.defaults(), Some(&opts(0.1)));
        let ids: Vec<Vec<ParamId>> = base
            .param_groups()
            .iter()
            .map(|g| g.entries().map(|(id, _)| id).collect())
            .collect();
        assert_eq!(ids, vec![vec![ParamId::new(0)], vec![ParamId::new(1)]]);
        assert!(Tensor::ptr_eq(base.parameter(ParamId::new(0))?, &a));
        assert!(Tensor::ptr_eq(base.parameter(ParamId::new(1))?, &b));
        Ok(())
    }

    #[test]
    fn test_options_mut_materializes_defaults_for_implicit_group() -> Result<(), OptimError> {
        let mut base = Base::from_parameters(vec![param(vec![0.0])])?;
        assert!(matches!(base.options_mut(0), Err(OptimError::InvalidArgument(_))));

        base.set_defaults(opts(0.3));
        base.set_lr(0, 0.03)?;
        assert_eq!(base.param_groups()[0].options(), Some(&opts(0.03)));
        assert_eq!(base.defaults(), Some(&opts(0.3)));

        assert!(matches!(base.options_mut(1), Err(OptimError::OutOfRange { .. })));
        assert!(matches!(base.set_lr(7, 1.0), Err(OptimError::OutOfRange { .. })));
        Ok(())
    }

    #[test]
    fn test_load_param_groups_rejects_invalid_options_without_changes() -> Result<(), OptimError> {
        let source = Base::new(vec![param(vec![1.0])], opts(0.1))?;
        let mut archive = OutputArchive::new();
        source.save_param_groups(&mut archive, "test")?;
        archive.write("test.param_groups.options", &vec![Some(opts(-1.0))])?;
        let input = archive.into_input();

        let mut target = Base::new(vec![param(vec![1.0])], opts(0.9))?;
        let positive_lr = |o: &TestOptions| {
            if o.lr < 0.0 {
                return Err(OptimError::InvalidArgument(format!("negative lr {}", o.lr)));
            }
            Ok(())
        };
        assert_invalid(target.load_param_groups(&input, "test", positive_lr), "negative lr");
        assert_eq!(target.options_for(0)?, &opts(0.9));
        assert_eq!(target.defaults(), Some(&opts(0.9)));
        Ok(())
    }

    #[test]
    fn test_check_buffer_shape() -> Result<(), OptimError> {
        let base = Base::new(vec![param(vec![1.0, 2.0, 3.0])], opts(0.1))?;
        base.check_buffer_shape(ParamId::new(0), &param(vec![0.0, 0.0, 0.0]), "buffer")?;
        assert_invalid(
            base.check_buffer_shape(ParamId::new(0), &param(vec![0.0]), "buffer"),
            "has shape [1]",
        );
        assert!(matches!(
            base.check_buffer_shape(ParamId::new(1), &param(vec![0.0]), "buffer"),
            Err(OptimError::OutOfRange { .. })
        ));
        Ok(())
    }
}
