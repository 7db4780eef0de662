use optikit_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::buffer_table::BufferTable;
use crate::error::OptimError;
use crate::optimizer_base::OptimizerBase;
use crate::optimizer_state::ParamId;
use crate::optimizer_trait::{NoArgStep, Optimizer, OptimizerCore};
use crate::options::OptimizerOptions;
use crate::param_group::ParamGroup;
use crate::serialize::{InputArchive, OutputArchive};

/// Hyperparameters of [`Adagrad`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdagradOptions {
    pub lr: f64,
    pub lr_decay: f64,
    pub weight_decay: f64,
    pub initial_accumulator_value: f64,
    pub eps: f64,
}

impl Default for AdagradOptions {
    fn default() -> Self {
        AdagradOptions {
            lr: 0.01,
            lr_decay: 0.0,
            weight_decay: 0.0,
            initial_accumulator_value: 0.0,
            eps: 1e-10,
        }
    }
}

impl AdagradOptions {
    pub fn new(lr: f64) -> Self {
        AdagradOptions {
            lr,
            ..Self::default()
        }
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    pub fn with_lr_decay(mut self, lr_decay: f64) -> Self {
        self.lr_decay = lr_decay;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_initial_accumulator_value(mut self, value: f64) -> Self {
        self.initial_accumulator_value = value;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn validate(&self) -> Result<(), OptimError> {
        let checks = [
            ("learning rate", self.lr),
            ("lr_decay", self.lr_decay),
            ("weight_decay", self.weight_decay),
            ("initial_accumulator_value", self.initial_accumulator_value),
            ("epsilon", self.eps),
        ];
        for (name, value) in checks {
            if value < 0.0 {
                return Err(OptimError::InvalidArgument(format!("Invalid {} value: {}", name, value)));
            }
        }
        Ok(())
    }
}

impl OptimizerOptions for AdagradOptions {
    fn lr(&self) -> f64 {
        self.lr
    }

    fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }
}

/// Adagrad: per-element learning rates scaled by the running sum of squared
/// gradients.
///
/// State is kept in two buffer tables indexed by parameter position: the
/// squared-gradient sums (tensors shaped and placed like their parameter)
/// and the step counters.
#[derive(Debug)]
pub struct Adagrad {
    base: OptimizerBase<AdagradOptions, ()>,
    sum_buffers: BufferTable<Tensor>,
    step_buffers: BufferTable<u64>,
}

impl Adagrad {
    pub fn new(params: Vec<Tensor>, options: AdagradOptions) -> Result<Self, OptimError> {
        options.validate()?;
        Ok(Self::from_base(OptimizerBase::new(params, options)?))
    }

    pub fn with_groups(
        param_groups: Vec<ParamGroup<AdagradOptions>>,
        defaults: AdagradOptions,
    ) -> Result<Self, OptimError> {
        defaults.validate()?;
        for options in param_groups.iter().filter_map(ParamGroup::options) {
            options.validate()?;
        }
        Ok(Self::from_base(OptimizerBase::with_groups(param_groups, defaults)?))
    }

    fn from_base(base: OptimizerBase<AdagradOptions, ()>) -> Self {
        Adagrad {
            base,
            sum_buffers: BufferTable::new(),
            step_buffers: BufferTable::new(),
        }
    }

    /// Squared-gradient sums, one slot per parameter that has been stepped
    /// (or lies before one that has).
    pub fn sum_buffers(&self) -> &BufferTable<Tensor> {
        &self.sum_buffers
    }

    pub fn step_buffers(&self) -> &BufferTable<u64> {
        &self.step_buffers
    }
}

impl OptimizerCore for Adagrad {
    type Options = AdagradOptions;
    type State = ();
    type StepKind = NoArgStep;

    fn base(&self) -> &OptimizerBase<AdagradOptions, ()> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OptimizerBase<AdagradOptions, ()> {
        &mut self.base
    }

    fn add_param_group(&mut self, param_group: ParamGroup<AdagradOptions>) -> Result<(), OptimError> {
        if let Some(options) = param_group.options() {
            options.validate()?;
        }
        self.base.add_param_group(param_group)
    }

    fn save(&self, archive: &mut OutputArchive) -> Result<(), OptimError> {
        self.base.save_param_groups(archive, "adagrad")?;
        archive.write_tensors("adagrad.sum", self.sum_buffers.slots())?;
        archive.write("adagrad.step", self.step_buffers.slots())?;
        Ok(())
    }

    fn load(&mut self, archive: &InputArchive) -> Result<(), OptimError> {
        let sums = archive.read_tensors("adagrad.sum")?;
        let steps: Vec<u64> = archive.read("adagrad.step")?;
        let size = self.base.size();
        if sums.len() > size || steps.len() > size {
            return Err(OptimError::InvalidArgument(format!(
                "archive holds Adagrad buffers for {} parameters, optimizer has {}",
                sums.len().max(steps.len()),
                size
            )));
        }
        for (index, sum) in sums.iter().enumerate() {
            self.base.check_buffer_shape(ParamId::new(index), sum, "squared-gradient sum")?;
        }

        self.base.load_param_groups(archive, "adagrad", AdagradOptions::validate)?;
        self.sum_buffers = BufferTable::from_slots(sums);
        self.step_buffers = BufferTable::from_slots(steps);
        Ok(())
    }
}

impl Optimizer for Adagrad {
    fn step(&mut self) -> Result<(), OptimError> {
        let base = &self.base;
        for (group_idx, group) in base.param_groups().iter().enumerate() {
            let options = base.options_for(group_idx)?;

            for (id, param) in group.entries() {
                let grad = match param.grad() {
                    Some(grad) => grad.detach(),
                    None => continue,
                };
                let index = id.index();
                let sum = base.buffer_at(&mut self.sum_buffers, index)?;
                let step = self.step_buffers.at(index);
                if *step == 0 && options.initial_accumulator_value != 0.0 {
                    sum.fill_(options.initial_accumulator_value);
                }
                *step += 1;

                if options.weight_decay != 0.0 {
                    grad.add_scaled_(param, options.weight_decay)?;
                }
                let clr = options.lr / (1.0 + (*step - 1) as f64 * options.lr_decay);
                log::debug!("Adagrad: {} step {} with effective lr {}", id, step, clr);

                sum.addcmul_(&grad, &grad, 1.0)?;
                let std = sum.sqrt();
                std.add_scalar_(options.eps);
                param.addcdiv_(&grad, &std, -clr)?;
            }
        }
        Ok(())
    }
}
