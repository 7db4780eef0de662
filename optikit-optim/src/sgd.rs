use optikit_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::error::OptimError;
use crate::optimizer_base::OptimizerBase;
use crate::optimizer_state::{ParamId, ParamState, StateMap};
use crate::optimizer_trait::{NoArgStep, Optimizer, OptimizerCore};
use crate::options::OptimizerOptions;
use crate::param_group::ParamGroup;
use crate::serialize::{InputArchive, OutputArchive};

/// Hyperparameters of [`Sgd`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgdOptions {
    pub lr: f64,
    pub momentum: f64,
    pub dampening: f64,
    pub weight_decay: f64,
    pub nesterov: bool,
}

impl Default for SgdOptions {
    fn default() -> Self {
        SgdOptions {
            lr: 0.01,
            momentum: 0.0,
            dampening: 0.0,
            weight_decay: 0.0,
            nesterov: false,
        }
    }
}

impl SgdOptions {
    pub fn new(lr: f64) -> Self {
        SgdOptions {
            lr,
            ..Self::default()
        }
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_dampening(mut self, dampening: f64) -> Self {
        self.dampening = dampening;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_nesterov(mut self, nesterov: bool) -> Self {
        self.nesterov = nesterov;
        self
    }

    pub fn validate(&self) -> Result<(), OptimError> {
        if self.lr < 0.0 {
            return Err(OptimError::InvalidArgument(format!("Invalid learning rate: {}", self.lr)));
        }
        if self.momentum < 0.0 {
            return Err(OptimError::InvalidArgument(format!("Invalid momentum value: {}", self.momentum)));
        }
        if self.weight_decay < 0.0 {
            return Err(OptimError::InvalidArgument(format!(
                "Invalid weight_decay value: {}",
                self.weight_decay
            )));
        }
        if self.nesterov && (self.momentum <= 0.0 || self.dampening != 0.0) {
            return Err(OptimError::invalid(
                "Nesterov momentum requires a momentum and zero dampening",
            ));
        }
        Ok(())
    }
}

impl OptimizerOptions for SgdOptions {
    fn lr(&self) -> f64 {
        self.lr
    }

    fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }
}

/// Momentum buffer of one parameter, created on its first update.
#[derive(Debug, Clone)]
pub struct SgdParamState {
    pub momentum_buffer: Tensor,
}

impl ParamState for SgdParamState {}

/// Stochastic gradient descent, optionally with momentum, dampening,
/// weight decay and Nesterov momentum.
///
/// ```text
/// d_p = grad + weight_decay * p
/// buf = momentum * buf + (1 - dampening) * d_p      (buf = d_p on the first step)
/// d_p = nesterov ? d_p + momentum * buf : buf
/// p  -= lr * d_p
/// ```
#[derive(Debug)]
pub struct Sgd {
    base: OptimizerBase<SgdOptions, SgdParamState>,
}

impl Sgd {
    /// Optimizes `params` as a single group using `options`.
    pub fn new(params: Vec<Tensor>, options: SgdOptions) -> Result<Self, OptimError> {
        options.validate()?;
        Ok(Sgd {
            base: OptimizerBase::new(params, options)?,
        })
    }

    /// Optimizes several groups; groups without options use `defaults`.
    pub fn with_groups(param_groups: Vec<ParamGroup<SgdOptions>>, defaults: SgdOptions) -> Result<Self, OptimError> {
        defaults.validate()?;
        for options in param_groups.iter().filter_map(ParamGroup::options) {
            options.validate()?;
        }
        Ok(Sgd {
            base: OptimizerBase::with_groups(param_groups, defaults)?,
        })
    }
}

impl OptimizerCore for Sgd {
    type Options = SgdOptions;
    type State = SgdParamState;
    type StepKind = NoArgStep;

    fn base(&self) -> &OptimizerBase<SgdOptions, SgdParamState> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OptimizerBase<SgdOptions, SgdParamState> {
        &mut self.base
    }

    fn add_param_group(&mut self, param_group: ParamGroup<SgdOptions>) -> Result<(), OptimError> {
        if let Some(options) = param_group.options() {
            options.validate()?;
        }
        self.base.add_param_group(param_group)
    }

    fn save(&self, archive: &mut OutputArchive) -> Result<(), OptimError> {
        self.base.save_param_groups(archive, "sgd")?;
        let mut ids: Vec<ParamId> = self.base.state().keys().copied().collect();
        ids.sort();
        let buffers: Vec<Tensor> = ids
            .iter()
            .filter_map(|id| self.base.state().get(id))
            .map(|s| s.momentum_buffer.clone())
            .collect();
        archive.write("sgd.momentum.ids", &ids)?;
        archive.write_tensors("sgd.momentum.buffers", &buffers)?;
        Ok(())
    }

    fn load(&mut self, archive: &InputArchive) -> Result<(), OptimError> {
        let ids: Vec<ParamId> = archive.read("sgd.momentum.ids")?;
        let buffers = archive.read_tensors("sgd.momentum.buffers")?;
        if ids.len() != buffers.len() {
            return Err(OptimError::InvalidArgument(format!(
                "archive holds {} momentum ids but {} buffers",
                ids.len(),
                buffers.len()
            )));
        }
        let mut restored = StateMap::new();
        for (id, momentum_buffer) in ids.into_iter().zip(buffers) {
            if id.index() >= self.base.size() {
                log::warn!("Sgd::load: skipping momentum buffer of unregistered {}", id);
                continue;
            }
            self.base.check_buffer_shape(id, &momentum_buffer, "momentum buffer")?;
            restored.insert(id, SgdParamState { momentum_buffer });
        }

        self.base.load_param_groups(archive, "sgd", SgdOptions::validate)?;
        *self.base.state_mut() = restored;
        Ok(())
    }
}

impl Optimizer for Sgd {
    fn step(&mut self) -> Result<(), OptimError> {
        let parts = self.base.step_parts();
        for (group_idx, group) in parts.param_groups.iter().enumerate() {
            let options = parts.options_of(group)?;
            log::debug!("Sgd: step on group {} with lr {}", group_idx, options.lr);

            for (id, param) in group.entries() {
                let grad = match param.grad() {
                    Some(grad) => grad,
                    None => continue,
                };
                let d_p = grad.detach();
                if options.weight_decay != 0.0 {
                    d_p.add_scaled_(param, options.weight_decay)?;
                }

                let d_p = if options.momentum != 0.0 {
                    let buf = match parts.state.get_mut(&id) {
                        Some(state) => {
                            if !state.momentum_buffer.same_placement(param) {
                                state.momentum_buffer =
                                    state.momentum_buffer.to(param.device(), param.dtype())?;
                            }
                            let buf = &state.momentum_buffer;
                            buf.mul_scalar_(options.momentum);
                            buf.add_scaled_(&d_p, 1.0 - options.dampening)?;
                            buf.clone()
                        }
                        None => {
                            let buf = d_p.detach();
                            parts.state.insert(
                                id,
                                SgdParamState {
                                    momentum_buffer: buf.clone(),
                                },
                            );
                            buf
                        }
                    };
                    if options.nesterov {
                        d_p.add_scaled_(&buf, options.momentum)?;
                        d_p
                    } else {
                        buf
                    }
                } else {
                    d_p
                };

                param.add_scaled_(&d_p, -options.lr)?;
            }
        }
        Ok(())
    }
}
