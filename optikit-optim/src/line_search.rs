use optikit_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::error::OptimError;
use crate::optimizer_base::OptimizerBase;
use crate::optimizer_trait::{ClosureStep, LossClosure, LossClosureOptimizer, OptimizerCore};
use crate::options::OptimizerOptions;
use crate::param_group::ParamGroup;
use crate::serialize::{InputArchive, OutputArchive};

/// Hyperparameters of [`LineSearchDescent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSearchOptions {
    /// Initial step size tried along the negative gradient.
    pub lr: f64,
    /// Factor applied to the step size after a rejected trial.
    pub shrink: f64,
    /// Sufficient-decrease constant of the Armijo condition.
    pub c1: f64,
    /// Maximum number of trial evaluations per step.
    pub max_evals: usize,
}

impl Default for LineSearchOptions {
    fn default() -> Self {
        LineSearchOptions {
            lr: 1.0,
            shrink: 0.5,
            c1: 1e-4,
            max_evals: 20,
        }
    }
}

impl LineSearchOptions {
    pub fn new(lr: f64) -> Self {
        LineSearchOptions {
            lr,
            ..Self::default()
        }
    }

    pub fn with_shrink(mut self, shrink: f64) -> Self {
        self.shrink = shrink;
        self
    }

    pub fn with_c1(mut self, c1: f64) -> Self {
        self.c1 = c1;
        self
    }

    pub fn with_max_evals(mut self, max_evals: usize) -> Self {
        self.max_evals = max_evals;
        self
    }

    pub fn validate(&self) -> Result<(), OptimError> {
        if self.lr <= 0.0 {
            return Err(OptimError::InvalidArgument(format!("Invalid learning rate: {}", self.lr)));
        }
        if self.shrink <= 0.0 || self.shrink >= 1.0 {
            return Err(OptimError::InvalidArgument(format!(
                "shrink must lie in (0, 1), got {}",
                self.shrink
            )));
        }
        if self.c1 <= 0.0 || self.c1 >= 1.0 {
            return Err(OptimError::InvalidArgument(format!("c1 must lie in (0, 1), got {}", self.c1)));
        }
        if self.max_evals == 0 {
            return Err(OptimError::invalid("max_evals must be at least 1"));
        }
        Ok(())
    }
}

impl OptimizerOptions for LineSearchOptions {
    fn lr(&self) -> f64 {
        self.lr
    }

    fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }
}

/// Steepest descent with backtracking (Armijo) line search.
///
/// Each step evaluates the closure once at the current point; that loss and
/// the gradients it leaves behind are what the step is based on, and that
/// loss is what `step` returns. Trial points `p - t * grad` are then
/// evaluated with `t = lr, lr * shrink, ...` until
/// `f(trial) <= f(p) - c1 * t * |grad|^2`. If no trial is accepted within
/// `max_evals` evaluations the parameters are restored.
///
/// Supports a single parameter group, since the line search acts on all
/// parameters at once.
#[derive(Debug)]
pub struct LineSearchDescent {
    base: OptimizerBase<LineSearchOptions, ()>,
    func_evals: u64,
    n_iter: u64,
}

impl LineSearchDescent {
    pub fn new(params: Vec<Tensor>, options: LineSearchOptions) -> Result<Self, OptimError> {
        options.validate()?;
        Ok(LineSearchDescent {
            base: OptimizerBase::new(params, options)?,
            func_evals: 0,
            n_iter: 0,
        })
    }

    /// Total number of closure evaluations so far.
    pub fn func_evals(&self) -> u64 {
        self.func_evals
    }

    /// Number of completed steps.
    pub fn n_iter(&self) -> u64 {
        self.n_iter
    }

    fn evaluate(&mut self, closure: &mut LossClosure<'_>) -> Result<(Tensor, f64), OptimError> {
        let loss = closure()?;
        self.func_evals += 1;
        let value = loss.item()?;
        Ok((loss, value))
    }
}

impl OptimizerCore for LineSearchDescent {
    type Options = LineSearchOptions;
    type State = ();
    type StepKind = ClosureStep;

    fn base(&self) -> &OptimizerBase<LineSearchOptions, ()> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OptimizerBase<LineSearchOptions, ()> {
        &mut self.base
    }

    fn add_param_group(&mut self, _param_group: ParamGroup<LineSearchOptions>) -> Result<(), OptimError> {
        Err(OptimError::invalid(
            "LineSearchDescent doesn't support more than one parameter group",
        ))
    }

    fn save(&self, archive: &mut OutputArchive) -> Result<(), OptimError> {
        self.base.save_param_groups(archive, "line_search")?;
        archive.write("line_search.func_evals", &self.func_evals)?;
        archive.write("line_search.n_iter", &self.n_iter)?;
        Ok(())
    }

    fn load(&mut self, archive: &InputArchive) -> Result<(), OptimError> {
        let func_evals = archive.read("line_search.func_evals")?;
        let n_iter = archive.read("line_search.n_iter")?;
        self.base.load_param_groups(archive, "line_search", LineSearchOptions::validate)?;
        self.func_evals = func_evals;
        self.n_iter = n_iter;
        Ok(())
    }
}

impl LossClosureOptimizer for LineSearchDescent {
    fn step(&mut self, closure: &mut LossClosure<'_>) -> Result<Tensor, OptimError> {
        let (loss, f0) = self.evaluate(closure)?;
        let options = self.base.options_for(0)?.clone();

        // Origins and search directions of the parameters that have a gradient.
        let mut origins = Vec::new();
        let mut grad_norm_sq = 0.0;
        for param in self.base.parameters() {
            if let Some(grad) = param.grad() {
                let grad = grad.detach();
                grad_norm_sq += grad.dot(&grad)?;
                origins.push((param.clone(), param.detach(), grad));
            }
        }
        self.n_iter += 1;
        if origins.is_empty() || grad_norm_sq == 0.0 {
            log::debug!("LineSearchDescent: zero gradient at loss {}, nothing to do", f0);
            return Ok(loss);
        }

        let mut t = options.lr;
        for eval in 0..options.max_evals {
            for (param, origin, grad) in &origins {
                param.copy_(origin)?;
                param.add_scaled_(grad, -t)?;
            }
            let (_, trial) = self.evaluate(closure)?;
            if trial <= f0 - options.c1 * t * grad_norm_sq {
                log::debug!(
                    "LineSearchDescent: accepted step size {} after {} trials ({} -> {})",
                    t,
                    eval + 1,
                    f0,
                    trial
                );
                return Ok(loss);
            }
            t *= options.shrink;
        }

        log::debug!(
            "LineSearchDescent: no step size accepted in {} trials, restoring parameters",
            options.max_evals
        );
        for (param, origin, _) in &origins {
            param.copy_(origin)?;
        }
        Ok(loss)
    }
}
