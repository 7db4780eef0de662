use optikit_core::Tensor;

use crate::error::OptimError;
use crate::optimizer_base::OptimizerBase;
use crate::options::OptimizerOptions;
use crate::optimizer_state::ParamState;
use crate::param_group::ParamGroup;
use crate::serialize::{InputArchive, OutputArchive};

mod sealed {
    pub trait Sealed {}
}

/// Marker naming which step contract an algorithm implements.
///
/// An algorithm picks exactly one through `OptimizerCore::StepKind`, which
/// is what keeps [`Optimizer`] and [`LossClosureOptimizer`] mutually
/// exclusive.
pub trait StepKind: sealed::Sealed {}

/// `step()` takes no arguments and returns nothing.
#[derive(Debug)]
pub enum NoArgStep {}

/// `step(closure)` re-evaluates the loss and returns it.
#[derive(Debug)]
pub enum ClosureStep {}

impl sealed::Sealed for NoArgStep {}
impl sealed::Sealed for ClosureStep {}
impl StepKind for NoArgStep {}
impl StepKind for ClosureStep {}

/// Recomputes the loss and repopulates parameter gradients.
pub type LossClosure<'a> = dyn FnMut() -> Result<Tensor, OptimError> + 'a;

/// What every optimizer shares, whatever its step contract: access to the
/// parameter registry, gradient reset, and the persistence hooks.
pub trait OptimizerCore {
    type Options: OptimizerOptions;
    type State: ParamState;
    type StepKind: StepKind;

    /// Shared registry of parameters, groups and per-parameter state.
    fn base(&self) -> &OptimizerBase<Self::Options, Self::State>;

    fn base_mut(&mut self) -> &mut OptimizerBase<Self::Options, Self::State>;

    /// Clears the gradients of all registered parameters in place.
    fn zero_grad(&mut self) {
        self.base_mut().zero_grad();
    }

    /// All registered parameters, indexed by `ParamId`.
    fn parameters(&self) -> &[Tensor] {
        self.base().parameters()
    }

    /// Number of registered parameters.
    fn size(&self) -> usize {
        self.base().size()
    }

    /// Registered groups, in registration order. Read-only; see
    /// [`options_mut`](OptimizerCore::options_mut) for hyperparameter changes.
    fn param_groups(&self) -> &[ParamGroup<Self::Options>] {
        self.base().param_groups()
    }

    /// Mutable options of one group. Group membership itself is only
    /// changed through [`add_param_group`](OptimizerCore::add_param_group).
    ///
    /// # Arguments
    ///
    /// * `group_index` - Position of the group in `param_groups()`.
    ///
    /// # Returns
    ///
    /// The options record, or `OutOfRange` for an unknown group.
    fn options_mut(&mut self, group_index: usize) -> Result<&mut Self::Options, OptimError> {
        self.base_mut().options_mut(group_index)
    }

    /// Sets the learning rate of one group.
    fn set_lr(&mut self, group_index: usize, lr: f64) -> Result<(), OptimError> {
        self.base_mut().set_lr(group_index, lr)
    }

    /// Registers a new group of parameters.
    ///
    /// # Arguments
    ///
    /// * `param_group` - Group to append. Without options it takes a copy of
    ///   the current defaults.
    ///
    /// # Returns
    ///
    /// `InvalidArgument` if a parameter is not a leaf, is already registered,
    /// or the group's options are rejected by the algorithm. Nothing is
    /// registered in that case.
    fn add_param_group(&mut self, param_group: ParamGroup<Self::Options>) -> Result<(), OptimError> {
        self.base_mut().add_param_group(param_group)
    }

    /// Writes the algorithm's state into `archive`. Nothing by default.
    fn save(&self, _archive: &mut OutputArchive) -> Result<(), OptimError> {
        Ok(())
    }

    /// Restores the algorithm's state from `archive`. Nothing by default.
    fn load(&mut self, _archive: &InputArchive) -> Result<(), OptimError> {
        Ok(())
    }
}

/// Optimizer whose `step()` takes no arguments.
///
/// Gradients must already be populated by a backward pass; `step` never
/// computes them. Its only effect is the in-place update of parameters (and
/// of the algorithm's own state).
pub trait Optimizer: OptimizerCore<StepKind = NoArgStep> {
    /// Applies one update to every parameter that has a gradient.
    ///
    /// # Returns
    ///
    /// `Ok(())`, or the first tensor error met while updating. Parameters
    /// without a gradient are skipped.
    fn step(&mut self) -> Result<(), OptimError>;
}

/// Optimizer that needs the loss function itself, because it may evaluate
/// it several times per step (line searches, conjugate gradient, L-BFGS).
pub trait LossClosureOptimizer: OptimizerCore<StepKind = ClosureStep> {
    /// Performs one update.
    ///
    /// # Arguments
    ///
    /// * `closure` - Recomputes the loss and the gradients. Called at least once.
    ///
    /// # Returns
    ///
    /// The loss the update was based on.
    fn step(&mut self, closure: &mut LossClosure<'_>) -> Result<Tensor, OptimError>;
}
