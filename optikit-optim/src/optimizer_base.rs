use std::collections::HashSet;

use optikit_core::{Tensor, TensorId};

use crate::buffer_table::BufferTable;
use crate::error::OptimError;
use crate::options::OptimizerOptions;
use crate::optimizer_state::{ParamId, ParamState, StateMap};
use crate::param_group::ParamGroup;
use crate::serialize::{InputArchive, OutputArchive};

const NON_LEAF_MESSAGE: &str = "can't optimize a non-leaf parameter";
const DUPLICATE_MESSAGE: &str = "some parameters appear in more than one parameter group";

/// Registry of the parameters an optimizer is responsible for, their
/// groups, the defaults, and the per-parameter state.
///
/// Groups are the only representation of registered parameters.
/// `parameters()` is the flattened view in registration order, and the
/// position of a parameter in it is its [`ParamId`].
///
/// Parameters are held by handle; the optimizer never owns or frees the
/// underlying tensors.
#[derive(Debug)]
pub struct OptimizerBase<O, S> {
    parameters: Vec<Tensor>,
    defaults: Option<O>,
    param_groups: Vec<ParamGroup<O>>,
    state: StateMap<S>,
    /// Built from bare parameters: `param_groups[0]` is the implicit group
    /// fed by `add_parameters`.
    implicit_group: bool,
}

/// Disjoint borrows of an optimizer's groups, defaults and state, for use
/// inside step loops.
pub struct StepParts<'a, O, S> {
    pub param_groups: &'a [ParamGroup<O>],
    pub defaults: Option<&'a O>,
    pub state: &'a mut StateMap<S>,
}

impl<'a, O: OptimizerOptions, S> StepParts<'a, O, S> {
    /// Options in effect for `group`: its own, or the defaults.
    pub fn options_of(&self, group: &'a ParamGroup<O>) -> Result<&'a O, OptimError> {
        group.options().or(self.defaults).ok_or_else(missing_options)
    }
}

fn missing_options() -> OptimError {
    OptimError::invalid("parameter group has no options and the optimizer has no defaults")
}

impl<O: OptimizerOptions, S: ParamState> OptimizerBase<O, S> {
    /// Registers `parameters` as one implicit group without options.
    ///
    /// Defaults must be set with [`set_defaults`](Self::set_defaults) before
    /// groups without options can be added.
    pub fn from_parameters(parameters: Vec<Tensor>) -> Result<Self, OptimError> {
        let mut base = Self::empty(None);
        base.validate_new(&parameters)?;
        let mut group = ParamGroup::new(Vec::new());
        group.set_first_id(0);
        group.push_params(parameters.clone());
        base.parameters = parameters;
        base.param_groups.push(group);
        base.implicit_group = true;
        log::debug!(
            "OptimizerBase created from {} bare parameters",
            base.parameters.len()
        );
        Ok(base)
    }

    /// Stores `defaults`, then registers each group in order.
    pub fn with_groups(param_groups: Vec<ParamGroup<O>>, defaults: O) -> Result<Self, OptimError> {
        let mut base = Self::empty(Some(defaults));
        for group in param_groups {
            base.add_param_group(group)?;
        }
        Ok(base)
    }

    /// Registers `parameters` as a single group taking `defaults`.
    pub fn new(parameters: Vec<Tensor>, defaults: O) -> Result<Self, OptimError> {
        Self::with_groups(vec![ParamGroup::new(parameters)], defaults)
    }

    fn empty(defaults: Option<O>) -> Self {
        OptimizerBase {
            parameters: Vec::new(),
            defaults,
            param_groups: Vec::new(),
            state: StateMap::new(),
            implicit_group: false,
        }
    }

    /// Checks that every candidate is a leaf and is not registered yet
    /// (nor listed twice among the candidates).
    fn validate_new(&self, candidates: &[Tensor]) -> Result<(), OptimError> {
        let mut seen: HashSet<TensorId> = self.parameters.iter().map(Tensor::id).collect();
        for param in candidates {
            if !param.is_leaf() {
                return Err(OptimError::invalid(NON_LEAF_MESSAGE));
            }
            if !seen.insert(param.id()) {
                return Err(OptimError::invalid(DUPLICATE_MESSAGE));
            }
        }
        Ok(())
    }

    /// Adds a parameter group.
    ///
    /// A group without options receives a copy of the current defaults; a
    /// later change of the defaults does not reach it. On error nothing is
    /// registered.
    pub fn add_param_group(&mut self, mut param_group: ParamGroup<O>) -> Result<(), OptimError> {
        self.validate_new(param_group.params())?;
        if !param_group.has_options() {
            let defaults = self.defaults.clone().ok_or_else(missing_options)?;
            param_group.set_options(defaults);
        }
        param_group.set_first_id(self.parameters.len());
        self.parameters.extend(param_group.params().iter().cloned());
        log::debug!(
            "Added parameter group #{} with {} parameters, options {:?}",
            self.param_groups.len(),
            param_group.len(),
            param_group.options()
        );
        self.param_groups.push(param_group);
        Ok(())
    }

    /// Appends parameters to the implicit group of an optimizer built with
    /// [`from_parameters`](Self::from_parameters).
    ///
    /// Fails once explicit groups exist: ids of the implicit group must stay
    /// contiguous, and mixing both registration styles is not supported.
    pub fn add_parameters(&mut self, parameters: Vec<Tensor>) -> Result<(), OptimError> {
        if !self.implicit_group || self.param_groups.len() != 1 {
            return Err(OptimError::invalid(
                "add_parameters is only available on an optimizer built from bare parameters without explicit groups",
            ));
        }
        self.validate_new(&parameters)?;
        self.parameters.extend(parameters.iter().cloned());
        self.param_groups[0].push_params(parameters);
        Ok(())
    }

    /// Clears the gradient of every registered parameter.
    ///
    /// Each existing gradient is detached from its history and zeroed in
    /// place; its storage is reused. Parameters without a gradient are
    /// skipped.
    pub fn zero_grad(&mut self) {
        for param in &self.parameters {
            if let Some(grad) = param.grad() {
                grad.detach_();
                grad.zero_();
            }
        }
    }

    /// All registered parameters, in registration order.
    pub fn parameters(&self) -> &[Tensor] {
        &self.parameters
    }

    /// Number of registered parameters.
    pub fn size(&self) -> usize {
        self.parameters.len()
    }

    /// Looks up a registered parameter by id.
    ///
    /// # Returns
    ///
    /// The parameter, or `OutOfRange` if `id` was never assigned by this
    /// optimizer.
    pub fn parameter(&self, id: ParamId) -> Result<&Tensor, OptimError> {
        self.parameters.get(id.index()).ok_or(OptimError::OutOfRange {
            index: id.index(),
            len: self.parameters.len(),
        })
    }

    /// Id of a registered parameter, looked up by handle identity.
    pub fn param_id(&self, param: &Tensor) -> Option<ParamId> {
        self.parameters
            .iter()
            .position(|p| Tensor::ptr_eq(p, param))
            .map(ParamId::new)
    }

    /// Options applied to groups registered without their own.
    pub fn defaults(&self) -> Option<&O> {
        self.defaults.as_ref()
    }

    /// Replaces the defaults. Groups registered earlier keep their copy.
    pub fn set_defaults(&mut self, defaults: O) {
        self.defaults = Some(defaults);
    }

    /// Registered groups, in registration order.
    ///
    /// Membership is read-only: groups only change through
    /// [`add_param_group`](Self::add_param_group) and
    /// [`add_parameters`](Self::add_parameters).
    pub fn param_groups(&self) -> &[ParamGroup<O>] {
        &self.param_groups
    }

    fn group_index_checked(&self, group_index: usize) -> Result<(), OptimError> {
        if group_index >= self.param_groups.len() {
            return Err(OptimError::OutOfRange {
                index: group_index,
                len: self.param_groups.len(),
            });
        }
        Ok(())
    }

    /// Options in effect for group `group_index`: its own, or the defaults.
    pub fn options_for(&self, group_index: usize) -> Result<&O, OptimError> {
        self.group_index_checked(group_index)?;
        self.param_groups[group_index]
            .options()
            .or(self.defaults.as_ref())
            .ok_or_else(missing_options)
    }

    /// Mutable options of group `group_index`.
    ///
    /// A group still relying on the defaults (the implicit group of
    /// [`from_parameters`](Self::from_parameters)) first receives a copy of
    /// them, so the change stays local to the group.
    ///
    /// # Arguments
    ///
    /// * `group_index` - Position of the group in [`param_groups`](Self::param_groups).
    ///
    /// # Returns
    ///
    /// `OutOfRange` for an unknown group, `InvalidArgument` if the group has
    /// no options and there are no defaults to copy.
    pub fn options_mut(&mut self, group_index: usize) -> Result<&mut O, OptimError> {
        self.group_index_checked(group_index)?;
        if !self.param_groups[group_index].has_options() {
            let defaults = self.defaults.clone().ok_or_else(missing_options)?;
            self.param_groups[group_index].set_options(defaults);
        }
        self.param_groups[group_index]
            .options_mut()
            .ok_or_else(missing_options)
    }

    /// Sets the learning rate of group `group_index`. See [`options_mut`](Self::options_mut).
    pub fn set_lr(&mut self, group_index: usize, lr: f64) -> Result<(), OptimError> {
        self.options_mut(group_index)?.set_lr(lr);
        Ok(())
    }

    /// Per-parameter state, keyed by registration id.
    pub fn state(&self) -> &StateMap<S> {
        &self.state
    }

    /// Mutable per-parameter state. Entries are created lazily by `step`.
    pub fn state_mut(&mut self) -> &mut StateMap<S> {
        &mut self.state
    }

    /// Borrows groups and defaults immutably and the state map mutably at
    /// the same time, for the body of a step.
    ///
    /// # Returns
    ///
    /// A [`StepParts`] view living as long as the `&mut self` borrow.
    pub fn step_parts(&mut self) -> StepParts<'_, O, S> {
        StepParts {
            param_groups: &self.param_groups,
            defaults: self.defaults.as_ref(),
            state: &mut self.state,
        }
    }

    /// Tensor buffer of parameter `index`, kept on that parameter's device
    /// and dtype. See [`BufferTable::at_like`].
    pub fn buffer_at<'t>(
        &self,
        buffers: &'t mut BufferTable<Tensor>,
        index: usize,
    ) -> Result<&'t mut Tensor, OptimError> {
        buffers.at_like(index, &self.parameters)
    }

    /// Writes the defaults, the options of every group and the group sizes
    /// under `prefix`.
    pub fn save_param_groups(&self, archive: &mut OutputArchive, prefix: &str) -> Result<(), OptimError> {
        let options: Vec<Option<O>> = self.param_groups.iter().map(|g| g.options().cloned()).collect();
        let sizes: Vec<usize> = self.param_groups.iter().map(ParamGroup::len).collect();
        archive.write(&format!("{}.defaults", prefix), &self.defaults)?;
        archive.write(&format!("{}.param_groups.options", prefix), &options)?;
        archive.write(&format!("{}.param_groups.sizes", prefix), &sizes)?;
        Ok(())
    }

    /// Restores what [`save_param_groups`](Self::save_param_groups) wrote.
    ///
    /// The archive must describe the same group layout as this optimizer.
    /// Every restored options record (defaults included) is passed to
    /// `validate` before anything is changed; on error the optimizer is left
    /// as it was.
    ///
    /// # Arguments
    ///
    /// * `archive` - Archive written by `save_param_groups`.
    /// * `prefix` - Key prefix used when saving.
    /// * `validate` - Hyperparameter check of the concrete algorithm.
    pub fn load_param_groups(
        &mut self,
        archive: &InputArchive,
        prefix: &str,
        validate: impl Fn(&O) -> Result<(), OptimError>,
    ) -> Result<(), OptimError> {
        let sizes: Vec<usize> = archive.read(&format!("{}.param_groups.sizes", prefix))?;
        let current: Vec<usize> = self.param_groups.iter().map(ParamGroup::len).collect();
        if sizes != current {
            return Err(OptimError::InvalidArgument(format!(
                "archive describes parameter groups of sizes {:?}, optimizer has {:?}",
                sizes, current
            )));
        }
        let options: Vec<Option<O>> = archive.read(&format!("{}.param_groups.options", prefix))?;
        if options.len() != self.param_groups.len() {
            return Err(OptimError::InvalidArgument(format!(
                "archive holds options for {} groups, optimizer has {}",
                options.len(),
                self.param_groups.len()
            )));
        }
        let defaults: Option<O> = archive.read(&format!("{}.defaults", prefix))?;
        for restored in options.iter().chain(std::iter::once(&defaults)).flatten() {
            validate(restored)?;
        }

        for (group, group_options) in self.param_groups.iter_mut().zip(options) {
            if let Some(o) = group_options {
                group.set_options(o);
            }
        }
        self.defaults = defaults;
        Ok(())
    }

    /// Checks that a restored tensor buffer fits parameter `id`.
    ///
    /// Only the shape is compared; device and dtype are re-synchronized on
    /// access.
    pub fn check_buffer_shape(&self, id: ParamId, buffer: &Tensor, what: &str) -> Result<(), OptimError> {
        let param = self.parameter(id)?;
        if buffer.shape() != param.shape() {
            return Err(OptimError::InvalidArgument(format!(
                "restored {} for {} has shape {:?}, parameter has shape {:?}",
                what,
                id,
                buffer.shape(),
                param.shape()
            )));
        }
        Ok(())
    }
}
