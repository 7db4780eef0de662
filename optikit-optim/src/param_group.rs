use optikit_core::Tensor;

use crate::options::OptimizerOptions;
use crate::optimizer_state::ParamId;

/// An ordered set of parameters sharing one options record.
///
/// A group built without options receives a copy of the optimizer defaults
/// when it is registered.
#[derive(Clone, Debug)]
pub struct ParamGroup<O> {
    params: Vec<Tensor>,
    options: Option<O>,
    /// Id of `params[0]`; assigned on registration.
    first_id: usize,
}

impl<O: OptimizerOptions> ParamGroup<O> {
    /// Creates a group that will take the optimizer defaults.
    pub fn new(params: Vec<Tensor>) -> Self {
        ParamGroup {
            params,
            options: None,
            first_id: 0,
        }
    }

    /// Creates a group with its own options, overriding the defaults.
    pub fn with_options(params: Vec<Tensor>, options: O) -> Self {
        ParamGroup {
            params,
            options: Some(options),
            first_id: 0,
        }
    }

    /// Parameters of the group, in registration order.
    pub fn params(&self) -> &[Tensor] {
        &self.params
    }

    /// Number of parameters in the group.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn has_options(&self) -> bool {
        self.options.is_some()
    }

    /// The group's own options.
    ///
    /// # Returns
    ///
    /// `None` only for the implicit group of an optimizer built from bare
    /// parameters, which follows the defaults.
    pub fn options(&self) -> Option<&O> {
        self.options.as_ref()
    }

    pub fn options_mut(&mut self) -> Option<&mut O> {
        self.options.as_mut()
    }

    pub fn set_options(&mut self, options: O) {
        self.options = Some(options);
    }

    pub fn lr(&self) -> Option<f64> {
        self.options.as_ref().map(OptimizerOptions::lr)
    }

    /// Sets the learning rate of this group. No-op on a group without options.
    pub fn set_lr(&mut self, lr: f64) {
        if let Some(options) = self.options.as_mut() {
            options.set_lr(lr);
        }
    }

    /// Parameters paired with their registration ids.
    pub fn entries(&self) -> impl Iterator<Item = (ParamId, &Tensor)> + '_ {
        let first = self.first_id;
        self.params
            .iter()
            .enumerate()
            .map(move |(offset, p)| (ParamId::new(first + offset), p))
    }

    pub(crate) fn set_first_id(&mut self, first_id: usize) {
        self.first_id = first_id;
    }

    pub(crate) fn push_params(&mut self, params: Vec<Tensor>) {
        self.params.extend(params);
    }
}
