use num_traits::Zero;
use optikit_core::tensor::zeros_like;
use optikit_core::Tensor;

use crate::error::OptimError;

/// Per-parameter auxiliary values indexed by parameter position.
///
/// Slots are created lazily: reading slot `i` materializes every missing slot
/// up to and including `i`.
#[derive(Debug, Clone, Default)]
pub struct BufferTable<T> {
    slots: Vec<T>,
}

impl<T> BufferTable<T> {
    pub fn new() -> Self {
        BufferTable { slots: Vec::new() }
    }

    pub fn from_slots(slots: Vec<T>) -> Self {
        BufferTable { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reads a slot without materializing it.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[T] {
        &self.slots
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl<T: Zero + Clone> BufferTable<T> {
    /// Returns slot `index`, growing the table with zeros if needed.
    pub fn at(&mut self, index: usize) -> &mut T {
        if self.slots.len() <= index {
            log::debug!("Growing buffer table from {} to {} slots", self.slots.len(), index + 1);
            self.slots.resize(index + 1, T::zero());
        }
        &mut self.slots[index]
    }
}

impl BufferTable<Tensor> {
    /// Returns tensor slot `index`, kept on the device and dtype of
    /// `params[index]`.
    ///
    /// Missing slots up to `index` are allocated as `zeros_like` their
    /// parameter. A slot whose placement drifted from its parameter is
    /// replaced by a converted copy, values preserved.
    pub fn at_like(&mut self, index: usize, params: &[Tensor]) -> Result<&mut Tensor, OptimError> {
        let parameter = params.get(index).ok_or(OptimError::OutOfRange {
            index,
            len: params.len(),
        })?;
        if self.slots.len() <= index {
            log::debug!(
                "Materializing tensor buffers {}..={} like their parameters",
                self.slots.len(),
                index
            );
            for p in &params[self.slots.len()..=index] {
                self.slots.push(zeros_like(p)?);
            }
        }
        let slot = &mut self.slots[index];
        if !slot.same_placement(parameter) {
            log::debug!(
                "Re-synchronizing buffer {} from {}/{} to {}/{}",
                index,
                slot.device(),
                slot.dtype(),
                parameter.device(),
                parameter.dtype()
            );
            *slot = slot.to(parameter.device(), parameter.dtype())?;
        }
        Ok(slot)
    }
}
