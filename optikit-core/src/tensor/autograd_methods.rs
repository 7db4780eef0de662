use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::autograd::graph::topological_sort;
use crate::autograd::BackwardOp;
use crate::buffer::Buffer;
use crate::error::OptikitError;
use crate::tensor::{Tensor, TensorId};
use crate::tensor_data::TensorData;

impl Tensor {
    /// Checks if this tensor requires gradient computation.
    pub fn requires_grad(&self) -> bool {
        self.read_data().requires_grad
    }

    /// Sets the `requires_grad` flag for this tensor.
    pub fn set_requires_grad(&self, requires_grad: bool) -> Result<(), OptikitError> {
        let mut guard = self.write_data();
        if requires_grad && guard.grad_fn.is_some() {
            log::warn!(
                "Setting requires_grad=true on a non-leaf tensor. Gradients will not accumulate here during backward()."
            );
        }
        guard.requires_grad = requires_grad;
        Ok(())
    }

    /// A tensor is a leaf when no recorded operation produced it.
    pub fn is_leaf(&self) -> bool {
        self.read_data().is_leaf()
    }

    /// Returns a handle to the gradient tensor, if any.
    ///
    /// The handle aliases the stored gradient: in-place changes through it
    /// are visible to the owner.
    pub fn grad(&self) -> Option<Tensor> {
        self.read_data().grad.clone()
    }

    /// Replaces the gradient. `None` clears it.
    pub fn set_grad(&self, grad: Option<Tensor>) -> Result<(), OptikitError> {
        if let Some(g) = grad.as_ref() {
            self.check_compatible(g, "set_grad")?;
        }
        self.write_data().grad = grad;
        Ok(())
    }

    /// Accumulates `grad_to_add` into the stored gradient.
    ///
    /// An existing gradient is updated in place, keeping its storage; a
    /// missing one is initialized with a copy of `grad_to_add`.
    pub fn acc_grad(&self, grad_to_add: Tensor) -> Result<(), OptikitError> {
        self.check_compatible(&grad_to_add, "acc_grad")?;
        let existing = self.grad();
        match existing {
            Some(existing_grad) => existing_grad.add_(&grad_to_add),
            None => {
                self.write_data().grad = Some(grad_to_add.detach());
                Ok(())
            }
        }
    }

    /// Returns the backward node that produced this tensor.
    pub fn grad_fn(&self) -> Option<Arc<dyn BackwardOp>> {
        self.read_data().grad_fn.clone()
    }

    pub(crate) fn set_grad_fn(&self, grad_fn: Option<Arc<dyn BackwardOp>>) {
        self.write_data().grad_fn = grad_fn;
    }

    /// Returns a new leaf tensor holding a copy of this tensor's values.
    pub fn detach(&self) -> Tensor {
        let guard = self.read_data();
        Tensor::from_data(TensorData {
            buffer: guard.buffer.clone(),
            device: guard.device,
            shape: guard.shape.clone(),
            requires_grad: false,
            grad: None,
            grad_fn: None,
        })
    }

    /// Cuts this tensor from its computation history in place.
    ///
    /// The storage is untouched; the tensor becomes a leaf that does not
    /// require gradients.
    pub fn detach_(&self) {
        let mut guard = self.write_data();
        guard.grad_fn = None;
        guard.requires_grad = false;
    }

    /// Performs the backward pass from a scalar tensor.
    pub fn backward(&self) -> Result<(), OptikitError> {
        self.backward_with(None)
    }

    /// Performs the backward pass, seeding it with `gradient` (or ones for a
    /// single-element tensor), and accumulates into the `grad` of every leaf
    /// that requires gradients.
    pub fn backward_with(&self, gradient: Option<Tensor>) -> Result<(), OptikitError> {
        if !self.requires_grad() {
            return Ok(());
        }

        let seed = match gradient {
            Some(g) => {
                self.check_compatible(&g, "backward")?;
                g
            }
            None => {
                let guard = self.read_data();
                if guard.numel() != 1 {
                    return Err(OptikitError::BackwardNonScalar);
                }
                Tensor::from_buffer(
                    Buffer::from_f64(guard.dtype(), &[1.0]),
                    guard.shape.clone(),
                    guard.device,
                )?
            }
        };

        let mut grad_map: HashMap<TensorId, Tensor> = HashMap::new();
        grad_map.insert(self.id(), seed);

        for node in topological_sort(self) {
            let Some(accumulated) = grad_map.remove(&node.id()) else {
                continue;
            };
            match node.grad_fn() {
                Some(op) => {
                    let inputs = op.inputs();
                    let input_grads = op.backward(&accumulated)?;
                    if input_grads.len() != inputs.len() {
                        return Err(OptikitError::BackwardError(format!(
                            "{:?} returned {} gradients for {} inputs",
                            op,
                            input_grads.len(),
                            inputs.len()
                        )));
                    }
                    for (input, grad) in inputs.iter().zip(input_grads) {
                        if !input.requires_grad() {
                            continue;
                        }
                        match grad_map.entry(input.id()) {
                            Entry::Occupied(mut slot) => {
                                let sum = slot.get().detach();
                                sum.add_(&grad)?;
                                slot.insert(sum);
                            }
                            Entry::Vacant(slot) => {
                                slot.insert(grad);
                            }
                        }
                    }
                }
                None => node.acc_grad(accumulated)?,
            }
        }
        Ok(())
    }

    /// Checks that `other` could serve as this tensor's gradient.
    pub(crate) fn check_compatible(&self, other: &Tensor, operation: &str) -> Result<(), OptikitError> {
        if Tensor::ptr_eq(self, other) {
            return Ok(());
        }
        let (shape, device, dtype) = {
            let guard = self.read_data();
            (guard.shape.clone(), guard.device, guard.dtype())
        };
        let other_guard = other.read_data();
        if other_guard.device != device {
            return Err(OptikitError::DeviceMismatch {
                expected: device,
                actual: other_guard.device,
                operation: operation.to_string(),
            });
        }
        if other_guard.dtype() != dtype {
            return Err(OptikitError::DataTypeMismatch {
                expected: dtype,
                actual: other_guard.dtype(),
                operation: operation.to_string(),
            });
        }
        if other_guard.shape != shape {
            return Err(OptikitError::ShapeMismatch {
                expected: shape,
                actual: other_guard.shape.clone(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}
