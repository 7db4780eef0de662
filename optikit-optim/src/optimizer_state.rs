use std::collections::HashMap;
use std::fmt::{self, Debug};

use serde::{Deserialize, Serialize};

/// Opaque identity of a registered parameter.
///
/// Assigned at registration, in registration order, and never reused: the
/// id of a parameter stays valid as more parameters are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamId(usize);

impl ParamId {
    pub(crate) fn new(index: usize) -> Self {
        ParamId(index)
    }

    /// Position of the parameter in `OptimizerBase::parameters()`.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "param#{}", self.0)
    }
}

/// Algorithm-specific bookkeeping kept for one parameter (momentum, running
/// averages, step counters, ...).
pub trait ParamState: Clone + Debug {}

/// For algorithms that keep no per-parameter state blob.
impl ParamState for () {}

/// Per-parameter state, populated lazily by the algorithm on first step.
pub type StateMap<S> = HashMap<ParamId, S>;
