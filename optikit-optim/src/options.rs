use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Hyperparameter record of an algorithm.
///
/// One instance serves as the optimizer-wide defaults; each parameter group
/// may carry its own. Records are copied by value into groups, so they must
/// be `Clone`, and they are written to archives, so they must be serde types.
pub trait OptimizerOptions: Clone + Debug + PartialEq + Serialize + DeserializeOwned {
    /// Learning rate (step size).
    fn lr(&self) -> f64;

    fn set_lr(&mut self, lr: f64);
}
