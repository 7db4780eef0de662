//! Parameter, group and state management shared by gradient-based
//! optimizers.
//!
//! `OptimizerBase` tracks the parameters an optimizer is responsible for,
//! organizes them into groups carrying their own options, and holds the
//! lazily-created per-parameter state. Concrete algorithms build on it and
//! implement exactly one of the two step contracts:
//! [`Optimizer`] (no-argument step) or [`LossClosureOptimizer`] (step that
//! re-evaluates the loss through a closure).

pub mod adagrad;
pub mod buffer_table;
pub mod error;
pub mod line_search;
pub mod optimizer_base;
pub mod optimizer_state;
pub mod optimizer_trait;
pub mod options;
pub mod param_group;
pub mod serialize;
pub mod sgd;

pub use adagrad::{Adagrad, AdagradOptions};
pub use buffer_table::BufferTable;
pub use error::OptimError;
pub use line_search::{LineSearchDescent, LineSearchOptions};
pub use optimizer_base::{OptimizerBase, StepParts};
pub use optimizer_state::{ParamId, ParamState, StateMap};
pub use optimizer_trait::{
    ClosureStep, LossClosure, LossClosureOptimizer, NoArgStep, Optimizer, OptimizerCore, StepKind,
};
pub use options::OptimizerOptions;
pub use param_group::ParamGroup;
pub use serialize::{load_optimizer, save_optimizer, InputArchive, OutputArchive};
pub use sgd::{Sgd, SgdOptions, SgdParamState};

#[cfg(test)]
mod optimizer_base_test;
