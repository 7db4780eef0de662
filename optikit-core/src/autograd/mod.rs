//! Minimal reverse-mode differentiation: backward nodes and graph traversal.

pub mod backward_op;
pub mod graph;

pub use backward_op::BackwardOp;
