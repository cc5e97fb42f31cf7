//! Pull-based execution operator framework.
//!
//! Trees of operators are built from a depth-first serialized plan, then
//! driven through Prepare, Open, repeated GetNext, and Close from the root.

pub mod arrays;
pub mod config;
pub mod execution;
pub mod explain;
pub mod expr;
pub mod plan;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testutil;
