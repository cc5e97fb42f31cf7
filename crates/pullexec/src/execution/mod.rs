//! Execution trees and the pull-based lifecycle that drives them.

pub mod builder;
pub mod context;
pub mod executor;
pub mod node;
pub mod operators;
pub mod sink;
pub mod tree;
