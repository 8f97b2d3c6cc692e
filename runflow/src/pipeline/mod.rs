//! Pipeline definition checks.
//!
//! This module provides:
//! - Request-shape and dependency validation
//! - The stage dependency graph used by the coordinator

mod dag;
mod validator;

pub use dag::StageGraph;
pub use validator::{
    parse_dependency, validate_definition, validate_stages, DependencyRef, MAX_NAME_LEN,
};
