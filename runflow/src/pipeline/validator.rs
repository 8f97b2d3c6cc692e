//! Dependency graph validation for proposed pipelines.
//!
//! Dependencies reference other stages by their `order` value and may only
//! point strictly backward, so any accepted stage list is a DAG whose
//! topological order is the ascending `order` itself.

use std::collections::HashSet;

use crate::errors::PipelineValidationError;
use crate::models::{PipelineDefinition, StageDefinition};

/// Longest accepted pipeline or stage name.
pub const MAX_NAME_LEN: usize = 255;

/// Validates the shape of a whole definition, then its stage graph.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_definition(def: &PipelineDefinition) -> Result<(), PipelineValidationError> {
    if def.name.trim().is_empty() {
        return Err(PipelineValidationError::new("Pipeline name cannot be empty"));
    }
    if def.name.len() > MAX_NAME_LEN {
        return Err(PipelineValidationError::new(format!(
            "Pipeline name is too long (max {MAX_NAME_LEN} characters)"
        )));
    }
    if def.stages.is_empty() {
        return Err(PipelineValidationError::new(
            "Pipeline must have at least one stage",
        ));
    }
    for stage in &def.stages {
        if stage.name.trim().is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Stage at order {} must have a name",
                stage.order
            )));
        }
        if stage.name.len() > MAX_NAME_LEN {
            return Err(PipelineValidationError::new(format!(
                "Stage name is too long (max {MAX_NAME_LEN} characters)"
            ))
            .with_stage(stage.name.clone()));
        }
    }

    validate_stages(&def.stages)
}

/// Validates a proposed stage list.
///
/// Checks run in this order and stop at the first violation:
/// 1. orders are pairwise distinct;
/// 2. every dependency parses as an integer, names an existing order, and
///    is strictly less than the dependent's own order;
/// 3. custom stages carry a non-empty custom name.
///
/// # Errors
///
/// Returns a [`PipelineValidationError`] describing the violation.
pub fn validate_stages(stages: &[StageDefinition]) -> Result<(), PipelineValidationError> {
    let orders: HashSet<u32> = stages.iter().map(|s| s.order).collect();

    if orders.len() != stages.len() {
        return Err(PipelineValidationError::new(
            "Duplicate stage orders found. Each stage must have a unique order.",
        ));
    }

    for stage in stages {
        for dep in &stage.dependencies {
            let parsed = parse_dependency(dep).ok_or_else(|| {
                PipelineValidationError::new(format!(
                    "Stage {} has invalid dependency format: {dep}",
                    stage.name
                ))
                .with_stage(stage.name.clone())
            })?;

            let dep_order = match parsed {
                DependencyRef::Order(order) if orders.contains(&order) => order,
                _ => {
                    return Err(PipelineValidationError::new(format!(
                        "Stage {} depends on non-existent stage order {dep}",
                        stage.name
                    ))
                    .with_stage(stage.name.clone()));
                }
            };

            if dep_order >= stage.order {
                return Err(PipelineValidationError::new(format!(
                    "Stage {} cannot depend on later stage {dep}",
                    stage.name
                ))
                .with_stage(stage.name.clone()));
            }
        }
    }

    for stage in stages {
        let has_custom_name = stage
            .custom_name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        if stage.stage_type.is_custom() && !has_custom_name {
            return Err(PipelineValidationError::new(format!(
                "Stage {} with type CUSTOM must have a custom_name",
                stage.name
            ))
            .with_stage(stage.name.clone()));
        }
    }

    Ok(())
}

/// A dependency reference that is well-formed as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyRef {
    /// An integer that could name a stage order.
    Order(u32),
    /// An integer no stage order can take (negative or too large).
    OutOfRange,
}

/// Parses a dependency reference.
///
/// Accepts surrounding whitespace, an optional sign and single `_`
/// separators between digits. Returns `None` when the text is not an
/// integer at all.
#[must_use]
pub fn parse_dependency(dep: &str) -> Option<DependencyRef> {
    let text = dep.trim();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let well_formed = !digits.is_empty()
        && !digits.starts_with('_')
        && !digits.ends_with('_')
        && !digits.contains("__")
        && digits.chars().all(|c| c.is_ascii_digit() || c == '_');
    if !well_formed {
        return None;
    }

    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    let magnitude = cleaned.trim_start_matches('0');
    if magnitude.is_empty() {
        return Some(DependencyRef::Order(0));
    }
    if negative {
        return Some(DependencyRef::OutOfRange);
    }
    Some(
        magnitude
            .parse::<u32>()
            .map_or(DependencyRef::OutOfRange, DependencyRef::Order),
    )
}
