//! Configuration validation
//!
//! Rules:
//! - producer settings within their ranges
//! - project names non-empty and unique
//! - file clients carry a `path` parameter

use std::collections::HashSet;

use contracts::{ClientType, ContractError, ProducerBlueprint};
use validator::Validate;

/// Validate a ProducerBlueprint
///
/// Returns the first error encountered.
pub fn validate(blueprint: &ProducerBlueprint) -> Result<(), ContractError> {
    validate_producer(blueprint)?;
    validate_project_names(blueprint)?;
    validate_client_params(blueprint)?;
    Ok(())
}

fn validate_producer(blueprint: &ProducerBlueprint) -> Result<(), ContractError> {
    let Err(errors) = blueprint.producer.validate() else {
        return Ok(());
    };

    // Report fields in a stable order
    let mut field_errors: Vec<_> = errors.field_errors().into_iter().collect();
    field_errors.sort_by(|a, b| a.0.cmp(&b.0));

    let (field, errs) = field_errors
        .into_iter()
        .next()
        .ok_or_else(|| ContractError::config_validation("producer", errors.to_string()))?;
    let message = errs
        .first()
        .and_then(|e| e.message.as_ref())
        .map(|m| m.to_string())
        .unwrap_or_else(|| format!("invalid value for {field}"));

    Err(ContractError::config_validation(
        format!("producer.{field}"),
        message,
    ))
}

fn validate_project_names(blueprint: &ProducerBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, project) in blueprint.projects.iter().enumerate() {
        if project.project.is_empty() {
            return Err(ContractError::config_validation(
                format!("projects[{idx}].project"),
                "project name cannot be empty",
            ));
        }
        if !seen.insert(&project.project) {
            return Err(ContractError::config_validation(
                format!("projects[project={}]", project.project),
                "duplicate project",
            ));
        }
    }
    Ok(())
}

fn validate_client_params(blueprint: &ProducerBlueprint) -> Result<(), ContractError> {
    for project in &blueprint.projects {
        if project.client_type == ClientType::File
            && project.params.get("path").is_none_or(|p| p.is_empty())
        {
            return Err(ContractError::config_validation(
                format!("projects[{}].params.path", project.project),
                "file client requires a 'path' param",
            ));
        }
    }
    Ok(())
}
