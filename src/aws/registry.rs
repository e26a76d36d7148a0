/// ECR repository declaration
use serde::{Deserialize, Serialize};

use crate::config::Environment;
use crate::error::ContractViolation;

/// What happens to the repository when the stack is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovalPolicy {
    Retain,
    Destroy,
}

/// Parameters for declaring a container registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryParams {
    pub id: String,
    pub repository_name: String,
    pub removal_policy: RemovalPolicy,
    pub image_scan_on_push: bool,
}

/// Declared ECR repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRegistry {
    pub id: String,
    pub repository_name: String,
    pub removal_policy: RemovalPolicy,
    pub image_scan_on_push: bool,
}

impl ContainerRegistry {
    pub fn new(params: RegistryParams) -> Result<Self, ContractViolation> {
        if params.id.is_empty() {
            return Err(ContractViolation::EmptyField {
                field: "registry id",
            });
        }
        validate_repository_name(&params.repository_name)?;

        Ok(Self {
            id: params.id,
            repository_name: params.repository_name,
            removal_policy: params.removal_policy,
            image_scan_on_push: params.image_scan_on_push,
        })
    }

    /// Registry URI images are pushed to
    pub fn repository_uri(&self, env: &Environment) -> String {
        format!(
            "{}.dkr.ecr.{}.amazonaws.com/{}",
            env.account, env.region, self.repository_name
        )
    }
}

/// ECR names are 2-256 chars of lowercase letters, digits, `.`, `_`, `-`, `/`
fn validate_repository_name(name: &str) -> Result<(), ContractViolation> {
    if name.is_empty() {
        return Err(ContractViolation::EmptyField {
            field: "repository name",
        });
    }
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-/".contains(c));
    let starts_alnum = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !valid_chars || !starts_alnum || name.len() < 2 || name.len() > 256 {
        return Err(ContractViolation::InvalidRepositoryName(name.to_string()));
    }
    Ok(())
}
