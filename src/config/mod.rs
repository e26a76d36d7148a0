/// Configuration for the spring-boot-eks stack
///
/// Every value except the target account and region is a fixed constant.
/// There is no configuration file; `StackConfig::new` is the single source.
use serde::{Deserialize, Serialize};

use crate::error::ContractViolation;

/// Environment variable holding the target AWS account
pub const ACCOUNT_ENV: &str = "CDK_DEFAULT_ACCOUNT";

/// Environment variable holding the target AWS region
pub const REGION_ENV: &str = "CDK_DEFAULT_REGION";

/// Image reference resolved by the deploy-time pipeline, not by this tool
pub const IMAGE_PLACEHOLDER: &str = "${ECR_REPOSITORY_URI}:latest";

/// Main stack configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Stack identifier
    pub stack_id: String,

    /// Human readable stack description
    pub description: String,

    /// Target account and region
    pub environment: Environment,

    /// VPC layout
    pub network: NetworkSettings,

    /// ECR repository
    pub registry: RegistrySettings,

    /// EKS cluster and its node group
    pub cluster: ClusterSettings,

    /// Kubernetes application manifests
    pub app: AppSettings,
}

/// Target AWS account and region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

/// VPC configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Construct id of the VPC
    pub id: String,

    /// VPC CIDR (e.g., "10.0.0.0/16")
    pub cidr: String,

    /// Number of availability zones to spread subnets over
    pub max_azs: u32,

    /// Mask size of every subnet
    pub cidr_mask: u8,

    /// NAT gateways for private egress (one per AZ when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nat_gateways: Option<u32>,
}

/// ECR repository configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySettings {
    pub id: String,
    pub repository_name: String,
    /// Delete the repository when the stack is torn down
    pub destroy_on_removal: bool,
    pub image_scan_on_push: bool,
}

/// EKS cluster configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSettings {
    pub id: String,

    /// Cluster name (e.g., "spring-boot-eks")
    pub name: String,

    /// Kubernetes version (e.g., "1.27")
    pub kubernetes_version: String,

    /// Managed node group
    pub node_pool: NodePoolSettings,
}

/// Managed node group configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePoolSettings {
    pub name: String,
    /// EC2 instance type (e.g., "t3.medium")
    pub instance_type: String,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_size: u32,
    #[serde(default)]
    pub spot: bool,
}

/// Spring Boot application manifest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Application name, also the `app` label
    pub name: String,

    /// Kubernetes namespace
    pub namespace: String,

    /// Container image reference
    pub image: String,

    pub replicas: u32,

    pub container_port: u16,

    /// Port exposed by the LoadBalancer service
    pub service_port: u16,

    /// Path served by the application's health endpoint
    pub health_check_path: String,

    /// Spring profile activated in the container
    pub spring_profile: String,
}

impl Environment {
    /// Resolve account and region from explicit values or the environment
    pub fn resolve(account: Option<String>, region: Option<String>) -> anyhow::Result<Self> {
        let account = account
            .or_else(|| std::env::var(ACCOUNT_ENV).ok())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "AWS account not found. Set {} environment variable or pass --account",
                    ACCOUNT_ENV
                )
            })?;
        let region = region
            .or_else(|| std::env::var(REGION_ENV).ok())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "AWS region not found. Set {} environment variable or pass --region",
                    REGION_ENV
                )
            })?;

        Ok(Self { account, region })
    }

    /// Validate account and region
    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.account.len() != 12 || !self.account.chars().all(|c| c.is_ascii_digit()) {
            return Err(ContractViolation::InvalidAccount(self.account.clone()));
        }
        if self.region.is_empty() {
            return Err(ContractViolation::EmptyField { field: "region" });
        }
        Ok(())
    }
}

impl StackConfig {
    /// The fixed stack configuration for an environment
    pub fn new(environment: Environment) -> Self {
        Self {
            stack_id: "SpringBootEksStack".to_string(),
            description: "Spring Boot application deployment on EKS".to_string(),
            environment,
            network: NetworkSettings {
                id: "SpringBootVpc".to_string(),
                cidr: "10.0.0.0/16".to_string(),
                max_azs: 2,
                cidr_mask: 24,
                nat_gateways: None,
            },
            registry: RegistrySettings {
                id: "SpringBootRepository".to_string(),
                repository_name: "spring-boot-k8s".to_string(),
                destroy_on_removal: true,
                image_scan_on_push: false,
            },
            cluster: ClusterSettings {
                id: "SpringBootCluster".to_string(),
                name: "spring-boot-eks".to_string(),
                kubernetes_version: "1.27".to_string(),
                node_pool: NodePoolSettings {
                    name: "SpringBootNodeGroup".to_string(),
                    instance_type: "t3.medium".to_string(),
                    min_size: 2,
                    max_size: 4,
                    desired_size: 2,
                    spot: false,
                },
            },
            app: AppSettings {
                name: "spring-boot-k8s".to_string(),
                namespace: "spring-boot".to_string(),
                image: IMAGE_PLACEHOLDER.to_string(),
                replicas: 2,
                container_port: 8080,
                service_port: 80,
                health_check_path: "/health".to_string(),
                spring_profile: "prod".to_string(),
            },
        }
    }

    /// Replace the container image reference
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.app.image = image.into();
        self
    }

    /// Validate the configuration
    ///
    /// Only checks what the builders cannot; range and layout invariants are
    /// enforced where the resources are constructed.
    pub fn validate(&self) -> Result<(), ContractViolation> {
        self.environment.validate()?;

        let required = [
            ("stack_id", &self.stack_id),
            ("cluster.name", &self.cluster.name),
            ("cluster.kubernetes_version", &self.cluster.kubernetes_version),
            ("registry.repository_name", &self.registry.repository_name),
            ("app.name", &self.app.name),
            ("app.namespace", &self.app.namespace),
            ("app.image", &self.app.image),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(ContractViolation::EmptyField { field });
            }
        }

        if !self.app.health_check_path.starts_with('/') {
            return Err(ContractViolation::InvalidHealthPath(
                self.app.health_check_path.clone(),
            ));
        }

        Ok(())
    }
}
