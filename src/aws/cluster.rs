/// EKS cluster and managed node group declarations
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::network::NetworkResource;
use crate::error::ContractViolation;

/// Where the Kubernetes API endpoint is reachable from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointAccess {
    Public,
    Private,
    PublicAndPrivate,
}

impl EndpointAccess {
    pub fn public(&self) -> bool {
        matches!(self, EndpointAccess::Public | EndpointAccess::PublicAndPrivate)
    }

    pub fn private(&self) -> bool {
        matches!(self, EndpointAccess::Private | EndpointAccess::PublicAndPrivate)
    }
}

/// Purchasing option for node group instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityType {
    OnDemand,
    Spot,
}

/// Identity granted cluster administrator access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AccessGrant {
    /// Root principal of an account; every IAM identity in it that is allowed
    /// to assume the masters role gets `system:masters`
    AccountRoot { account: String },
}

impl AccessGrant {
    pub fn principal_arn(&self) -> String {
        match self {
            AccessGrant::AccountRoot { account } => format!("arn:aws:iam::{}:root", account),
        }
    }
}

/// Parameters for a managed node group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePoolParams {
    pub name: String,
    pub instance_types: Vec<String>,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_size: u32,
    pub capacity_type: CapacityType,
}

/// Managed node group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    pub name: String,
    pub instance_types: Vec<String>,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_size: u32,
    pub capacity_type: CapacityType,
}

impl NodePool {
    /// Declare a node group, rejecting sizes outside `min <= desired <= max`
    pub fn new(params: NodePoolParams) -> Result<Self, ContractViolation> {
        if params.name.is_empty() {
            return Err(ContractViolation::EmptyField {
                field: "node pool name",
            });
        }
        if params.instance_types.is_empty() || params.instance_types.iter().any(String::is_empty)
        {
            return Err(ContractViolation::NoInstanceTypes(params.name));
        }
        if params.max_size == 0 {
            return Err(ContractViolation::ZeroValue {
                field: "node pool max size",
            });
        }
        if params.min_size > params.desired_size || params.desired_size > params.max_size {
            return Err(ContractViolation::NodePoolBounds {
                name: params.name,
                min: params.min_size,
                desired: params.desired_size,
                max: params.max_size,
            });
        }

        Ok(Self {
            name: params.name,
            instance_types: params.instance_types,
            min_size: params.min_size,
            max_size: params.max_size,
            desired_size: params.desired_size,
            capacity_type: params.capacity_type,
        })
    }
}

/// Parameters for declaring a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterParams {
    pub id: String,
    pub name: String,
    pub version: String,
    pub endpoint_access: EndpointAccess,
    /// Nodes provisioned automatically by the cluster itself
    pub default_capacity: u32,
    pub masters: Vec<AccessGrant>,
    pub node_pools: Vec<NodePoolParams>,
}

/// Declared EKS cluster
///
/// The network is referenced by id; the cluster does not own it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeCluster {
    pub id: String,
    pub name: String,
    pub version: String,
    pub network: String,
    pub endpoint_access: EndpointAccess,
    pub default_capacity: u32,
    pub masters: Vec<AccessGrant>,
    pub node_pools: Vec<NodePool>,
}

impl ComputeCluster {
    pub fn new(params: ClusterParams, network: &NetworkResource) -> Result<Self, ContractViolation> {
        if params.id.is_empty() {
            return Err(ContractViolation::EmptyField {
                field: "cluster id",
            });
        }
        if params.name.is_empty() {
            return Err(ContractViolation::EmptyField {
                field: "cluster name",
            });
        }
        if params.version.is_empty() {
            return Err(ContractViolation::EmptyField {
                field: "cluster version",
            });
        }
        // Explicit node groups replace the default capacity, never add to it
        if params.default_capacity > 0 && !params.node_pools.is_empty() {
            return Err(ContractViolation::DefaultCapacityConflict {
                cluster: params.name,
                capacity: params.default_capacity,
            });
        }

        let mut seen = HashSet::new();
        let mut node_pools = Vec::with_capacity(params.node_pools.len());
        for pool in params.node_pools {
            if !seen.insert(pool.name.clone()) {
                return Err(ContractViolation::DuplicateNodePool(pool.name));
            }
            node_pools.push(NodePool::new(pool)?);
        }

        Ok(Self {
            id: params.id,
            name: params.name,
            version: params.version,
            network: network.id.clone(),
            endpoint_access: params.endpoint_access,
            default_capacity: params.default_capacity,
            masters: params.masters,
            node_pools,
        })
    }

    #[cfg(test)]
    pub fn node_pool(&self, name: &str) -> Option<&NodePool> {
        self.node_pools.iter().find(|p| p.name == name)
    }
}
