/// Resource graph assembly for the EKS stack
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cluster::{
    AccessGrant, CapacityType, ClusterParams, ComputeCluster, EndpointAccess, NodePoolParams,
};
use super::network::{Ipv4Cidr, NetworkParams, NetworkResource, SubnetGroupSpec, SubnetKind};
use super::registry::{ContainerRegistry, RegistryParams, RemovalPolicy};
use crate::config::{Environment, StackConfig};
use crate::error::ContractViolation;
use crate::graph::DependencyGraph;

/// Value exported by the stack once deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackOutput {
    pub key: String,
    pub value: String,
    pub description: String,
}

/// Fully assembled infrastructure declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub id: String,
    pub description: String,
    pub environment: Environment,
    pub network: NetworkResource,
    pub registry: ContainerRegistry,
    pub cluster: ComputeCluster,
    pub dependencies: DependencyGraph,
    pub outputs: Vec<StackOutput>,
}

/// Build the stack's resource graph from configuration
///
/// Fails on the first contract violation without returning partial state.
pub fn build_stack(config: &StackConfig) -> Result<Stack, ContractViolation> {
    config.validate()?;
    let env = &config.environment;

    info!(
        "Assembling stack {} for account {} in {}",
        config.stack_id, env.account, env.region
    );

    let cidr: Ipv4Cidr = config.network.cidr.parse()?;
    let network = NetworkResource::new(NetworkParams {
        id: config.network.id.clone(),
        cidr,
        region: env.region.clone(),
        max_azs: config.network.max_azs,
        nat_gateways: config.network.nat_gateways,
        subnet_groups: vec![
            SubnetGroupSpec {
                name: "public".to_string(),
                kind: SubnetKind::Public,
                cidr_mask: config.network.cidr_mask,
            },
            SubnetGroupSpec {
                name: "private".to_string(),
                kind: SubnetKind::PrivateWithEgress,
                cidr_mask: config.network.cidr_mask,
            },
        ],
    })?;
    debug!(
        "Network {} spans {} zones with {} subnets",
        network.id,
        network.availability_zones.len(),
        network.subnets().count()
    );

    let registry = ContainerRegistry::new(RegistryParams {
        id: config.registry.id.clone(),
        repository_name: config.registry.repository_name.clone(),
        removal_policy: if config.registry.destroy_on_removal {
            RemovalPolicy::Destroy
        } else {
            RemovalPolicy::Retain
        },
        image_scan_on_push: config.registry.image_scan_on_push,
    })?;
    debug!("Registry {} declared", registry.repository_name);

    let pool = &config.cluster.node_pool;
    let cluster = ComputeCluster::new(
        ClusterParams {
            id: config.cluster.id.clone(),
            name: config.cluster.name.clone(),
            version: config.cluster.kubernetes_version.clone(),
            endpoint_access: EndpointAccess::PublicAndPrivate,
            // The explicit node group below is the only capacity
            default_capacity: 0,
            masters: vec![AccessGrant::AccountRoot {
                account: env.account.clone(),
            }],
            node_pools: vec![NodePoolParams {
                name: pool.name.clone(),
                instance_types: vec![pool.instance_type.clone()],
                min_size: pool.min_size,
                max_size: pool.max_size,
                desired_size: pool.desired_size,
                capacity_type: if pool.spot {
                    CapacityType::Spot
                } else {
                    CapacityType::OnDemand
                },
            }],
        },
        &network,
    )?;
    debug!(
        "Cluster {} (Kubernetes {}) with {} node group(s)",
        cluster.name,
        cluster.version,
        cluster.node_pools.len()
    );

    let mut dependencies = DependencyGraph::new();
    dependencies.add_node(network.id.as_str())?;
    dependencies.add_node(registry.id.as_str())?;
    dependencies.add_node(cluster.id.as_str())?;
    dependencies.add_dependency(&cluster.id, &network.id)?;
    for pool in &cluster.node_pools {
        dependencies.add_node(pool.name.as_str())?;
        dependencies.add_dependency(&pool.name, &cluster.id)?;
    }

    let outputs = vec![
        StackOutput {
            key: "RepositoryUri".to_string(),
            value: registry.repository_uri(env),
            description: "ECR Repository URI for the Spring Boot application".to_string(),
        },
        StackOutput {
            key: "ClusterName".to_string(),
            value: cluster.name.clone(),
            description: "EKS Cluster Name".to_string(),
        },
    ];

    info!("Stack {} assembled", config.stack_id);

    Ok(Stack {
        id: config.stack_id.clone(),
        description: config.description.clone(),
        environment: env.clone(),
        network,
        registry,
        cluster,
        dependencies,
        outputs,
    })
}

impl Stack {
    #[cfg(test)]
    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StackConfig {
        StackConfig::new(Environment {
            account: "111122223333".to_string(),
            region: "us-east-1".to_string(),
        })
    }

    #[test]
    fn test_builds_default_stack() {
        let stack = build_stack(&config()).unwrap();

        assert_eq!(stack.id, "SpringBootEksStack");
        assert_eq!(stack.cluster.name, "spring-boot-eks");
        assert_eq!(stack.cluster.version, "1.27");
        assert_eq!(stack.cluster.default_capacity, 0);
        assert_eq!(stack.cluster.network, stack.network.id);

        assert_eq!(stack.cluster.node_pools.len(), 1);
        let pool = &stack.cluster.node_pools[0];
        assert_eq!(
            (pool.min_size, pool.max_size, pool.desired_size),
            (2, 4, 2)
        );
        assert_eq!(pool.instance_types, vec!["t3.medium"]);
        assert_eq!(pool.capacity_type, CapacityType::OnDemand);

        assert_eq!(stack.network.subnet_groups.len(), 2);
        assert!(stack
            .network
            .subnet_groups
            .iter()
            .all(|g| g.cidr_mask == 24 && g.subnets.len() == 2));

        assert_eq!(
            stack.cluster.masters,
            vec![AccessGrant::AccountRoot {
                account: "111122223333".to_string()
            }]
        );
    }

    #[test]
    fn test_resource_dependencies() {
        let stack = build_stack(&config()).unwrap();
        assert_eq!(
            stack.dependencies.apply_order(),
            vec![
                "SpringBootVpc",
                "SpringBootRepository",
                "SpringBootCluster",
                "SpringBootNodeGroup"
            ]
        );
        assert_eq!(stack.dependencies.edges().len(), 2);
    }

    #[test]
    fn test_outputs() {
        let stack = build_stack(&config()).unwrap();
        assert_eq!(
            stack.output("RepositoryUri"),
            Some("111122223333.dkr.ecr.us-east-1.amazonaws.com/spring-boot-k8s")
        );
        assert_eq!(stack.output("ClusterName"), Some("spring-boot-eks"));
        assert_eq!(stack.outputs.len(), 2);
        assert_eq!(stack.output("KubectlRoleArn"), None);
    }

    #[test]
    fn test_rejects_invalid_node_pool() {
        let mut config = config();
        config.cluster.node_pool.min_size = 5;
        config.cluster.node_pool.desired_size = 5;
        config.cluster.node_pool.max_size = 4;
        assert!(matches!(
            build_stack(&config),
            Err(ContractViolation::NodePoolBounds { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_account() {
        let mut config = config();
        config.environment.account = "not-an-account".to_string();
        assert!(matches!(
            build_stack(&config),
            Err(ContractViolation::InvalidAccount(_))
        ));
    }

    #[test]
    fn test_spot_capacity() {
        let mut config = config();
        config.cluster.node_pool.spot = true;
        let stack = build_stack(&config).unwrap();
        assert_eq!(
            stack.cluster.node_pools[0].capacity_type,
            CapacityType::Spot
        );
    }
}
