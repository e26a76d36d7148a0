/// One-shot assembly of the stack and its application manifests
use tracing::info;

use crate::aws::{build_stack, Stack};
use crate::config::StackConfig;
use crate::error::ContractViolation;
use crate::k8s::{generate_manifests, ManifestSet};

/// Everything handed to synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub stack: Stack,
    pub manifests: ManifestSet,
}

/// Build the resource graph, then the manifests bound to its cluster
pub fn assemble(config: &StackConfig) -> Result<Assembly, ContractViolation> {
    let stack = build_stack(config)?;
    let manifests = generate_manifests(&stack.cluster, &config.app)?;

    info!(
        "Assembled {} resources and {} manifests",
        stack.dependencies.nodes().len(),
        manifests.entries.len()
    );

    Ok(Assembly { stack, manifests })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::k8s::ManifestKind;
    use serde_json::json;

    fn config() -> StackConfig {
        StackConfig::new(Environment {
            account: "111122223333".to_string(),
            region: "us-east-1".to_string(),
        })
    }

    #[test]
    fn test_cluster_and_node_pool() {
        let assembly = assemble(&config()).unwrap();
        let cluster = &assembly.stack.cluster;
        assert_eq!(cluster.name, "spring-boot-eks");
        assert_eq!(cluster.node_pools.len(), 1);

        let pool = cluster.node_pool("SpringBootNodeGroup").unwrap();
        assert_eq!(pool.min_size, 2);
        assert_eq!(pool.max_size, 4);
        assert_eq!(pool.desired_size, 2);
        assert_eq!(assembly.manifests.cluster, cluster.name);
    }

    #[test]
    fn test_service_port_mapping() {
        let assembly = assemble(&config()).unwrap();
        let service = assembly
            .manifests
            .find(ManifestKind::Service)
            .unwrap()
            .to_tree()
            .unwrap();
        assert_eq!(
            service["spec"]["ports"][0],
            json!({ "name": "http", "port": 80, "targetPort": 8080 })
        );
    }

    #[test]
    fn test_container_env() {
        let assembly = assemble(&config()).unwrap();
        let deployment = assembly
            .manifests
            .get(crate::k8s::generator::DEPLOYMENT_ID)
            .unwrap()
            .to_tree()
            .unwrap();
        let env = deployment["spec"]["template"]["spec"]["containers"][0]["env"]
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(env.len(), 4);
        assert!(env.contains(&json!({ "name": "SPRING_PROFILES_ACTIVE", "value": "prod" })));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        assert_eq!(assemble(&config()).unwrap(), assemble(&config()).unwrap());
    }

    #[test]
    fn test_violation_aborts_assembly() {
        let mut config = config();
        config.cluster.node_pool.min_size = 5;
        config.cluster.node_pool.max_size = 4;
        assert!(matches!(
            assemble(&config),
            Err(ContractViolation::NodePoolBounds { .. })
        ));
    }
}
