/// Spring Boot application manifests and their apply ordering
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::manifests::*;
use crate::aws::ComputeCluster;
use crate::config::AppSettings;
use crate::error::ContractViolation;
use crate::graph::{DependencyEdge, DependencyGraph};

/// Liveness waits longer so slow starts are not restarted
const LIVENESS_INITIAL_DELAY: u32 = 60;
const LIVENESS_PERIOD: u32 = 10;
/// Readiness gates traffic, so it starts checking sooner
const READINESS_INITIAL_DELAY: u32 = 30;
const READINESS_PERIOD: u32 = 5;

const CPU_REQUEST_MILLIS: u32 = 500;
const MEMORY_REQUEST_MIB: u32 = 512;
const CPU_LIMIT_MILLIS: u32 = 1000;
const MEMORY_LIMIT_MIB: u32 = 1024;

/// Observability agent toggles, always enabled
const AGENT_TOGGLES: &[&str] = &["DD_APM_ENABLED", "DD_LOGS_ENABLED", "DD_PROCESS_AGENT_ENABLED"];

/// Document ids in the dependency graph
pub const NAMESPACE_ID: &str = "SpringBootNamespace";
pub const DEPLOYMENT_ID: &str = "SpringBootDeployment";
pub const SERVICE_ID: &str = "SpringBootService";

/// Manifest attached to the dependency graph under an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub document: ManifestDocument,
}

/// Documents for one cluster plus the order they must be applied in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSet {
    pub cluster: String,
    pub entries: Vec<ManifestEntry>,
    pub dependencies: DependencyGraph,
}

impl ManifestSet {
    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&ManifestDocument> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| &e.document)
    }

    /// First document of a given kind
    #[cfg(test)]
    pub fn find(&self, kind: ManifestKind) -> Option<&ManifestDocument> {
        self.entries
            .iter()
            .map(|e| &e.document)
            .find(|d| d.kind() == kind)
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        self.dependencies.edges()
    }

    /// Documents in an order an applier can create them
    pub fn in_apply_order(&self) -> Vec<&ManifestEntry> {
        self.dependencies
            .apply_order()
            .into_iter()
            .filter_map(|id| self.entries.iter().find(|e| e.id == id))
            .collect()
    }

    /// Deployment selectors must equal their pod template labels, and every
    /// service selector must equal the pod labels of some deployment
    pub fn verify_selectors(&self) -> Result<(), ContractViolation> {
        let mut pod_labels: Vec<&Labels> = Vec::new();
        for entry in &self.entries {
            let ManifestDocument::Deployment(deployment) = &entry.document else {
                continue;
            };
            let selector = &deployment.spec.selector.match_labels;
            let labels = &deployment.spec.template.metadata.labels;
            if selector.is_empty() || selector != labels {
                return Err(ContractViolation::SelectorMismatch {
                    selector: format_labels(selector),
                    labels: format_labels(labels),
                });
            }
            pod_labels.push(labels);
        }

        for entry in &self.entries {
            let ManifestDocument::Service(service) = &entry.document else {
                continue;
            };
            let selector = &service.spec.selector;
            if !pod_labels.iter().any(|labels| *labels == selector) {
                return Err(ContractViolation::SelectorMismatch {
                    selector: format_labels(selector),
                    labels: pod_labels
                        .iter()
                        .map(|l| format_labels(l))
                        .collect::<Vec<_>>()
                        .join("; "),
                });
            }
        }

        Ok(())
    }
}

fn format_labels(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Generate the Namespace, Deployment and Service for the application
///
/// The image reference is used verbatim; placeholders are left for the
/// deploy pipeline to substitute.
pub fn generate_manifests(
    cluster: &ComputeCluster,
    app: &AppSettings,
) -> Result<ManifestSet, ContractViolation> {
    validate_app(app)?;

    info!(
        "Generating manifests for {} in namespace {} on cluster {}",
        app.name, app.namespace, cluster.name
    );

    let labels: Labels = [("app".to_string(), app.name.clone())].into();

    let namespace = ManifestDocument::Namespace(NamespaceDoc {
        api_version: "v1".to_string(),
        metadata: ObjectMeta::cluster_scoped(&app.namespace),
    });

    let mut env = vec![EnvVar::new("SPRING_PROFILES_ACTIVE", &app.spring_profile)];
    env.extend(AGENT_TOGGLES.iter().map(|name| EnvVar::new(*name, "true")));

    let container = Container {
        name: app.name.clone(),
        image: app.image.clone(),
        ports: vec![ContainerPort {
            container_port: app.container_port,
        }],
        resources: ResourceRequirements {
            limits: ResourceList::new(CPU_LIMIT_MILLIS, MEMORY_LIMIT_MIB),
            requests: ResourceList::new(CPU_REQUEST_MILLIS, MEMORY_REQUEST_MIB),
        },
        env,
        liveness_probe: Probe::http(
            &app.health_check_path,
            app.container_port,
            LIVENESS_INITIAL_DELAY,
            LIVENESS_PERIOD,
        ),
        readiness_probe: Probe::http(
            &app.health_check_path,
            app.container_port,
            READINESS_INITIAL_DELAY,
            READINESS_PERIOD,
        ),
    };

    let deployment = ManifestDocument::Deployment(DeploymentDoc {
        api_version: "apps/v1".to_string(),
        metadata: ObjectMeta::namespaced(&app.name, &app.namespace).with_labels(labels.clone()),
        spec: DeploymentSpec {
            replicas: app.replicas,
            selector: LabelSelector {
                match_labels: labels.clone(),
            },
            template: PodTemplate {
                metadata: TemplateMeta {
                    labels: labels.clone(),
                },
                spec: PodSpec {
                    containers: vec![container],
                },
            },
        },
    });

    let service = ManifestDocument::Service(ServiceDoc {
        api_version: "v1".to_string(),
        metadata: ObjectMeta::namespaced(&app.name, &app.namespace).with_labels(labels.clone()),
        spec: ServiceSpec {
            service_type: ServiceType::LoadBalancer,
            selector: labels,
            ports: vec![ServicePort {
                name: "http".to_string(),
                port: app.service_port,
                target_port: app.container_port,
            }],
        },
    });

    let mut dependencies = DependencyGraph::new();
    let mut entries = Vec::with_capacity(3);
    for (id, document) in [
        (NAMESPACE_ID, namespace),
        (DEPLOYMENT_ID, deployment),
        (SERVICE_ID, service),
    ] {
        dependencies.add_node(id)?;
        debug!("Declared {} {}", document.kind(), document.metadata().name);
        entries.push(ManifestEntry {
            id: id.to_string(),
            document,
        });
    }
    dependencies.add_dependency(DEPLOYMENT_ID, NAMESPACE_ID)?;
    dependencies.add_dependency(SERVICE_ID, DEPLOYMENT_ID)?;

    let set = ManifestSet {
        cluster: cluster.name.clone(),
        entries,
        dependencies,
    };
    set.verify_selectors()?;

    Ok(set)
}

fn validate_app(app: &AppSettings) -> Result<(), ContractViolation> {
    for (field, value) in [
        ("app name", &app.name),
        ("namespace", &app.namespace),
        ("image", &app.image),
        ("spring profile", &app.spring_profile),
    ] {
        if value.is_empty() {
            return Err(ContractViolation::EmptyField { field });
        }
    }
    for (field, value) in [
        ("replicas", app.replicas),
        ("container port", u32::from(app.container_port)),
        ("service port", u32::from(app.service_port)),
    ] {
        if value == 0 {
            return Err(ContractViolation::ZeroValue { field });
        }
    }
    if !app.health_check_path.starts_with('/') {
        return Err(ContractViolation::InvalidHealthPath(
            app.health_check_path.clone(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::build_stack;
    use crate::config::{Environment, StackConfig, IMAGE_PLACEHOLDER};
    use serde_json::json;

    fn config() -> StackConfig {
        StackConfig::new(Environment {
            account: "111122223333".to_string(),
            region: "us-east-1".to_string(),
        })
    }

    fn manifests() -> ManifestSet {
        let config = config();
        let stack = build_stack(&config).unwrap();
        generate_manifests(&stack.cluster, &config.app).unwrap()
    }

    fn tree(set: &ManifestSet, kind: ManifestKind) -> serde_json::Value {
        set.find(kind).unwrap().to_tree().unwrap()
    }

    #[test]
    fn test_identity_fields() {
        let set = manifests();
        assert_eq!(set.cluster, "spring-boot-eks");
        assert_eq!(set.entries.len(), 3);

        let namespace = tree(&set, ManifestKind::Namespace);
        assert_eq!(namespace["apiVersion"], "v1");
        assert_eq!(namespace["kind"], "Namespace");
        assert_eq!(namespace["metadata"]["name"], "spring-boot");
        assert!(namespace["metadata"].get("namespace").is_none());

        for (kind, api_version) in [
            (ManifestKind::Deployment, "apps/v1"),
            (ManifestKind::Service, "v1"),
        ] {
            let doc = tree(&set, kind);
            assert_eq!(doc["apiVersion"], api_version);
            assert_eq!(doc["kind"], kind.to_string());
            assert_eq!(doc["metadata"]["name"], "spring-boot-k8s");
            assert_eq!(doc["metadata"]["namespace"], "spring-boot");
        }
    }

    #[test]
    fn test_selector_matches_pod_labels() {
        let set = manifests();
        let deployment = tree(&set, ManifestKind::Deployment);
        let service = tree(&set, ManifestKind::Service);

        let pod_labels = &deployment["spec"]["template"]["metadata"]["labels"];
        assert_eq!(pod_labels, &json!({ "app": "spring-boot-k8s" }));
        assert_eq!(&service["spec"]["selector"], pod_labels);
        assert_eq!(&deployment["spec"]["selector"]["matchLabels"], pod_labels);
        assert!(set.verify_selectors().is_ok());
    }

    #[test]
    fn test_selector_mismatch_detected() {
        let mut set = manifests();
        for entry in &mut set.entries {
            if let ManifestDocument::Service(service) = &mut entry.document {
                service
                    .spec
                    .selector
                    .insert("app".to_string(), "other".to_string());
            }
        }
        assert!(matches!(
            set.verify_selectors(),
            Err(ContractViolation::SelectorMismatch { .. })
        ));
    }

    #[test]
    fn test_service_selector_must_equal_pod_labels() {
        let mut set = manifests();
        for entry in &mut set.entries {
            if let ManifestDocument::Deployment(deployment) = &mut entry.document {
                for labels in [
                    &mut deployment.spec.template.metadata.labels,
                    &mut deployment.spec.selector.match_labels,
                ] {
                    labels.insert("tier".to_string(), "web".to_string());
                }
            }
        }
        assert!(matches!(
            set.verify_selectors(),
            Err(ContractViolation::SelectorMismatch { .. })
        ));
    }

    #[test]
    fn test_deployment_selector_must_equal_template_labels() {
        let mut set = manifests();
        for entry in &mut set.entries {
            if let ManifestDocument::Deployment(deployment) = &mut entry.document {
                deployment
                    .spec
                    .selector
                    .match_labels
                    .insert("app".to_string(), "other".to_string());
            }
        }
        assert_eq!(
            set.verify_selectors(),
            Err(ContractViolation::SelectorMismatch {
                selector: "app=other".to_string(),
                labels: "app=spring-boot-k8s".to_string(),
            })
        );
    }

    #[test]
    fn test_object_labels() {
        let set = manifests();
        for kind in [ManifestKind::Deployment, ManifestKind::Service] {
            let doc = tree(&set, kind);
            assert_eq!(doc["metadata"]["labels"], json!({ "app": "spring-boot-k8s" }));
        }
        let namespace = tree(&set, ManifestKind::Namespace);
        assert!(namespace["metadata"].get("labels").is_none());
    }

    #[test]
    fn test_dependency_edges() {
        let set = manifests();
        assert_eq!(
            set.edges(),
            &[
                DependencyEdge::new(DEPLOYMENT_ID, NAMESPACE_ID),
                DependencyEdge::new(SERVICE_ID, DEPLOYMENT_ID),
            ]
        );

        let order: Vec<ManifestKind> = set
            .in_apply_order()
            .iter()
            .map(|e| e.document.kind())
            .collect();
        assert_eq!(
            order,
            vec![
                ManifestKind::Namespace,
                ManifestKind::Deployment,
                ManifestKind::Service
            ]
        );
    }

    #[test]
    fn test_service_port() {
        let service = tree(&manifests(), ManifestKind::Service);
        assert_eq!(service["spec"]["type"], "LoadBalancer");
        assert_eq!(
            service["spec"]["ports"][0],
            json!({ "name": "http", "port": 80, "targetPort": 8080 })
        );
        assert_eq!(service["spec"]["ports"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_container() {
        let deployment = tree(&manifests(), ManifestKind::Deployment);
        assert_eq!(deployment["spec"]["replicas"], 2);

        let containers = deployment["spec"]["template"]["spec"]["containers"]
            .as_array()
            .unwrap();
        assert_eq!(containers.len(), 1);
        let container = &containers[0];

        assert_eq!(container["image"], IMAGE_PLACEHOLDER);
        assert_eq!(container["ports"], json!([{ "containerPort": 8080 }]));
        assert_eq!(
            container["resources"],
            json!({
                "requests": { "cpu": "500m", "memory": "512Mi" },
                "limits": { "cpu": "1000m", "memory": "1024Mi" }
            })
        );

        let env = container["env"].as_array().unwrap();
        assert_eq!(env.len(), 4);
        let profile = env
            .iter()
            .find(|e| e["name"] == "SPRING_PROFILES_ACTIVE")
            .unwrap();
        assert_eq!(profile["value"], "prod");
        assert!(env
            .iter()
            .filter(|e| e["name"] != "SPRING_PROFILES_ACTIVE")
            .all(|e| e["value"] == "true"));
    }

    #[test]
    fn test_probes() {
        let deployment = tree(&manifests(), ManifestKind::Deployment);
        let container = &deployment["spec"]["template"]["spec"]["containers"][0];

        assert_eq!(
            container["livenessProbe"],
            json!({
                "httpGet": { "path": "/health", "port": 8080 },
                "initialDelaySeconds": 60,
                "periodSeconds": 10
            })
        );
        assert_eq!(
            container["readinessProbe"],
            json!({
                "httpGet": { "path": "/health", "port": 8080 },
                "initialDelaySeconds": 30,
                "periodSeconds": 5
            })
        );
    }

    #[test]
    fn test_explicit_image() {
        let config = config().with_image("registry.example.com/app:1.2.3");
        let stack = build_stack(&config).unwrap();
        let set = generate_manifests(&stack.cluster, &config.app).unwrap();
        let deployment = tree(&set, ManifestKind::Deployment);
        assert_eq!(
            deployment["spec"]["template"]["spec"]["containers"][0]["image"],
            "registry.example.com/app:1.2.3"
        );
    }

    #[test]
    fn test_rejects_invalid_app_settings() {
        let config = config();
        let stack = build_stack(&config).unwrap();

        let mut app = config.app.clone();
        app.replicas = 0;
        assert_eq!(
            generate_manifests(&stack.cluster, &app),
            Err(ContractViolation::ZeroValue { field: "replicas" })
        );

        let mut app = config.app.clone();
        app.namespace = String::new();
        assert!(generate_manifests(&stack.cluster, &app).is_err());
    }

    #[test]
    fn test_idempotent() {
        let first = manifests();
        let second = manifests();
        assert_eq!(first, second);
        for (a, b) in first.entries.iter().zip(&second.entries) {
            assert_eq!(a.document.to_tree().unwrap(), b.document.to_tree().unwrap());
        }
    }
}
