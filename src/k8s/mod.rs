/// Kubernetes manifests for the Spring Boot application
pub mod generator;
pub mod manifests;

pub use generator::{generate_manifests, ManifestSet};
pub use manifests::{ManifestDocument, ManifestKind};
