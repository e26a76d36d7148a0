/// Synthesis of an assembly into YAML artifacts
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::assembly::Assembly;
use crate::k8s::ManifestSet;

/// Render every manifest as one multi-document YAML stream in apply order
pub fn render_manifests(set: &ManifestSet) -> Result<String> {
    let mut documents = Vec::with_capacity(set.entries.len());
    for entry in set.in_apply_order() {
        documents.push(render_document(&entry.document)?);
    }
    Ok(documents.join("---\n"))
}

fn render_document(document: &crate::k8s::ManifestDocument) -> Result<String> {
    let tree = document
        .to_tree()
        .with_context(|| format!("Failed to convert {} to a document tree", document.kind()))?;
    serde_yaml::to_string(&tree)
        .with_context(|| format!("Failed to serialize {} manifest", document.kind()))
}

/// Writes synthesized artifacts to an output directory
pub struct Synthesizer {
    output_dir: PathBuf,
}

/// Paths written by a synthesis run
#[derive(Debug, Clone)]
pub struct SynthesizedFiles {
    pub stack: PathBuf,
    pub manifests: PathBuf,
    pub documents: Vec<PathBuf>,
}

impl Synthesizer {
    /// Create a new synthesizer
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write `stack.yaml`, `manifests.yaml` and one file per manifest
    pub async fn synthesize(&self, assembly: &Assembly) -> Result<SynthesizedFiles> {
        info!("Synthesizing into {}", self.output_dir.display());

        let documents_dir = self.output_dir.join("manifests");
        tokio::fs::create_dir_all(&documents_dir)
            .await
            .context("Failed to create output directory")?;

        let stack_yaml =
            serde_yaml::to_string(&assembly.stack).context("Failed to serialize stack")?;
        let stack_path = self.output_dir.join("stack.yaml");
        write_file(&stack_path, &stack_yaml).await?;

        let manifests_path = self.output_dir.join("manifests.yaml");
        write_file(&manifests_path, &render_manifests(&assembly.manifests)?).await?;

        let mut documents = Vec::new();
        for (index, entry) in assembly.manifests.in_apply_order().into_iter().enumerate() {
            let file_name = format!(
                "{:02}-{}.yaml",
                index + 1,
                entry.document.kind().to_string().to_lowercase()
            );
            let path = documents_dir.join(file_name);
            write_file(&path, &render_document(&entry.document)?).await?;
            documents.push(path);
        }

        info!(
            "Wrote stack and {} manifests to {}",
            documents.len(),
            self.output_dir.display()
        );

        Ok(SynthesizedFiles {
            stack: stack_path,
            manifests: manifests_path,
            documents,
        })
    }
}

async fn write_file(path: &Path, content: &str) -> Result<()> {
    debug!("Writing {}", path.display());
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::assemble;
    use crate::config::{Environment, StackConfig};

    fn assembly() -> Assembly {
        assemble(&StackConfig::new(Environment {
            account: "111122223333".to_string(),
            region: "us-east-1".to_string(),
        }))
        .unwrap()
    }

    #[test]
    fn test_render_manifests_in_apply_order() {
        let yaml = render_manifests(&assembly().manifests).unwrap();
        let docs: Vec<serde_yaml::Value> = yaml
            .split("---\n")
            .map(|doc| serde_yaml::from_str(doc).unwrap())
            .collect();

        assert_eq!(docs.len(), 3);
        let kinds: Vec<&str> = docs.iter().map(|d| d["kind"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["Namespace", "Deployment", "Service"]);
        assert_eq!(docs[2]["spec"]["ports"][0]["targetPort"].as_u64(), Some(8080));
        assert_eq!(
            docs[1]["spec"]["template"]["spec"]["containers"][0]["image"].as_str(),
            Some("${ECR_REPOSITORY_URI}:latest")
        );
    }

    #[test]
    fn test_render_is_byte_identical() {
        let first = render_manifests(&assembly().manifests).unwrap();
        let second = render_manifests(&assembly().manifests).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_synthesize_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let synthesizer = Synthesizer::new(dir.path());
        let files = synthesizer.synthesize(&assembly()).await.unwrap();

        assert!(files.stack.exists());
        assert!(files.manifests.exists());
        let names: Vec<String> = files
            .documents
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["01-namespace.yaml", "02-deployment.yaml", "03-service.yaml"]
        );

        let stack = tokio::fs::read_to_string(&files.stack).await.unwrap();
        assert!(stack.contains("spring-boot-eks"));
        assert!(stack.contains("10.0.3.0/24"));
        assert!(files.stack.starts_with(dir.path()));
    }
}
