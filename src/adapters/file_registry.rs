//! `Registry` backed by a directory of one YAML manifest per file:
//! `serde_yaml::from_reader` over a `std::fs::File`, errors wrapped rather
//! than panicking.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::model::ids::FeatureId;
use crate::model::manifest::Manifest;
use crate::ports::error::PortError;
use crate::ports::registry::Registry;

/// Loads every `*.yaml`/`*.yml` file in `manifest_dir` at construction time
/// and serves `get_manifest` out of an in-memory map; the orchestrator
/// treats manifests as read-only, so no file-watching or reload path is
/// needed.
pub struct FileRegistry {
    manifests: RwLock<HashMap<FeatureId, Manifest>>,
}

impl FileRegistry {
    pub fn load(manifest_dir: &Path) -> Result<Self, PortError> {
        let mut manifests = HashMap::new();
        let entries = std::fs::read_dir(manifest_dir)
            .map_err(|e| PortError::context(format!("reading manifest directory {}", manifest_dir.display()), e))?;

        for entry in entries {
            let entry = entry.map_err(|e| PortError::context("reading manifest directory entry", e))?;
            let path = entry.path();
            if !is_yaml(&path) {
                continue;
            }
            let file = std::fs::File::open(&path)
                .map_err(|e| PortError::context(format!("opening manifest {}", path.display()), e))?;
            let manifest: Manifest = serde_yaml::from_reader(file)
                .map_err(|e| PortError::context(format!("parsing manifest {}", path.display()), e))?;
            manifests.insert(manifest.feature_id.clone(), manifest);
        }

        Ok(Self {
            manifests: RwLock::new(manifests),
        })
    }
}

fn is_yaml(path: &PathBuf) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[async_trait]
impl Registry for FileRegistry {
    async fn get_manifest(&self, feature_id: &FeatureId) -> Result<Option<Manifest>, PortError> {
        let manifests = self.manifests.read().await;
        match manifests.get(feature_id) {
            Some(manifest) => Ok(Some(manifest.clone())),
            None => {
                warn!(%feature_id, "no manifest registered for feature");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::ProbeConfig;
    use std::io::Write;
    use std::time::Duration;

    fn write_manifest(dir: &Path, feature_id: &str) {
        let manifest = Manifest {
            feature_id: FeatureId::new(feature_id).unwrap(),
            display_name: feature_id.to_string(),
            version: "1.0.0".to_string(),
            binary_relpath: "bin/run".to_string(),
            env: HashMap::new(),
            recommended_memory_bytes: 64 * 1024 * 1024,
            default_probe: ProbeConfig::None,
            needs_gateway: false,
            tags: vec![],
            depends_on: vec![],
            default_health_check_interval: Duration::from_secs(30),
            default_failure_threshold: 3,
        };
        let yaml = serde_yaml::to_string(&manifest).unwrap();
        let mut file = std::fs::File::create(dir.join(format!("{feature_id}.yaml"))).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn loads_every_manifest_in_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "tor");
        write_manifest(dir.path(), "wireguard");

        let registry = FileRegistry::load(dir.path()).unwrap();
        assert!(registry
            .get_manifest(&FeatureId::new("tor").unwrap())
            .await
            .unwrap()
            .is_some());
        assert!(registry
            .get_manifest(&FeatureId::new("ghost").unwrap())
            .await
            .unwrap()
            .is_none());
    }
}
