//! `Registry` collaborator: `GetManifest(featureID)`.

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;

use crate::model::ids::FeatureId;
use crate::model::manifest::Manifest;
use crate::ports::error::PortError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    async fn get_manifest(&self, feature_id: &FeatureId) -> Result<Option<Manifest>, PortError>;
}
