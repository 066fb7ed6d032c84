//! `Downloader` collaborator: `Download(ctx, featureID, url,
//! expectedChecksum) -> error`. Download logic itself is out of scope; the
//! orchestrator only consumes this port and performs the hash-verification
//! contract on the result.

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;

use crate::model::ids::FeatureId;
use crate::ports::error::PortError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        feature_id: &FeatureId,
        url: &str,
        expected_checksum: &str,
    ) -> Result<(), PortError>;
}
