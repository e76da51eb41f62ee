//! Source abstraction for metadata lookups.

use async_trait::async_trait;

use super::{PackageMetadata, SourceCacheContext};
use crate::error::SourceError;
use crate::types::PackageIdentity;

/// A queryable package source.
///
/// `Ok(None)` means the source does not know the package and the next
/// source should be tried. `Err` is a transient failure of this source.
/// Lookups are cancelled by dropping the returned future.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Human-readable name for logging and error reports
    fn name(&self) -> &str;

    async fn get_metadata(
        &self,
        identity: &PackageIdentity,
        cache: &SourceCacheContext,
    ) -> Result<Option<PackageMetadata>, SourceError>;
}
