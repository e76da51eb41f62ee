//! Tiered, bounded-concurrency metadata resolver.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{HttpSource, LocalFolderSource, MetadataSource, PackageMetadata, SourceCacheContext};
use crate::config::{EngineConfig, SourceKind};
use crate::config::schema::{DEFAULT_LOOKUP_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENCY};
use crate::error::{Error, Result, SourceError};
use crate::types::PackageIdentity;

/// Fan-out and timeout limits for one resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Maximum lookups in flight per tier
    pub max_concurrency: usize,
    /// Upper bound on a single source lookup
    pub lookup_timeout: Duration,
    /// Skip the per-call memo so every lookup reaches its source
    pub no_cache: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            lookup_timeout: Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS),
            no_cache: false,
        }
    }
}

/// Sources grouped by tier, each in priority order.
///
/// Source names are unique across both tiers, ignoring case; sources
/// memoize lookups under their name.
#[derive(Clone, Default)]
pub struct MetadataTiers {
    local: Vec<Arc<dyn MetadataSource>>,
    remote: Vec<Arc<dyn MetadataSource>>,
}

impl MetadataTiers {
    pub fn new(
        local: Vec<Arc<dyn MetadataSource>>,
        remote: Vec<Arc<dyn MetadataSource>>,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for source in local.iter().chain(&remote) {
            if !seen.insert(source.name().to_lowercase()) {
                return Err(Error::Config(format!(
                    "Duplicate source name '{}'",
                    source.name()
                )));
            }
        }
        Ok(Self { local, remote })
    }

    pub fn local(&self) -> &[Arc<dyn MetadataSource>] {
        &self.local
    }

    pub fn remote(&self) -> &[Arc<dyn MetadataSource>] {
        &self.remote
    }

    /// Build tiers from configured sources.
    ///
    /// Local sources keep their configured order. If none is configured the
    /// user's default package folder becomes the only local source.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let mut local: Vec<Arc<dyn MetadataSource>> = Vec::new();
        let mut remote: Vec<Arc<dyn MetadataSource>> = Vec::new();
        for entry in &config.sources {
            match entry.kind {
                SourceKind::Local => {
                    let path = entry.path.clone().ok_or_else(|| {
                        Error::Config(format!("Local source '{}' requires a path", entry.name))
                    })?;
                    local.push(Arc::new(LocalFolderSource::new(entry.name.clone(), path)));
                }
                SourceKind::Http => {
                    let url = entry.url.clone().ok_or_else(|| {
                        Error::Config(format!("Http source '{}' requires a url", entry.name))
                    })?;
                    remote.push(Arc::new(HttpSource::new(entry.name.clone(), url)));
                }
            }
        }

        if local.is_empty()
            && let Some(folder) = EngineConfig::default_packages_folder()
        {
            local.push(Arc::new(LocalFolderSource::new("global-packages", folder)));
        }
        Self::new(local, remote)
    }
}

impl std::fmt::Debug for MetadataTiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |sources: &[Arc<dyn MetadataSource>]| {
            sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>()
        };
        f.debug_struct("MetadataTiers")
            .field("local", &names(&self.local))
            .field("remote", &names(&self.remote))
            .finish()
    }
}

/// Outcome of looking one package up in one tier.
#[derive(Debug)]
enum TierLookup {
    Found(PackageMetadata),
    /// At least one source answered "unknown", or the tier has no sources.
    NotFound,
    /// Every source failed.
    Failed(Vec<SourceError>),
}

/// Resolves package metadata local-first, falling back to remote sources.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    tiers: MetadataTiers,
    options: ResolverOptions,
}

impl MetadataResolver {
    pub fn new(tiers: MetadataTiers, options: ResolverOptions) -> Self {
        Self { tiers, options }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let options = ResolverOptions {
            max_concurrency: config.metadata.max_concurrency,
            lookup_timeout: config.metadata.lookup_timeout(),
            no_cache: config.metadata.no_cache,
        };
        Ok(Self::new(MetadataTiers::from_config(config)?, options))
    }

    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    /// Resolve metadata for every identity in `packages`.
    ///
    /// Fails with [`Error::SourceLookup`] when every source of the final
    /// tier failed for a package, with [`Error::Unresolved`] naming the first
    /// package (in input order) no source knows, and with
    /// [`Error::Cancelled`] as soon as `cancel` fires.
    pub async fn resolve(
        &self,
        packages: &[PackageIdentity],
        cancel: &CancellationToken,
    ) -> Result<HashMap<PackageIdentity, PackageMetadata>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut seen = HashSet::new();
        let mut pending: Vec<PackageIdentity> = packages
            .iter()
            .filter(|p| seen.insert(*p))
            .cloned()
            .collect();
        let mut resolved = HashMap::with_capacity(pending.len());

        let cache = if self.options.no_cache {
            SourceCacheContext::without_cache()
        } else {
            SourceCacheContext::new()
        };
        let tiers: Vec<(&str, &[Arc<dyn MetadataSource>])> = [
            ("local", self.tiers.local.as_slice()),
            ("remote", self.tiers.remote.as_slice()),
        ]
        .into_iter()
        .filter(|(_, sources)| !sources.is_empty())
        .collect();
        let final_tier = tiers.len().saturating_sub(1);

        for (index, (tier, sources)) in tiers.into_iter().enumerate() {
            if pending.is_empty() {
                break;
            }
            debug!(
                tier,
                packages = pending.len(),
                session = %cache.session_id(),
                no_cache = cache.no_cache(),
                "resolving metadata"
            );

            let outcomes = self.resolve_tier(sources, &pending, &cache, cancel).await?;
            let mut unresolved = Vec::new();
            for (identity, outcome) in pending.into_iter().zip(outcomes) {
                match outcome {
                    TierLookup::Found(metadata) => {
                        resolved.insert(identity, metadata);
                    }
                    TierLookup::NotFound => unresolved.push(identity),
                    TierLookup::Failed(errors) if index == final_tier => {
                        return Err(Error::SourceLookup {
                            package: identity,
                            errors,
                        });
                    }
                    TierLookup::Failed(errors) => {
                        debug!(
                            tier,
                            package = %identity,
                            failures = errors.len(),
                            "all sources failed, deferring to next tier"
                        );
                        unresolved.push(identity);
                    }
                }
            }

            if !unresolved.is_empty() && index < final_tier {
                info!(
                    tier,
                    remaining = unresolved.len(),
                    "falling back to next source tier"
                );
            }
            pending = unresolved;
        }

        match pending.into_iter().next() {
            Some(identity) => Err(Error::Unresolved(identity)),
            None => Ok(resolved),
        }
    }

    /// Look every package up in one tier, at most `max_concurrency` at a
    /// time. Outcomes are returned in the order of `packages`.
    async fn resolve_tier(
        &self,
        sources: &[Arc<dyn MetadataSource>],
        packages: &[PackageIdentity],
        cache: &SourceCacheContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<TierLookup>> {
        let lookups = futures::stream::iter(packages.iter().enumerate())
            .map(|(index, identity)| async move {
                (index, self.lookup(sources, identity, cache).await)
            })
            .buffer_unordered(self.options.max_concurrency.max(1))
            .collect::<Vec<_>>();

        let mut finished = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            finished = lookups => finished,
        };

        finished.sort_by_key(|(index, _)| *index);
        Ok(finished.into_iter().map(|(_, outcome)| outcome).collect())
    }

    /// Try each source in priority order; the first hit wins.
    async fn lookup(
        &self,
        sources: &[Arc<dyn MetadataSource>],
        identity: &PackageIdentity,
        cache: &SourceCacheContext,
    ) -> TierLookup {
        let mut errors = Vec::new();
        let mut missed = false;

        for source in sources {
            let lookup = source.get_metadata(identity, cache);
            match tokio::time::timeout(self.options.lookup_timeout, lookup).await {
                Ok(Ok(Some(metadata))) => return TierLookup::Found(metadata),
                Ok(Ok(None)) => missed = true,
                Ok(Err(err)) => {
                    debug!(source = source.name(), package = %identity, error = %err, "metadata lookup failed");
                    errors.push(err);
                }
                Err(_) => {
                    debug!(source = source.name(), package = %identity, "metadata lookup timed out");
                    errors.push(SourceError::Timeout {
                        source_name: source.name().to_string(),
                        timeout_ms: self.options.lookup_timeout.as_millis() as u64,
                    });
                }
            }
        }

        if missed || errors.is_empty() {
            TierLookup::NotFound
        } else {
            TierLookup::Failed(errors)
        }
    }
}
