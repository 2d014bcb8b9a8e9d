//! Shared gateway state.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::GatewayResult;
use crate::guide_index::GuideIndex;
use crate::upstream::UpstreamClient;

/// Everything a request needs: configuration, the guide-index cache, and
/// the upstream client. Shared across handlers behind an `Arc`.
pub struct Gateway {
    pub config: Config,
    pub guides: GuideIndex,
    pub upstream: UpstreamClient,
    guide_root: PathBuf,
}

impl Gateway {
    pub fn new(config: Config) -> GatewayResult<Self> {
        let guides = GuideIndex::new(&config.guides.index, config.guides.cache_ttl());
        let upstream = UpstreamClient::from_config(&config.upstream)?;
        let guide_root = config.guides.root_dir();
        Ok(Self {
            config,
            guides,
            upstream,
            guide_root,
        })
    }

    /// Base directory for relative sidecar paths.
    pub fn guide_root(&self) -> &std::path::Path {
        &self.guide_root
    }
}
