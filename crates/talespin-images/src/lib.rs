//! Image normalization and serving pipeline.
//!
//! ## Pipeline
//!
//! - [`loader`] — scans configured directories for supported source images
//! - [`transcoder`] — content-addressed, pipeline-versioned cache of card artifacts
//! - [`registry`] — stable-ID mapping from registry cards to cache artifacts
//!
//! Boot wires these together: `loader::discover` → `transcoder::CardCache` →
//! `registry::CardRegistry::build`. After boot the registry is immutable and
//! freely shared; the room engine only reads from it.

mod error;
pub mod loader;
pub mod registry;
pub mod transcoder;

pub use error::PipelineError;
pub use loader::SourceRef;
pub use registry::Card;
pub use registry::CardRegistry;
pub use transcoder::CardCache;
pub use transcoder::TransformSpec;

use talespin_core::Config;

/// Runs the full boot pipeline: discover sources, transcode to cache, build
/// the registry. Fails fatally (per spec) if zero cards survive.
pub async fn bootstrap(config: &Config) -> Result<CardRegistry, PipelineError> {
    let sources = loader::discover(config)?;
    log::info!("image loader found {} candidate source(s)", sources.len());

    let spec = TransformSpec::from_config(config);
    let cache = CardCache::new(config.cache_dir.join("cards"))?;

    registry::CardRegistry::build(sources, &cache, &spec, config.validate_cache_hits, config.card_avif_threads)
        .await
}
