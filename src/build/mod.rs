//! Loading a [Dataset] into a [GraphModel].
//!
//! Loading runs in two passes. Pass 1 ([builder]) resolves the namespace declarations, indexes
//! the ontology documents they point at and creates one entity per group and variable. Pass 2
//! ([infer]) adds the references between arrays, once every entity exists.
//!
//! ```rust,no_run
//! use bald_core::{build::Loader, config::BaldConfig, source::Dataset};
//!
//! # fn main() -> Result<(), bald_core::BaldError> {
//! let config = BaldConfig::default().with_base_uri("http://example.org/sonar.nc");
//! let loader = Loader::new(config)?;
//! let result = loader.load(&Dataset::from_path("sonar.toml")?)?;
//! for diagnostic in &result.diagnostics {
//!     println!("{diagnostic}");
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
pub mod diagnostic;
mod infer;
pub mod reshape;
pub mod temporal;

pub use diagnostic::{DocumentProblem, LoadDiagnostic};
pub use reshape::{merge_dimensions, Reshape};
pub use temporal::{GregorianDecoder, TemporalDecoder};

use std::{path::Path, sync::Arc};

use crate::{
    config::BaldConfig,
    error::BaldError,
    graph::GraphModel,
    http::{StaticFetcher, UriCache},
    source::Dataset,
};
use builder::EntityBuilder;
use infer::ReferenceInferencer;

/// A loaded graph and everything that was skipped while building it.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub model: GraphModel,
    pub diagnostics: Vec<LoadDiagnostic>,
}

/// Loads datasets against one configuration and one shared [UriCache].
pub struct Loader {
    config: BaldConfig,
    cache: Arc<UriCache>,
    decoder: Box<dyn TemporalDecoder>,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Loader {
    /// A loader fetching over the network.
    pub fn new(config: BaldConfig) -> Result<Self, BaldError> {
        let cache = UriCache::from_options(&config.http)?;
        Ok(Self::with_cache(config, Arc::new(cache)))
    }

    /// A loader that never touches the network: only the config's `documents` are served.
    pub fn offline(config: BaldConfig) -> Result<Self, BaldError> {
        let fetcher = StaticFetcher::from_documents(&config.documents)?;
        let cache = UriCache::new(fetcher, config.http.cache_capacity);
        Ok(Self::with_cache(config, Arc::new(cache)))
    }

    pub fn with_cache(config: BaldConfig, cache: Arc<UriCache>) -> Self {
        Loader {
            config,
            cache,
            decoder: Box::new(GregorianDecoder),
        }
    }

    pub fn with_decoder<D: TemporalDecoder + 'static>(mut self, decoder: D) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn config(&self) -> &BaldConfig {
        &self.config
    }

    pub fn cache(&self) -> Arc<UriCache> {
        self.cache.clone()
    }

    /// Builds the entity graph of `dataset`.
    ///
    /// Fails on configuration problems: no base URI, colliding alias declarations, an
    /// ambiguous alias or an unparseable core ontology. Anything else that goes wrong is
    /// skipped and reported in [LoadResult::diagnostics].
    pub fn load(&self, dataset: &Dataset) -> Result<LoadResult, BaldError> {
        let mut builder = EntityBuilder::new(&self.config, &self.cache, self.decoder.as_ref());
        let (mut model, scopes) = builder.build(dataset)?;
        let mut diagnostics = std::mem::take(&mut builder.diagnostics);

        let mut inferencer = ReferenceInferencer::new(&mut model);
        inferencer.infer(&scopes)?;
        diagnostics.append(&mut inferencer.diagnostics);

        model.check_tree()?;
        tracing::info!(
            "Loaded {} entities with {} diagnostics",
            model.len(),
            diagnostics.len()
        );
        Ok(LoadResult { model, diagnostics })
    }

    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<LoadResult, BaldError> {
        let dataset = Dataset::from_path(path)?;
        self.load(&dataset)
    }
}
