//! # bald-core
//!
//! Binary-array linked data: describe the groups and variables of a netCDF/HDF5-style file as
//! an RDF graph.
//!
//! ## Overview
//!
//! bald-core reads a description of an array container (its groups, variables, dimensions and
//! attributes), resolves the namespace prefixes and aliases the file declares, and builds an
//! in-memory graph of **entities**: containers, arrays and the references between arrays. The
//! graph can be validated against the ontologies it points at and serialized as RDF.
//!
//! ### Key Features
//!
//! - **Namespace resolution**: `prefix__term` attribute names, alias ontologies and JSON-LD
//!   prefix contexts all resolve predicates and objects to absolute URIs
//! - **Reference inference**: arrays sharing dimensions, or naming each other in
//!   reference-valued attributes, are linked with broadcast-compatible reshapes
//! - **Cached HTTP**: every remote document is fetched at most once per [http::UriCache]
//! - **Error tolerance**: problems that only cost a statement are reported as
//!   [build::LoadDiagnostic]s instead of failing the load
//!
//! ## Architecture
//!
//! - **[`source`]**: the in-memory dataset description (TOML, JSON or YAML on disk)
//! - **[`namespace`]**: prefix and alias tables, the ontology index and the [namespace::Resolver]
//! - **[`build`]**: the two-pass [build::Loader] producing a [graph::GraphModel]
//! - **[`validation`]**: URI reachability and broadcast checks
//! - **[`serialize`]**: RDF output
//! - **[`http`]**: fetchers and the shared response cache
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bald_core::{
//!     build::Loader,
//!     config::BaldConfig,
//!     serialize::{GraphSerializer, OutputFormat},
//!     validation::Validator,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BaldConfig::default().with_base_uri("http://example.org/sonar.nc");
//!     let loader = Loader::new(config)?;
//!     let result = loader.load_path("sonar.toml")?;
//!
//!     let validation =
//!         Validator::new(loader.cache(), loader.config().validation.clone()).validate(&result.model)?;
//!     for message in validation.messages() {
//!         eprintln!("{message}");
//!     }
//!
//!     let turtle = GraphSerializer::new(&result.model).serialize(OutputFormat::Turtle)?;
//!     println!("{turtle}");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **default**: library only
//! - **bin**: the `bald` command line front-end

pub mod build;
pub mod config;
pub mod error;
pub mod graph;
pub mod http;
pub mod namespace;
pub mod properties;
pub mod serialize;
pub mod source;
#[cfg(test)]
mod tests;
pub mod validation;

pub use error::*;
