//! # Pullbox engine
//!
//! The cache-resolution engine behind the pullbox registry proxy: given an
//! artifact key, decide whether a cached copy is usable, fetch and
//! atomically persist a fresh copy when not, and answer conditional-GET
//! negotiation — all while guaranteeing cache paths can never escape the
//! configured root.
//!
//! The registry-specific pieces (URL routing, index rewriting, name
//! validation) live in the server crate; every adapter funnels into
//! [`CacheResolver::resolve`] here.

pub mod conditional;
pub mod config;
pub mod error;
pub mod fetch;
pub mod freshness;
pub mod resolver;
pub mod sandbox;

#[cfg(test)]
pub(crate) mod testutil;

pub use conditional::{CachedResponse, Validators};
pub use config::ResolverConfig;
pub use error::CacheError;
pub use fetch::{BodyTransform, UpstreamMethod, UpstreamRequest, create_client};
pub use freshness::ArtifactClass;
pub use resolver::CacheResolver;
