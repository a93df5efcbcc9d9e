//! # Instancing Error Types
//!
//! Build and lookup failures are recoverable and returned. Resource-lifetime
//! violations that would corrupt GPU state are assertions instead.

use thiserror::Error;

use crate::mesh::Semantic;

/// Boxed error produced by a mesh rasterizer.
pub type RasterizeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while turning a rasterized mesh into an instancer.
///
/// A failed build leaves the cache entry absent; the next `get` for the
/// same key retries.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The rasterizer collaborator failed.
    #[error("mesh rasterization failed: {0}")]
    Rasterize(#[source] RasterizeError),

    /// The vertex stream is not made of whole quads.
    #[error("vertex stream of {vertex_count} vertices is not a whole number of quads")]
    IncompleteQuad {
        /// Number of vertices received.
        vertex_count: usize,
    },

    /// The model format asks for an attribute a rasterized vertex cannot supply.
    #[error("model format attribute {semantic:?} cannot be filled from rasterized vertices")]
    UnsupportedAttribute {
        /// The attribute semantic that has no source.
        semantic: Semantic,
    },
}

/// Errors raised by instance handle operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceError {
    /// The handle was removed or cleared away.
    #[error("instance handle {0:?} is stale (removed or cleared)")]
    StaleHandle(crate::instancing::InstanceHandle),

    /// The handle belongs to a different instancer.
    #[error("instance handle {handle:?} was issued by instancer {owner}, not {instancer}")]
    ForeignHandle {
        /// The offending handle.
        handle: crate::instancing::InstanceHandle,
        /// Instancer that issued the handle.
        owner: u32,
        /// Instancer it was used on.
        instancer: u32,
    },

    /// The instancer's resources were released; it must not be used again.
    #[error("instancer {0} has been deleted")]
    Deleted(u32),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for mesh builds.
pub type BuildResult<T> = Result<T, BuildError>;

/// Result type for instance operations.
pub type InstanceResult<T> = Result<T, InstanceError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
