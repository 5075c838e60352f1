use miette::Diagnostic;
use thiserror::Error;

use crate::marker::MarkerId;

#[derive(Diagnostic, Debug, Error)]
pub enum PingError {
    #[error("world refused to spawn the visuals of marker {id}")]
    #[diagnostic(code(ping_error::spawn_failed))]
    SpawnFailed {
        id: MarkerId,
        #[source]
        source: WorldError,
    },
    #[error(transparent)]
    #[diagnostic(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error("failed to start the marker expiry thread")]
    #[diagnostic(code(ping_error::expiry_thread))]
    ExpiryThread(#[source] std::io::Error),
}

/// Errors reported by a [`crate::world::WorldSurface`] implementation.
#[derive(Diagnostic, Debug, Error)]
#[diagnostic()]
pub enum WorldError {
    #[error("world {0:?} is not loaded")]
    #[diagnostic(code(world_error::unknown_world))]
    UnknownWorld(String),
    #[error("no visuals exist for marker {0}")]
    #[diagnostic(code(world_error::unknown_marker))]
    UnknownMarker(MarkerId),
    #[error("the host does not support this visual property: {0}")]
    #[diagnostic(code(world_error::unsupported))]
    Unsupported(&'static str),
    #[error("{0}")]
    #[diagnostic(code(world_error::host))]
    Host(String),
}

#[derive(Diagnostic, Debug, Error)]
#[diagnostic()]
pub enum ConfigError {
    #[error("marker_ttl_ticks must be greater than zero")]
    #[diagnostic(
        code(config_error::zero_ttl),
        help("the default is 6000 ticks, which is 5 minutes")
    )]
    ZeroTtl,
    #[error("removal_half_extents must be finite and non-negative. got {0:?}")]
    #[diagnostic(code(config_error::removal_extents))]
    InvalidRemovalExtents([f64; 3]),
    #[error("max_target_distance must be finite and positive. got {0}")]
    #[diagnostic(code(config_error::target_distance))]
    InvalidTargetDistance(f64),
    #[error("group_tag must not be empty")]
    #[diagnostic(code(config_error::group_tag))]
    EmptyGroupTag,
}
