//! Temporary "ping" markers for a multiplayer game world.
//!
//! A player right-clicks with an item named `!something` to drop a labelled marker at the
//! point they are looking at, and left-clicks with the same item to pick nearby ones up again.
//! Markers remove themselves after [`config::PingConfig::marker_ttl`].
//!
//! The crate does not render anything. The host implements [`world::WorldSurface`] and feeds
//! interactions into [`interaction::PingHandler`].

pub mod config;
pub mod error;
pub mod expiry;
pub mod init;
pub mod interaction;
pub mod marker;
pub mod service;
pub mod trace;
pub mod world;

/// Length of one server tick. Marker lifetimes are configured in ticks.
pub const TICK_DURATION: std::time::Duration = std::time::Duration::from_millis(50);

pub mod prelude {
    pub use crate::config::{ConfigManager, PingConfig};
    pub use crate::error::{ConfigError, PingError, WorldError};
    pub use crate::interaction::{
        ClickAction, Handled, HeldItem, IgnoreReason, Interaction, Outcome, PingHandler, Player,
    };
    pub use crate::marker::{
        Location, Marker, MarkerId, NearbyBox, OwnershipKey, PlaceRequest, VisualKind,
    };
    pub use crate::service::MarkerService;
    pub use crate::world::{SpawnRequest, VisualTuning, WorldSurface};
    pub use glam::DVec3;
    pub use miette;
    pub use miette::{bail, Context, Diagnostic, IntoDiagnostic, Result};
    pub use std::sync::Arc;
    pub use time::OffsetDateTime;
    pub use tracing::{debug, error, info, info_span, trace, warn};
}
