//! The seam between the marker service and whatever actually draws markers in the world.
//!
//! A marker is realised as two entities:
//! 1. an invisible, small, silent proxy whose only visible part is its name tag (the label)
//! 2. a glowing copy of the held item. Either a floating block or a dropped item that nobody can pick up.
//!
//! Both entities carry the group tag so that host tooling can query all pings at once.

use serde::Serialize;

use crate::{
    error::WorldError,
    marker::{Marker, MarkerId, VisualKind},
};

/// Implemented by the host. Calls never happen while the service holds its lock,
/// so an implementation is free to call back into [`crate::service::MarkerService`] queries.
pub trait WorldSurface: Send + Sync {
    /// create the label proxy and the secondary visual for a marker
    fn spawn(&self, request: &SpawnRequest) -> Result<(), WorldError>;
    /// Best effort tweaks of the secondary visual, applied right after a successful spawn.
    /// Failures are logged and ignored. Hosts without such knobs can keep the default.
    fn tune_visual(&self, _id: MarkerId, _tuning: &VisualTuning) -> Result<(), WorldError> {
        Ok(())
    }
    /// remove both visuals of a marker
    fn despawn(&self, marker: &Marker) -> Result<(), WorldError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpawnRequest {
    pub marker: Marker,
    /// tag attached to both entities
    pub group_tag: String,
    pub label_proxy: LabelProxy,
    pub secondary: SecondaryVisual,
}

impl SpawnRequest {
    pub fn new(marker: Marker, group_tag: impl Into<String>) -> Self {
        let secondary = SecondaryVisual::for_kind(marker.visual);
        Self {
            marker,
            group_tag: group_tag.into(),
            label_proxy: LabelProxy::default(),
            secondary,
        }
    }
}

/// Properties of the entity that shows the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelProxy {
    pub name_visible: bool,
    pub gravity: bool,
    pub body_visible: bool,
    pub invulnerable: bool,
    pub silent: bool,
    pub collidable: bool,
    pub small: bool,
}

impl Default for LabelProxy {
    fn default() -> Self {
        Self {
            name_visible: true,
            gravity: false,
            body_visible: false,
            invulnerable: true,
            silent: true,
            collidable: false,
            small: true,
        }
    }
}

/// Properties of the floating copy of the held item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SecondaryVisual {
    pub kind: VisualKind,
    pub gravity: bool,
    pub invulnerable: bool,
    pub glowing: bool,
    pub silent: bool,
    /// a floating block must not turn into an item drop when it despawns
    pub drops_item: bool,
    /// Block: the label rides the block. DroppedItem: the item rides the label.
    pub label_rides_visual: bool,
}

impl SecondaryVisual {
    pub fn for_kind(kind: VisualKind) -> Self {
        match kind {
            VisualKind::Block => Self {
                kind,
                gravity: false,
                invulnerable: true,
                glowing: true,
                silent: true,
                drops_item: false,
                label_rides_visual: true,
            },
            VisualKind::DroppedItem => Self {
                kind,
                gravity: true,
                invulnerable: true,
                glowing: true,
                silent: true,
                drops_item: false,
                label_rides_visual: false,
            },
        }
    }
}

/// Low level entity counters that most hosts only expose through internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisualTuning {
    /// Age of the entity in ticks. A very negative age keeps a floating block from
    /// despawning on its own, a maxed one keeps an item from merging or despawning.
    pub ticks_lived: Option<i32>,
    pub pickup_delay: Option<i32>,
    pub can_player_pickup: Option<bool>,
}

impl VisualTuning {
    pub const BLOCK_TICKS_LIVED: i32 = -100_000;

    pub fn for_kind(kind: VisualKind) -> Self {
        match kind {
            VisualKind::Block => Self {
                ticks_lived: Some(Self::BLOCK_TICKS_LIVED),
                pickup_delay: None,
                can_player_pickup: None,
            },
            VisualKind::DroppedItem => Self {
                ticks_lived: Some(i32::MAX),
                pickup_delay: Some(i32::MAX),
                can_player_pickup: Some(false),
            },
        }
    }
}
