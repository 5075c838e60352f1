use glam::DVec3;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub Uuid);

impl MarkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}
impl Default for MarkerId {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// The triple that decides which markers a removal request may touch.
/// Two markers at the same spot with different owners never match each other's removals.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnershipKey {
    /// name of the player who placed the marker
    pub owner: String,
    /// type name of the held item, eg: `STONE`
    pub item_kind: String,
    /// display name of the held item without the marker prefix
    pub label: String,
}

impl OwnershipKey {
    pub fn new(
        owner: impl Into<String>,
        item_kind: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            item_kind: item_kind.into(),
            label: label.into(),
        }
    }
}

/// A position inside a named world. Positions in different worlds are never near each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub position: DVec3,
}

impl Location {
    pub fn new(world: impl Into<String>, position: DVec3) -> Self {
        Self {
            world: world.into(),
            position,
        }
    }
    /// same world, different position
    pub fn with_position(&self, position: DVec3) -> Self {
        Self {
            world: self.world.clone(),
            position,
        }
    }
}

/// Which floating copy accompanies the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    /// a glowing block replica with the label riding on top of it
    Block,
    /// a glowing item that can't be picked up, riding on the label
    DroppedItem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: MarkerId,
    pub key: OwnershipKey,
    pub location: Location,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub visual: VisualKind,
}

/// Everything the service needs from the caller to create a [`Marker`].
/// The label must already have its prefix stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceRequest {
    pub key: OwnershipKey,
    pub location: Location,
    pub visual: VisualKind,
}

/// Axis aligned search volume around a point.
///
/// A box, not a sphere. A marker at `(3, 3, 3)` is inside the box of
/// half extent 3 around the origin even though it is ~5.2 blocks away.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyBox {
    pub center: Location,
    pub half_extents: DVec3,
}

impl NearbyBox {
    pub fn new(center: Location, half_extents: DVec3) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
        }
    }
    pub fn cube(center: Location, radius: f64) -> Self {
        Self::new(center, DVec3::splat(radius))
    }
    /// bounds are inclusive
    pub fn contains(&self, location: &Location) -> bool {
        if location.world != self.center.world {
            return false;
        }
        let d = (location.position - self.center.position).abs();
        d.cmple(self.half_extents).all()
    }
}
