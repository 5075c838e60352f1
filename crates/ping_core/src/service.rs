use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::{Duration, Instant},
};

use glam::DVec3;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    config::PingConfig,
    error::PingError,
    expiry::ExpiryScheduler,
    marker::{Location, Marker, MarkerId, NearbyBox, OwnershipKey, PlaceRequest},
    world::{SpawnRequest, VisualTuning, WorldSurface},
};

/// Keeps track of every live marker.
///
/// 1. `place` spawns the visuals through the [`WorldSurface`], stores the marker and schedules its expiry
/// 2. `find_removable` / `find_within` look up markers by ownership triple inside a box
/// 3. `remove` deletes a marker exactly once, whether it's a player or the expiry timer asking
///
/// The service can be shared between threads. Removal takes the marker out of the active set under
/// the lock, and only the caller who got it back despawns the visuals.
pub struct MarkerService {
    core: Arc<ServiceCore>,
    expiry: ExpiryScheduler,
    ttl: Duration,
    group_tag: String,
}

struct ServiceCore {
    active: Mutex<BTreeMap<MarkerId, Marker>>,
    world: Arc<dyn WorldSurface>,
}

impl ServiceCore {
    fn active(&self) -> MutexGuard<'_, BTreeMap<MarkerId, Marker>> {
        // world surface calls never run under this lock. recover from poisoning anyway
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// returns the marker if this call was the one that removed it
    fn remove(&self, id: MarkerId) -> Option<Marker> {
        let marker = self.active().remove(&id)?;
        if let Err(e) = self.world.despawn(&marker) {
            warn!(?e, %id, "failed to despawn marker visuals");
        }
        Some(marker)
    }
}

impl MarkerService {
    pub fn new(config: &PingConfig, world: Arc<dyn WorldSurface>) -> Result<Self, PingError> {
        config.validate()?;
        let core = Arc::new(ServiceCore {
            active: Default::default(),
            world,
        });
        let weak_core: Weak<ServiceCore> = Arc::downgrade(&core);
        let expiry = ExpiryScheduler::spawn(move |id| {
            if let Some(core) = weak_core.upgrade() {
                if let Some(marker) = core.remove(id) {
                    debug!(%id, label = %marker.key.label, "marker expired");
                }
            }
        })?;
        Ok(Self {
            core,
            expiry,
            ttl: config.marker_ttl(),
            group_tag: config.group_tag.clone(),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creates a marker that lives for [`Self::ttl`].
    ///
    /// If the world refuses to spawn its visuals, nothing is stored and the error is returned.
    /// A failure to apply [`VisualTuning`] only logs a warning.
    pub fn place(&self, request: PlaceRequest) -> Result<Marker, PingError> {
        let PlaceRequest {
            key,
            location,
            visual,
        } = request;
        let created_at = OffsetDateTime::now_utc();
        let deadline = Instant::now() + self.ttl;
        let marker = Marker {
            id: MarkerId::new(),
            key,
            location,
            created_at,
            expires_at: created_at + self.ttl,
            visual,
        };
        let id = marker.id;

        self.core
            .world
            .spawn(&SpawnRequest::new(marker.clone(), self.group_tag.as_str()))
            .map_err(|source| PingError::SpawnFailed { id, source })?;
        if let Err(e) = self
            .core
            .world
            .tune_visual(id, &VisualTuning::for_kind(visual))
        {
            warn!(?e, %id, "failed to tune marker visual");
        }

        self.core.active().insert(id, marker.clone());
        self.expiry.schedule(id, deadline);
        info!(
            %id,
            owner = %marker.key.owner,
            item_kind = %marker.key.item_kind,
            label = %marker.key.label,
            world = %marker.location.world,
            position = ?marker.location.position,
            "placed marker"
        );
        Ok(marker)
    }

    /// Active markers with exactly this ownership triple inside the cube of half size `radius` around `location`.
    pub fn find_removable(
        &self,
        key: &OwnershipKey,
        location: &Location,
        radius: f64,
    ) -> Vec<Marker> {
        self.find_within(key, &NearbyBox::cube(location.clone(), radius))
    }

    pub fn find_within(&self, key: &OwnershipKey, area: &NearbyBox) -> Vec<Marker> {
        self.core
            .active()
            .values()
            .filter(|marker| marker.key == *key && area.contains(&marker.location))
            .cloned()
            .collect()
    }

    /// Returns `true` if this call removed the marker. Removing an already removed marker does nothing.
    pub fn remove(&self, marker: &Marker) -> bool {
        self.remove_by_id(marker.id)
    }

    pub fn remove_by_id(&self, id: MarkerId) -> bool {
        match self.core.remove(id) {
            Some(_) => {
                self.expiry.cancel(id);
                debug!(%id, "removed marker");
                true
            }
            None => false,
        }
    }

    /// Removes the matching markers around `location` and returns the ones this call removed.
    pub fn remove_matching(
        &self,
        key: &OwnershipKey,
        location: &Location,
        half_extents: DVec3,
    ) -> Vec<Marker> {
        let area = NearbyBox::new(location.clone(), half_extents);
        self.find_within(key, &area)
            .into_iter()
            .filter(|marker| self.remove(marker))
            .collect()
    }

    /// Removes every active marker. Returns how many were removed.
    pub fn remove_all(&self) -> usize {
        let ids: Vec<MarkerId> = self.core.active().keys().copied().collect();
        ids.into_iter().filter(|id| self.remove_by_id(*id)).count()
    }

    pub fn get(&self, id: MarkerId) -> Option<Marker> {
        self.core.active().get(&id).cloned()
    }

    pub fn is_active(&self, id: MarkerId) -> bool {
        self.core.active().contains_key(&id)
    }

    pub fn active(&self) -> Vec<Marker> {
        self.core.active().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.core.active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.active().is_empty()
    }
}
