use std::{collections::BTreeSet, sync::Arc};

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::{
    config::PingConfig,
    error::PingError,
    marker::{Location, Marker, OwnershipKey, PlaceRequest, VisualKind},
    service::MarkerService,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Player {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickAction {
    RightClickAir,
    RightClickBlock,
    LeftClickAir,
    LeftClickBlock,
    /// stepping on pressure plates, trampling crops etc..
    Physical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldItem {
    /// type name, eg: `STONE` or `DIAMOND_SWORD`
    pub kind: String,
    /// whether the item can be placed as a block
    pub is_block: bool,
    /// custom name given to the item. `None` for unnamed items
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One click by a player, with the look-at point already resolved by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub player: Player,
    pub action: ClickAction,
    pub held_item: HeldItem,
    /// eye position of the player
    pub origin: Location,
    /// Where the player's line of sight hits a block, in the origin's world. Fluids are not hit.
    /// `None` when nothing is in range.
    #[serde(default)]
    pub hit: Option<DVec3>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    PermissionDenied,
    NoDisplayName,
    MissingPrefix,
    EmptyLabel,
    NoTarget,
    UnhandledAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum Outcome {
    Ignored(IgnoreReason),
    Placed(Marker),
    Removed(Vec<Marker>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Handled {
    /// whether the host should cancel the original click (so that the block isn't placed or broken)
    pub cancel_event: bool,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Handled {
    fn ignored(cancel_event: bool, reason: IgnoreReason) -> Self {
        debug!(?reason, "ignored interaction");
        Self {
            cancel_event,
            outcome: Outcome::Ignored(reason),
        }
    }
}

/// Turns clicks with a ping item into marker placement and removal.
///
/// Right click places a marker at the look-at point. Left click removes the player's own markers
/// with the same item and label around the look-at point.
pub struct PingHandler {
    service: Arc<MarkerService>,
    config: PingConfig,
}

impl PingHandler {
    pub fn new(service: Arc<MarkerService>, config: PingConfig) -> Self {
        Self { service, config }
    }

    pub fn service(&self) -> &MarkerService {
        &self.service
    }

    /// Label of a ping item, if `display_name` starts with the marker prefix.
    pub fn label_of<'a>(&self, display_name: &'a str) -> Option<&'a str> {
        display_name.strip_prefix(self.config.marker_prefix)
    }

    pub fn handle(&self, interaction: &Interaction) -> Result<Handled, PingError> {
        let _span = info_span!(
            "ping interaction",
            player = %interaction.player.name,
            action = ?interaction.action
        )
        .entered();

        if !interaction.player.has_permission(&self.config.permission) {
            return Ok(Handled::ignored(false, IgnoreReason::PermissionDenied));
        }
        let Some(display_name) = interaction.held_item.display_name.as_deref() else {
            return Ok(Handled::ignored(false, IgnoreReason::NoDisplayName));
        };
        let Some(label) = self.label_of(display_name) else {
            return Ok(Handled::ignored(false, IgnoreReason::MissingPrefix));
        };
        // from here on this is a ping item. the click must never reach the world.
        if label.is_empty() && !self.config.allow_empty_label {
            return Ok(Handled::ignored(true, IgnoreReason::EmptyLabel));
        }
        let Some(target) = self.target_of(interaction) else {
            return Ok(Handled::ignored(true, IgnoreReason::NoTarget));
        };
        let key = OwnershipKey::new(
            interaction.player.name.as_str(),
            interaction.held_item.kind.as_str(),
            label,
        );

        let outcome = match interaction.action {
            ClickAction::RightClickAir | ClickAction::RightClickBlock => {
                let visual = if interaction.held_item.is_block {
                    VisualKind::Block
                } else {
                    VisualKind::DroppedItem
                };
                let marker = self.service.place(PlaceRequest {
                    key,
                    location: target,
                    visual,
                })?;
                Outcome::Placed(marker)
            }
            ClickAction::LeftClickAir | ClickAction::LeftClickBlock => {
                let removed = self.service.remove_matching(
                    &key,
                    &target,
                    self.config.removal_half_extents,
                );
                debug!(count = removed.len(), "removed nearby markers");
                Outcome::Removed(removed)
            }
            ClickAction::Physical => {
                return Ok(Handled::ignored(true, IgnoreReason::UnhandledAction));
            }
        };
        Ok(Handled {
            cancel_event: true,
            outcome,
        })
    }

    fn target_of(&self, interaction: &Interaction) -> Option<Location> {
        let hit = interaction.hit?;
        if !hit.is_finite()
            || hit.distance(interaction.origin.position) > self.config.max_target_distance
        {
            return None;
        }
        Some(interaction.origin.with_position(hit))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use glam::DVec3;
    use rstest::*;
    use similar_asserts::assert_eq;

    use super::{ClickAction, HeldItem, IgnoreReason, Interaction, Outcome, PingHandler, Player};
    use crate::{
        config::PingConfig,
        marker::{Location, OwnershipKey, VisualKind},
        service::MarkerService,
        world::testing::RecordingWorld,
    };

    fn handler_with(config: PingConfig) -> PingHandler {
        let world = Arc::new(RecordingWorld::default());
        let service = Arc::new(MarkerService::new(&config, world).unwrap());
        PingHandler::new(service, config)
    }

    #[fixture]
    fn handler() -> PingHandler {
        handler_with(PingConfig::default())
    }

    fn click(player: &str, action: ClickAction, display_name: Option<&str>) -> Interaction {
        Interaction {
            player: Player {
                name: player.to_string(),
                permissions: ["ping".to_string()].into(),
            },
            action,
            held_item: HeldItem {
                kind: "STONE".to_string(),
                is_block: true,
                display_name: display_name.map(str::to_string),
            },
            origin: Location::new("world", DVec3::new(0.0, 1.6, 0.0)),
            hit: Some(DVec3::new(0.0, 0.0, 5.0)),
        }
    }

    fn ignore_reason(handler: &PingHandler, interaction: &Interaction) -> (bool, IgnoreReason) {
        let handled = handler.handle(interaction).unwrap();
        match handled.outcome {
            Outcome::Ignored(reason) => (handled.cancel_event, reason),
            other => panic!("expected the interaction to be ignored, got {other:?}"),
        }
    }

    #[rstest]
    fn denied_players_are_ignored(handler: PingHandler) {
        let mut interaction = click("A", ClickAction::RightClickBlock, Some("!x"));
        interaction.player.permissions.clear();
        assert_eq!(
            ignore_reason(&handler, &interaction),
            (false, IgnoreReason::PermissionDenied)
        );
        assert!(handler.service().is_empty());
    }

    #[rstest]
    #[case(None, IgnoreReason::NoDisplayName)]
    #[case(Some("x"), IgnoreReason::MissingPrefix)]
    #[case(Some(" !x"), IgnoreReason::MissingPrefix)]
    fn non_ping_items_do_not_cancel(
        handler: PingHandler,
        #[case] display_name: Option<&str>,
        #[case] reason: IgnoreReason,
    ) {
        let interaction = click("A", ClickAction::RightClickBlock, display_name);
        assert_eq!(ignore_reason(&handler, &interaction), (false, reason));
    }

    #[rstest]
    #[case(None)]
    // 60 blocks away
    #[case(Some(DVec3::new(0.0, 1.6, 60.0)))]
    #[case(Some(DVec3::new(f64::NAN, 0.0, 0.0)))]
    fn missing_target_still_cancels(handler: PingHandler, #[case] hit: Option<DVec3>) {
        let mut interaction = click("A", ClickAction::RightClickAir, Some("!x"));
        interaction.hit = hit;
        assert_eq!(
            ignore_reason(&handler, &interaction),
            (true, IgnoreReason::NoTarget)
        );
    }

    #[rstest]
    fn physical_actions_are_ignored(handler: PingHandler) {
        let interaction = click("A", ClickAction::Physical, Some("!x"));
        assert_eq!(
            ignore_reason(&handler, &interaction),
            (true, IgnoreReason::UnhandledAction)
        );
        assert!(handler.service().is_empty());
    }

    #[rstest]
    #[case(true, VisualKind::Block)]
    #[case(false, VisualKind::DroppedItem)]
    fn right_click_places(
        handler: PingHandler,
        #[case] is_block: bool,
        #[case] visual: VisualKind,
    ) {
        let mut interaction = click("A", ClickAction::RightClickBlock, Some("!rally here"));
        interaction.held_item.is_block = is_block;
        let handled = handler.handle(&interaction).unwrap();
        assert!(handled.cancel_event);
        let Outcome::Placed(marker) = handled.outcome else {
            panic!("expected a marker to be placed");
        };
        assert_eq!(marker.key, OwnershipKey::new("A", "STONE", "rally here"));
        assert_eq!(marker.visual, visual);
        assert_eq!(
            marker.location,
            Location::new("world", DVec3::new(0.0, 0.0, 5.0))
        );
        assert!(handler.service().is_active(marker.id));
    }

    #[rstest]
    fn left_click_removes_only_own_markers(handler: PingHandler) {
        let mine = click("A", ClickAction::RightClickBlock, Some("!x"));
        let theirs = click("B", ClickAction::RightClickBlock, Some("!x"));
        let other_label = click("A", ClickAction::RightClickBlock, Some("!y"));
        for interaction in [&mine, &theirs, &other_label] {
            handler.handle(interaction).unwrap();
        }
        assert_eq!(handler.service().len(), 3);

        let mut remove = click("A", ClickAction::LeftClickAir, Some("!x"));
        // inside the 3 block box around the marker, but not within 3 blocks of it
        remove.hit = Some(DVec3::new(2.5, 2.5, 7.5));
        let handled = handler.handle(&remove).unwrap();
        assert!(handled.cancel_event);
        let Outcome::Removed(removed) = handled.outcome else {
            panic!("expected markers to be removed");
        };
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].key, OwnershipKey::new("A", "STONE", "x"));
        assert_eq!(handler.service().len(), 2);

        // nothing left to remove for A/x
        let handled = handler.handle(&remove).unwrap();
        assert_eq!(handled.outcome, Outcome::Removed(vec![]));
    }

    #[rstest]
    fn empty_label_allowed_by_default(handler: PingHandler) {
        let handled = handler
            .handle(&click("A", ClickAction::RightClickBlock, Some("!")))
            .unwrap();
        let Outcome::Placed(marker) = handled.outcome else {
            panic!("expected a marker to be placed");
        };
        assert_eq!(marker.key.label.as_str(), "");
    }

    #[rstest]
    fn empty_label_can_be_disallowed() {
        let handler = handler_with(PingConfig {
            allow_empty_label: false,
            ..Default::default()
        });
        let interaction = click("A", ClickAction::RightClickBlock, Some("!"));
        assert_eq!(
            ignore_reason(&handler, &interaction),
            (true, IgnoreReason::EmptyLabel)
        );
    }

    #[rstest]
    fn custom_prefix_and_permission() {
        let handler = handler_with(PingConfig {
            marker_prefix: '#',
            permission: "markers.use".to_string(),
            ..Default::default()
        });
        let mut interaction = click("A", ClickAction::RightClickBlock, Some("#x"));
        assert_eq!(
            ignore_reason(&handler, &interaction),
            (false, IgnoreReason::PermissionDenied)
        );
        interaction.player.permissions.insert("markers.use".to_string());
        assert!(matches!(
            handler.handle(&interaction).unwrap().outcome,
            Outcome::Placed(_)
        ));
        assert_eq!(handler.label_of("!x"), None);
    }

    #[rstest]
    fn interactions_parse_from_json() {
        let interaction: Interaction = serde_json::from_str(
            r#"{
                "player": { "name": "A", "permissions": ["ping"] },
                "action": "left_click_block",
                "held_item": { "kind": "TORCH", "is_block": true, "display_name": "!camp" },
                "origin": { "world": "world", "position": [0.0, 65.6, 0.0] },
                "hit": [1.0, 64.0, 3.0]
            }"#,
        )
        .unwrap();
        assert_eq!(interaction.action, ClickAction::LeftClickBlock);
        assert_eq!(interaction.held_item.display_name.as_deref(), Some("!camp"));
        assert_eq!(interaction.hit, Some(DVec3::new(1.0, 64.0, 3.0)));
    }
}
