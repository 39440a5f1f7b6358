//! Interest area of a connected client.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;
use gridrealm_common::EntityId;
use gridrealm_common::protocol::Notify;
use gridrealm_grid::{CellCoord, Channel, Grid, InterestArea, InterestHooks, Subscription, ZoneCell};

use crate::actor::Actor;
use crate::peer::{RemotePeer, send_notify};

/// Interest area that turns visibility changes into notifications for one
/// remote peer and relays actor updates from every watched cell.
pub struct ClientInterestArea {
    area: InterestArea,
    peer: Arc<dyn RemotePeer>,
    updates: BTreeMap<CellCoord, Subscription>,
}

impl std::fmt::Debug for ClientInterestArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientInterestArea")
            .field("area", &self.area)
            .field("update_subscriptions", &self.updates.len())
            .finish()
    }
}

impl ClientInterestArea {
    pub fn new(observer: EntityId, peer: Arc<dyn RemotePeer>, position: Vec3, view: Vec3) -> Self {
        Self {
            area: InterestArea::new(observer, position, view),
            peer,
            updates: BTreeMap::new(),
        }
    }

    pub fn area(&self) -> &InterestArea {
        &self.area
    }

    /// Move the area and push appear/disappear messages for the delta.
    pub fn update_interest(
        &mut self,
        position: Vec3,
        grid: &mut Grid<ZoneCell>,
        actors: &BTreeMap<EntityId, Actor>,
    ) -> bool {
        self.area.set_position(position);
        let mut hooks = ClientHooks {
            peer: self.peer.as_ref(),
            actors,
            updates: Some(&mut self.updates),
        };
        self.area.update_interest(grid, &mut hooks)
    }

    pub fn on_actor_cell_change(
        &self,
        exiting: Option<CellCoord>,
        entering: Option<CellCoord>,
        actor: EntityId,
        actors: &BTreeMap<EntityId, Actor>,
    ) {
        let mut hooks = ClientHooks {
            peer: self.peer.as_ref(),
            actors,
            updates: None,
        };
        self.area
            .on_actor_cell_change(exiting, entering, actor, &mut hooks);
    }

    /// Relay an encoded update as is.
    pub fn on_actor_update(&self, bytes: &[u8]) {
        self.peer.send(bytes.to_vec());
    }

    pub fn send(&self, message: &Notify) {
        send_notify(self.peer.as_ref(), message);
    }

    /// Dispose every subscription this area holds on `grid`.
    pub fn release(&mut self, grid: &mut Grid<ZoneCell>) {
        for (coord, sub) in std::mem::take(&mut self.updates) {
            if let Some(cell) = grid.cell_mut(coord) {
                cell.unsubscribe(&sub);
            }
        }
        self.area.release(grid);
    }
}

struct ClientHooks<'a> {
    peer: &'a dyn RemotePeer,
    actors: &'a BTreeMap<EntityId, Actor>,
    updates: Option<&'a mut BTreeMap<CellCoord, Subscription>>,
}

impl InterestHooks for ClientHooks<'_> {
    fn on_cell_enter(&mut self, observer: EntityId, cell: &mut ZoneCell) {
        if let Some(updates) = self.updates.as_deref_mut() {
            let sub = cell.subscribe(Channel::ActorUpdate, observer);
            updates.insert(cell.coord, sub);
        }
    }

    fn on_cell_exit(&mut self, _observer: EntityId, cell: &mut ZoneCell) {
        if let Some(updates) = self.updates.as_deref_mut() {
            if let Some(sub) = updates.remove(&cell.coord) {
                cell.unsubscribe(&sub);
            }
        }
    }

    fn on_actor_enter(&mut self, actor: EntityId) {
        // Unknown ids come from stale members and are ignored.
        let Some(actor) = self.actors.get(&actor) else {
            return;
        };
        send_notify(self.peer, &Notify::Appear(actor.snapshot()));
    }

    fn on_actor_exit(&mut self, actor: EntityId) {
        send_notify(self.peer, &Notify::Disappear { entity_id: actor });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::MemoryPeer;
    use gridrealm_common::BoundingBox;

    fn grid() -> Grid<ZoneCell> {
        Grid::new(
            BoundingBox::new(Vec3::ZERO, Vec3::new(100.0, 10.0, 100.0)),
            Vec3::splat(10.0),
        )
        .unwrap()
    }

    #[test]
    fn watched_cells_carry_both_subscriptions() {
        let mut grid = grid();
        let peer = Arc::new(MemoryPeer::new());
        let observer = EntityId::new();
        let mut area = ClientInterestArea::new(observer, peer.clone(), Vec3::ZERO, Vec3::new(20.0, 1.0, 20.0));
        area.update_interest(Vec3::new(50.0, 0.0, 50.0), &mut grid, &BTreeMap::new());

        let watched = area.area().cells().to_vec();
        assert!(!watched.is_empty());
        for coord in &watched {
            let cell = grid.cell(*coord).unwrap();
            assert_eq!(cell.listeners(Channel::ActorUpdate), vec![observer]);
            assert_eq!(cell.listeners(Channel::CellTransition), vec![observer]);
        }

        area.release(&mut grid);
        assert!(grid.iter().all(|c| c.listener_count(Channel::ActorUpdate) == 0
            && c.listener_count(Channel::CellTransition) == 0));
    }

    #[test]
    fn leaving_a_cell_drops_its_update_subscription() {
        let mut grid = grid();
        let peer = Arc::new(MemoryPeer::new());
        let mut area = ClientInterestArea::new(EntityId::new(), peer, Vec3::ZERO, Vec3::splat(1.0));
        let actors = BTreeMap::new();
        area.update_interest(Vec3::new(5.0, 5.0, 5.0), &mut grid, &actors);
        area.update_interest(Vec3::new(15.0, 5.0, 5.0), &mut grid, &actors);

        let origin = grid.cell(CellCoord::new(0, 0, 0)).unwrap();
        assert_eq!(origin.listener_count(Channel::ActorUpdate), 0);
        let next = grid.cell(CellCoord::new(1, 0, 0)).unwrap();
        assert_eq!(next.listener_count(Channel::ActorUpdate), 1);
    }

    #[test]
    fn unknown_actor_enter_is_ignored_but_exit_is_sent() {
        let peer = Arc::new(MemoryPeer::new());
        let mut grid = grid();
        let mut area = ClientInterestArea::new(EntityId::new(), peer.clone(), Vec3::ZERO, Vec3::splat(1.0));
        let actors = BTreeMap::new();
        area.update_interest(Vec3::new(5.0, 5.0, 5.0), &mut grid, &actors);

        let ghost = EntityId::new();
        let here = Some(CellCoord::new(0, 0, 0));
        let elsewhere = Some(CellCoord::new(5, 0, 5));
        area.on_actor_cell_change(elsewhere, here, ghost, &actors);
        assert!(peer.is_empty());
        area.on_actor_cell_change(here, elsewhere, ghost, &actors);
        assert_eq!(peer.take(), vec![Notify::Disappear { entity_id: ghost }]);
    }
}
