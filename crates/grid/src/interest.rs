use std::cmp::Ordering;
use std::collections::BTreeMap;

use glam::Vec3;
use gridrealm_common::{BoundingBox, EntityId};
use tracing::{debug, trace};

use crate::cell::{Channel, Subscription, ZoneCell};
use crate::grid::{CellCoord, Grid};

/// Extension points of an interest area. Every hook defaults to a no-op.
///
/// `on_cell_enter`/`on_cell_exit` receive the cell itself so an extension
/// can attach its own subscriptions to it.
pub trait InterestHooks {
    fn on_cell_enter(&mut self, _observer: EntityId, _cell: &mut ZoneCell) {}
    fn on_cell_exit(&mut self, _observer: EntityId, _cell: &mut ZoneCell) {}
    fn on_actor_enter(&mut self, _actor: EntityId) {}
    fn on_actor_exit(&mut self, _actor: EntityId) {}
}

impl InterestHooks for () {}

/// Incremental area of interest of one observer over one zone grid.
///
/// The cell set is recomputed only on [`InterestArea::update_interest`], so it
/// may lag behind `position` between calls.
#[derive(Debug, Clone)]
pub struct InterestArea {
    observer: EntityId,
    position: Vec3,
    view: Vec3,
    cells: Vec<CellCoord>,
    subscriptions: BTreeMap<CellCoord, Subscription>,
}

impl InterestArea {
    pub fn new(observer: EntityId, position: Vec3, view: Vec3) -> Self {
        Self {
            observer,
            position,
            view,
            cells: Vec::new(),
            subscriptions: BTreeMap::new(),
        }
    }

    pub fn observer(&self) -> EntityId {
        self.observer
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn view_distance(&self) -> Vec3 {
        self.view
    }

    /// Watched cells in ascending coordinate order.
    pub fn cells(&self) -> &[CellCoord] {
        &self.cells
    }

    pub fn focus(&self) -> BoundingBox {
        BoundingBox::around(self.position, self.view)
    }

    pub fn is_watching(&self, coord: CellCoord) -> bool {
        self.cells.binary_search(&coord).is_ok()
    }

    /// Recompute the watched cell set and fire enter/exit hooks for the delta.
    ///
    /// For each entered cell the area subscribes to its transition channel,
    /// runs `on_cell_enter`, then reports every actor already inside through
    /// `on_actor_enter`. Exited cells mirror this. Returns false when the set
    /// did not change; no hook runs in that case.
    pub fn update_interest<H: InterestHooks + ?Sized>(
        &mut self,
        grid: &mut Grid<ZoneCell>,
        hooks: &mut H,
    ) -> bool {
        // coords_in yields ascending order already
        let new_cells = grid.coords_in(&self.focus());
        if new_cells == self.cells {
            return false;
        }

        let entered = sorted_difference(&new_cells, &self.cells);
        let exited = sorted_difference(&self.cells, &new_cells);
        debug!(
            observer = %self.observer,
            entered = entered.len(),
            exited = exited.len(),
            "interest area changed"
        );

        for coord in entered {
            let Some(cell) = grid.cell_mut(coord) else {
                continue;
            };
            let sub = cell.subscribe(Channel::CellTransition, self.observer);
            self.subscriptions.insert(coord, sub);
            hooks.on_cell_enter(self.observer, cell);
            for actor in cell.members() {
                hooks.on_actor_enter(actor);
            }
        }

        for coord in exited {
            let Some(cell) = grid.cell_mut(coord) else {
                continue;
            };
            if let Some(sub) = self.subscriptions.remove(&coord) {
                cell.unsubscribe(&sub);
            }
            hooks.on_cell_exit(self.observer, cell);
            for actor in cell.members() {
                hooks.on_actor_exit(actor);
            }
        }

        self.cells = new_cells;
        true
    }

    /// React to an actor crossing between two cells, one of which this area
    /// listens on.
    ///
    /// Leaving the watched region reports an exit, arriving reports an entry.
    /// Moves that stay entirely inside or outside report nothing.
    pub fn on_actor_cell_change<H: InterestHooks + ?Sized>(
        &self,
        exiting: Option<CellCoord>,
        entering: Option<CellCoord>,
        actor: EntityId,
        hooks: &mut H,
    ) {
        let was_in = exiting.is_some_and(|c| self.is_watching(c));
        let now_in = entering.is_some_and(|c| self.is_watching(c));
        match (was_in, now_in) {
            (true, false) => {
                trace!(observer = %self.observer, %actor, "actor left view");
                hooks.on_actor_exit(actor);
            }
            (false, true) => {
                trace!(observer = %self.observer, %actor, "actor entered view");
                hooks.on_actor_enter(actor);
            }
            _ => {}
        }
    }

    /// Drop every subscription and forget the watched cells. Safe to call
    /// more than once.
    pub fn release(&mut self, grid: &mut Grid<ZoneCell>) {
        for (coord, sub) in std::mem::take(&mut self.subscriptions) {
            if let Some(cell) = grid.cell_mut(coord) {
                cell.unsubscribe(&sub);
            }
        }
        self.cells.clear();
    }
}

/// Elements of `a` missing from `b`; both inputs sorted ascending.
fn sorted_difference(a: &[CellCoord], b: &[CellCoord]) -> Vec<CellCoord> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() {
        if j == b.len() {
            out.extend_from_slice(&a[i..]);
            break;
        }
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    out
}
