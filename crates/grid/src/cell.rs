//! Per-cell membership ledger and listener registries.
//!
//! A cell does not call anybody. It records which actors are inside it and
//! which observers listen on each of its channels; the owning zone reads the
//! registries and routes events to the listed observers.

use std::collections::{BTreeMap, BTreeSet};

use gridrealm_common::EntityId;

use crate::grid::{CellCoord, GridCell};

/// Broadcast channels a cell exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// An actor crossed into or out of the cell.
    CellTransition,
    /// Per-actor delta published by an actor inside the cell.
    ActorUpdate,
}

/// Token returned by [`ZoneCell::subscribe`]. Disposing it twice is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub cell: CellCoord,
    pub channel: Channel,
    slot: u64,
}

#[derive(Debug, Clone, Default)]
struct Listeners {
    next_slot: u64,
    slots: BTreeMap<u64, EntityId>,
}

impl Listeners {
    fn add(&mut self, listener: EntityId) -> u64 {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(slot, listener);
        slot
    }

    fn remove(&mut self, slot: u64) -> bool {
        self.slots.remove(&slot).is_some()
    }

    fn snapshot(&self) -> Vec<EntityId> {
        self.slots.values().copied().collect()
    }
}

/// Grid cell of a zone.
#[derive(Debug, Clone)]
pub struct ZoneCell {
    pub coord: CellCoord,
    members: BTreeSet<EntityId>,
    transitions: Listeners,
    updates: Listeners,
}

impl GridCell for ZoneCell {
    fn at(coord: CellCoord) -> Self {
        Self {
            coord,
            members: BTreeSet::new(),
            transitions: Listeners::default(),
            updates: Listeners::default(),
        }
    }
}

impl ZoneCell {
    fn listeners_mut(&mut self, channel: Channel) -> &mut Listeners {
        match channel {
            Channel::CellTransition => &mut self.transitions,
            Channel::ActorUpdate => &mut self.updates,
        }
    }

    pub fn subscribe(&mut self, channel: Channel, listener: EntityId) -> Subscription {
        let slot = self.listeners_mut(channel).add(listener);
        Subscription {
            cell: self.coord,
            channel,
            slot,
        }
    }

    /// Returns false when the token was already disposed or belongs elsewhere.
    pub fn unsubscribe(&mut self, subscription: &Subscription) -> bool {
        if subscription.cell != self.coord {
            return false;
        }
        self.listeners_mut(subscription.channel)
            .remove(subscription.slot)
    }

    /// Current listeners on `channel` in subscription order.
    ///
    /// Returned by value so the caller may mutate the cell (or its neighbours)
    /// while delivering.
    pub fn listeners(&self, channel: Channel) -> Vec<EntityId> {
        match channel {
            Channel::CellTransition => self.transitions.snapshot(),
            Channel::ActorUpdate => self.updates.snapshot(),
        }
    }

    pub fn listener_count(&self, channel: Channel) -> usize {
        match channel {
            Channel::CellTransition => self.transitions.slots.len(),
            Channel::ActorUpdate => self.updates.slots.len(),
        }
    }

    /// Membership half of a cell transition: leave if this is the exiting
    /// cell, join if it is the entering one.
    pub fn on_actor_cell_change(
        &mut self,
        exiting: Option<CellCoord>,
        entering: Option<CellCoord>,
        actor: EntityId,
    ) {
        if exiting == Some(self.coord) {
            self.members.remove(&actor);
        }
        if entering == Some(self.coord) {
            self.members.insert(actor);
        }
    }

    pub fn members(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, actor: EntityId) -> bool {
        self.members.contains(&actor)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
