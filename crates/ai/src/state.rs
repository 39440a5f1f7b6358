//! State topology of the monster controller, kept as data.

use glam::Vec3;
use gridrealm_common::EntityId;
use std::time::Duration;

/// Every state of the controller, composite and leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    NonCombat,
    Idle,
    Patrol,
    Combat,
    Chase,
    Attack,
    Dead,
}

impl StateId {
    pub const ALL: [StateId; 7] = [
        StateId::NonCombat,
        StateId::Idle,
        StateId::Patrol,
        StateId::Combat,
        StateId::Chase,
        StateId::Attack,
        StateId::Dead,
    ];

    pub fn parent(self) -> Option<StateId> {
        match self {
            StateId::Idle | StateId::Patrol => Some(StateId::NonCombat),
            StateId::Chase | StateId::Attack => Some(StateId::Combat),
            StateId::NonCombat | StateId::Combat | StateId::Dead => None,
        }
    }

    /// Child entered when a transition targets this composite state.
    pub fn initial_child(self) -> Option<StateId> {
        match self {
            StateId::NonCombat => Some(StateId::Idle),
            StateId::Combat => Some(StateId::Chase),
            _ => None,
        }
    }

    pub fn is_leaf(self) -> bool {
        self.initial_child().is_none()
    }

    /// Chain from the outermost ancestor down to `self`.
    pub fn path(self) -> Vec<StateId> {
        let mut path = vec![self];
        let mut cur = self;
        while let Some(parent) = cur.parent() {
            path.push(parent);
            cur = parent;
        }
        path.reverse();
        path
    }

    /// `self` equals `other` or lies below it.
    pub fn is_within(self, other: StateId) -> bool {
        self.path().contains(&other)
    }
}

/// Active leaf together with its per-state data.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Leaf {
    Idle { patrol_at: Duration },
    Patrol { target: Option<Vec3> },
    Chase,
    Attack { next_attack_at: Duration },
    Dead,
}

impl Leaf {
    pub(crate) fn id(&self) -> StateId {
        match self {
            Leaf::Idle { .. } => StateId::Idle,
            Leaf::Patrol { .. } => StateId::Patrol,
            Leaf::Chase => StateId::Chase,
            Leaf::Attack { .. } => StateId::Attack,
            Leaf::Dead => StateId::Dead,
        }
    }
}

/// Inputs of the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AiEvent {
    /// Per-frame update; seconds since the previous frame.
    Tick(f32),
    Die,
    EngageCombat(EntityId),
    PatrolTimerElapsed,
    ChoosePatrolTarget,
}

/// Outcome of offering an event to one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reaction {
    Discard,
    /// Not handled here; offer to the parent.
    Forward,
    Transit(StateId),
}
