use std::collections::VecDeque;
use std::time::Duration;

use glam::Vec3;
use gridrealm_common::EntityId;
use tracing::{debug, trace};

use crate::state::{AiEvent, Leaf, Reaction, StateId};
use crate::tuning::{AiTuning, PatrolDelay};

/// What the controller may learn about its current target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetView {
    pub position: Vec3,
    pub dead: bool,
}

/// Queries and actuators of the monster being driven.
///
/// Implemented by the zone for one monster at a time; the controller never
/// holds references to the monster or its zone between calls.
pub trait MonsterContext {
    /// Simulation clock.
    fn now(&self) -> Duration;
    fn position(&self) -> Vec3;
    fn rotation(&self) -> f32;
    fn set_rotation(&mut self, yaw_degrees: f32);
    /// Move actuator. `dt == 0` publishes a stop.
    fn move_to(&mut self, position: Vec3, dt: f32);
    fn attack(&mut self, target: EntityId);
    /// Resolve an actor in the same zone.
    fn find_target(&self, id: EntityId) -> Option<TargetView>;
    /// Zone bounds check used to abort steps.
    fn zone_contains(&self, position: Vec3) -> bool;
    /// Width and height of the map the monster is on.
    fn map_size(&self) -> (f32, f32);
    fn random_range(&mut self, low: f32, high: f32) -> f32;
}

/// Hierarchical monster behavior controller.
///
/// ```text
/// NonCombat ── Idle*, Patrol
/// Combat    ── Chase*, Attack
/// Dead
/// ```
///
/// An event is offered to the active leaf first and then to each ancestor
/// until one of them handles it. Events the controller posts to itself are
/// drained inside the same [`MonsterAi::process`] call.
#[derive(Debug, Clone)]
pub struct MonsterAi {
    tuning: AiTuning,
    leaf: Leaf,
    target: Option<EntityId>,
    started: bool,
    queue: VecDeque<AiEvent>,
}

impl MonsterAi {
    pub fn new(tuning: AiTuning) -> Self {
        Self {
            tuning,
            leaf: Leaf::Idle {
                patrol_at: Duration::ZERO,
            },
            target: None,
            started: false,
            queue: VecDeque::new(),
        }
    }

    /// Enter the initial state. Events before this are ignored.
    pub fn start<C: MonsterContext + ?Sized>(&mut self, ctx: &mut C) {
        if self.started {
            return;
        }
        self.started = true;
        self.enter(StateId::NonCombat, ctx);
        self.descend(StateId::NonCombat, ctx);
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Active leaf state.
    pub fn state(&self) -> StateId {
        self.leaf.id()
    }

    /// Whether the active leaf is `state` or lies below it.
    pub fn is_in(&self, state: StateId) -> bool {
        self.leaf.id().is_within(state)
    }

    /// Combat target; only set inside Combat.
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn tuning(&self) -> &AiTuning {
        &self.tuning
    }

    /// Handle `event` and everything it posts until the queue is empty.
    pub fn process<C: MonsterContext + ?Sized>(&mut self, event: AiEvent, ctx: &mut C) {
        if !self.started {
            trace!(?event, "ignoring event before start");
            return;
        }
        self.queue.push_back(event);
        while let Some(next) = self.queue.pop_front() {
            self.dispatch(next, ctx);
        }
    }

    fn dispatch<C: MonsterContext + ?Sized>(&mut self, event: AiEvent, ctx: &mut C) {
        let mut state = Some(self.leaf.id());
        while let Some(current) = state {
            match self.react(current, event, ctx) {
                Reaction::Forward => state = current.parent(),
                Reaction::Discard => return,
                Reaction::Transit(target) => {
                    self.transit(target, ctx);
                    return;
                }
            }
        }
        trace!(?event, "event unhandled");
    }

    fn react<C: MonsterContext + ?Sized>(
        &mut self,
        state: StateId,
        event: AiEvent,
        ctx: &mut C,
    ) -> Reaction {
        match (state, event) {
            (StateId::Dead, _) => Reaction::Discard,

            (StateId::Idle, AiEvent::Tick(_)) => match self.leaf {
                Leaf::Idle { patrol_at } if ctx.now() >= patrol_at => self.begin_patrol(),
                _ => Reaction::Discard,
            },
            (StateId::Idle, AiEvent::PatrolTimerElapsed) => self.begin_patrol(),

            (StateId::Patrol, AiEvent::Tick(dt)) => self.patrol_step(dt, ctx),
            (StateId::Patrol, AiEvent::ChoosePatrolTarget) => self.choose_patrol_target(ctx),

            (StateId::NonCombat, AiEvent::EngageCombat(target)) => {
                self.target = Some(target);
                Reaction::Transit(StateId::Combat)
            }
            (StateId::NonCombat | StateId::Combat, AiEvent::Die) => {
                Reaction::Transit(StateId::Dead)
            }
            (StateId::NonCombat | StateId::Combat, AiEvent::Tick(_)) => Reaction::Discard,

            (StateId::Chase, AiEvent::Tick(dt)) => self.chase_step(dt, ctx),
            (StateId::Attack, AiEvent::Tick(dt)) => self.attack_step(dt, ctx),

            _ => Reaction::Forward,
        }
    }

    fn transit<C: MonsterContext + ?Sized>(&mut self, target: StateId, ctx: &mut C) {
        let from = self.leaf.id();
        let from_path = from.path();
        let to_path = target.path();
        let shared = from_path
            .iter()
            .zip(&to_path)
            .take_while(|(a, b)| a == b)
            .count()
            // targeting an ancestor re-enters it
            .min(to_path.len() - 1);

        for state in from_path[shared..].iter().rev() {
            self.exit(*state, ctx);
        }
        for state in &to_path[shared..] {
            self.enter(*state, ctx);
        }
        self.descend(target, ctx);
        debug!(?from, to = ?self.leaf.id(), "monster state transition");
    }

    fn descend<C: MonsterContext + ?Sized>(&mut self, from: StateId, ctx: &mut C) {
        let mut current = from;
        while let Some(child) = current.initial_child() {
            self.enter(child, ctx);
            current = child;
        }
    }

    fn enter<C: MonsterContext + ?Sized>(&mut self, state: StateId, ctx: &mut C) {
        match state {
            StateId::Idle => {
                let delay = self.patrol_delay(ctx);
                self.leaf = Leaf::Idle {
                    patrol_at: ctx.now() + delay,
                };
            }
            StateId::Patrol => self.leaf = Leaf::Patrol { target: None },
            StateId::Chase => self.leaf = Leaf::Chase,
            StateId::Attack => {
                self.leaf = Leaf::Attack {
                    next_attack_at: ctx.now(),
                }
            }
            StateId::Dead => self.leaf = Leaf::Dead,
            StateId::NonCombat | StateId::Combat => {}
        }
    }

    fn exit<C: MonsterContext + ?Sized>(&mut self, state: StateId, ctx: &mut C) {
        match state {
            // Flush a stop so observers see the monster halt.
            StateId::Patrol | StateId::Chase => {
                let here = ctx.position();
                ctx.move_to(here, 0.0);
            }
            StateId::Combat => self.target = None,
            _ => {}
        }
    }

    fn patrol_delay<C: MonsterContext + ?Sized>(&self, ctx: &mut C) -> Duration {
        let secs = match self.tuning.patrol_delay {
            PatrolDelay::Fixed { secs } => secs,
            PatrolDelay::Uniform { min_secs, max_secs } if max_secs > min_secs => {
                ctx.random_range(min_secs, max_secs)
            }
            PatrolDelay::Uniform { min_secs, .. } => min_secs,
        };
        Duration::from_secs_f32(secs.max(0.0))
    }

    fn begin_patrol(&mut self) -> Reaction {
        self.queue.push_back(AiEvent::ChoosePatrolTarget);
        Reaction::Transit(StateId::Patrol)
    }

    fn choose_patrol_target<C: MonsterContext + ?Sized>(&mut self, ctx: &mut C) -> Reaction {
        let r = self.tuning.patrol_radius;
        let offset = Vec3::new(ctx.random_range(-r, r), 0.0, ctx.random_range(-r, r));
        let candidate = ctx.position() + offset;
        let (width, height) = ctx.map_size();
        let on_map = candidate.x > 0.0
            && candidate.x < width
            && candidate.z > 0.0
            && candidate.z < height;
        if !on_map {
            trace!(%candidate, "patrol target off map");
            return Reaction::Transit(StateId::Idle);
        }
        self.leaf = Leaf::Patrol {
            target: Some(candidate),
        };
        Reaction::Discard
    }

    fn patrol_step<C: MonsterContext + ?Sized>(&mut self, dt: f32, ctx: &mut C) -> Reaction {
        let Leaf::Patrol {
            target: Some(target),
        } = self.leaf
        else {
            return Reaction::Transit(StateId::Idle);
        };
        let origin = ctx.position();
        let dest = step_towards(origin, target, self.tuning.move_speed * dt);
        if !ctx.zone_contains(dest) {
            return Reaction::Transit(StateId::Idle);
        }
        ctx.set_rotation(yaw_degrees(origin, dest));
        ctx.move_to(dest, dt);

        if dest.distance_squared(target) <= self.tuning.arrival_epsilon_sq {
            return Reaction::Transit(StateId::Idle);
        }
        Reaction::Discard
    }

    /// Target id and position while it is still a valid opponent.
    fn engaged_target<C: MonsterContext + ?Sized>(&self, ctx: &C) -> Option<(EntityId, Vec3)> {
        let id = self.target?;
        match ctx.find_target(id) {
            Some(view) if !view.dead => Some((id, view.position)),
            _ => {
                debug!(target = %id, "combat target gone");
                None
            }
        }
    }

    fn chase_step<C: MonsterContext + ?Sized>(&mut self, dt: f32, ctx: &mut C) -> Reaction {
        let Some((_, target_position)) = self.engaged_target(ctx) else {
            return Reaction::Transit(StateId::NonCombat);
        };
        let origin = ctx.position();
        if origin.distance(target_position) <= self.tuning.attack_range {
            return Reaction::Transit(StateId::Attack);
        }
        let dest = step_towards(origin, target_position, self.tuning.move_speed * dt);
        if !ctx.zone_contains(dest) {
            return Reaction::Transit(StateId::NonCombat);
        }
        ctx.set_rotation(yaw_degrees(origin, dest));
        ctx.move_to(dest, dt);
        Reaction::Discard
    }

    fn attack_step<C: MonsterContext + ?Sized>(&mut self, dt: f32, ctx: &mut C) -> Reaction {
        let Some((target, target_position)) = self.engaged_target(ctx) else {
            return Reaction::Transit(StateId::NonCombat);
        };
        let origin = ctx.position();
        if origin.distance(target_position) > self.tuning.attack_range {
            return Reaction::Transit(StateId::Chase);
        }

        let facing = yaw_degrees(origin, target_position);
        let previous = ctx.rotation();
        ctx.set_rotation(facing);

        let cooldown = self.tuning.attack_cooldown();
        let Leaf::Attack { next_attack_at } = &mut self.leaf else {
            return Reaction::Discard;
        };
        let now = ctx.now();
        if now < *next_attack_at {
            if previous != facing {
                ctx.move_to(origin, dt);
            }
            return Reaction::Discard;
        }

        ctx.attack(target);
        *next_attack_at = now + cooldown;
        Reaction::Discard
    }
}

fn step_towards(origin: Vec3, target: Vec3, distance: f32) -> Vec3 {
    origin + (target - origin).normalize_or_zero() * distance
}

/// Heading in degrees, 0 facing +Z and 90 facing +X.
pub fn yaw_degrees(from: Vec3, to: Vec3) -> f32 {
    (to.x - from.x).atan2(to.z - from.z).to_degrees()
}
