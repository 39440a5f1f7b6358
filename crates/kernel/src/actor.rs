//! Actors owned by a zone: player heroes and monsters.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use gridrealm_ai::{AiTuning, MonsterAi};
use gridrealm_common::protocol::{ActorSnapshot, HeroSnapshot, MonsterSnapshot};
use gridrealm_common::{ClassType, EntityId, MonsterTemplate, ZoneId};
use gridrealm_grid::CellCoord;
use serde::{Deserialize, Serialize};

use crate::peer::RemotePeer;

/// Persisted hero state, as loaded by the session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroRecord {
    pub uid: i32,
    pub name: String,
    pub class_type: ClassType,
    pub exp: i32,
    pub level: i32,
    pub max_hp: i32,
    pub hp: i32,
    pub max_mp: i32,
    pub mp: i32,
    pub att: i32,
    pub def: i32,
    pub map_id: i32,
    pub position: Vec3,
    #[serde(default)]
    pub rotation: f32,
}

/// Player avatar.
pub struct Hero {
    pub uid: i32,
    pub class_type: ClassType,
    pub exp: i32,
    pub level: i32,
    max_hp: i32,
    hp: i32,
    max_mp: i32,
    mp: i32,
    pub att: i32,
    pub def: i32,
    /// Map of the zone the hero is in, or was last in.
    pub map_id: i32,
    peer: Option<Arc<dyn RemotePeer>>,
    /// Last instance entered, reused when the hero returns to the same map.
    pub(crate) instance_zone: Option<(ZoneId, i32)>,
    pub(crate) regen_at: Duration,
}

impl std::fmt::Debug for Hero {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hero")
            .field("uid", &self.uid)
            .field("class_type", &self.class_type)
            .field("hp", &self.hp)
            .field("mp", &self.mp)
            .field("map_id", &self.map_id)
            .field("connected", &self.peer.is_some())
            .finish()
    }
}

impl Hero {
    pub fn max_hp(&self) -> i32 {
        self.max_hp
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn set_hp(&mut self, hp: i32) {
        self.hp = hp.clamp(0, self.max_hp);
    }

    pub fn max_mp(&self) -> i32 {
        self.max_mp
    }

    pub fn mp(&self) -> i32 {
        self.mp
    }

    pub fn set_mp(&mut self, mp: i32) {
        self.mp = mp.clamp(0, self.max_mp);
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    pub fn peer(&self) -> Option<&Arc<dyn RemotePeer>> {
        self.peer.as_ref()
    }

    pub fn instance_zone(&self) -> Option<(ZoneId, i32)> {
        self.instance_zone
    }
}

/// One-shot receivers of a monster's death.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathSubscriber {
    /// Free the spawn slot and schedule removal and respawn.
    Spawner { spawn_id: i32 },
}

/// Monster instance created from a template.
#[derive(Debug)]
pub struct Monster {
    pub uid: i32,
    pub type_id: i32,
    pub level: i32,
    max_hp: i32,
    hp: i32,
    pub max_mp: i32,
    pub mp: i32,
    pub att: i32,
    pub def: i32,
    pub spawn_id: Option<i32>,
    /// Taken out while it drives the monster.
    pub(crate) ai: Option<MonsterAi>,
    pub(crate) death_subscribers: Vec<DeathSubscriber>,
}

impl Monster {
    pub fn from_template(template: &MonsterTemplate, tuning: AiTuning) -> Self {
        let max_hp = template.max_hp.max(1);
        Self {
            uid: template.uid,
            type_id: template.type_id,
            level: template.level,
            max_hp,
            hp: max_hp,
            max_mp: template.max_mp,
            mp: template.max_mp,
            att: template.att,
            def: template.def,
            spawn_id: None,
            ai: Some(MonsterAi::new(tuning)),
            death_subscribers: Vec::new(),
        }
    }

    pub fn max_hp(&self) -> i32 {
        self.max_hp
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn set_hp(&mut self, hp: i32) {
        self.hp = hp.clamp(0, self.max_hp);
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    pub fn ai(&self) -> Option<&MonsterAi> {
        self.ai.as_ref()
    }

    pub fn subscribe_death(&mut self, subscriber: DeathSubscriber) {
        self.death_subscribers.push(subscriber);
    }
}

#[derive(Debug)]
pub enum ActorKind {
    Hero(Hero),
    Monster(Monster),
}

/// Anything with an identity and a place in a zone.
#[derive(Debug)]
pub struct Actor {
    pub id: EntityId,
    pub name: String,
    pub position: Vec3,
    pub rotation: f32,
    pub(crate) zone: Option<ZoneId>,
    pub(crate) current_cell: Option<CellCoord>,
    pub kind: ActorKind,
}

impl Actor {
    pub fn hero(record: &HeroRecord, peer: Option<Arc<dyn RemotePeer>>) -> Self {
        let max_hp = record.max_hp.max(1);
        let max_mp = record.max_mp.max(0);
        let hero = Hero {
            uid: record.uid,
            class_type: record.class_type,
            exp: record.exp,
            level: record.level,
            max_hp,
            hp: record.hp.clamp(0, max_hp),
            max_mp,
            mp: record.mp.clamp(0, max_mp),
            att: record.att,
            def: record.def,
            map_id: record.map_id,
            peer,
            instance_zone: None,
            regen_at: Duration::ZERO,
        };
        Self {
            id: EntityId::new(),
            name: record.name.clone(),
            position: record.position,
            rotation: record.rotation,
            zone: None,
            current_cell: None,
            kind: ActorKind::Hero(hero),
        }
    }

    pub fn monster(id: EntityId, template: &MonsterTemplate, tuning: AiTuning) -> Self {
        Self {
            id,
            name: template.name.clone(),
            position: Vec3::ZERO,
            rotation: 0.0,
            zone: None,
            current_cell: None,
            kind: ActorKind::Monster(Monster::from_template(template, tuning)),
        }
    }

    /// Zone currently holding this actor.
    pub fn zone(&self) -> Option<ZoneId> {
        self.zone
    }

    /// Grid cell the actor was last recorded in.
    pub fn current_cell(&self) -> Option<CellCoord> {
        self.current_cell
    }

    pub fn is_dead(&self) -> bool {
        match &self.kind {
            ActorKind::Hero(h) => h.is_dead(),
            ActorKind::Monster(m) => m.is_dead(),
        }
    }

    pub fn as_hero(&self) -> Option<&Hero> {
        match &self.kind {
            ActorKind::Hero(h) => Some(h),
            ActorKind::Monster(_) => None,
        }
    }

    pub fn as_hero_mut(&mut self) -> Option<&mut Hero> {
        match &mut self.kind {
            ActorKind::Hero(h) => Some(h),
            ActorKind::Monster(_) => None,
        }
    }

    pub fn as_monster(&self) -> Option<&Monster> {
        match &self.kind {
            ActorKind::Monster(m) => Some(m),
            ActorKind::Hero(_) => None,
        }
    }

    pub fn as_monster_mut(&mut self) -> Option<&mut Monster> {
        match &mut self.kind {
            ActorKind::Monster(m) => Some(m),
            ActorKind::Hero(_) => None,
        }
    }

    pub fn is_hero(&self) -> bool {
        self.as_hero().is_some()
    }

    pub fn hero_snapshot(&self) -> Option<HeroSnapshot> {
        self.as_hero().map(|h| self.describe_hero(h))
    }

    fn describe_hero(&self, h: &Hero) -> HeroSnapshot {
        HeroSnapshot {
            entity_id: self.id,
            uid: h.uid,
            name: self.name.clone(),
            class_type: h.class_type,
            exp: h.exp,
            level: h.level,
            max_hp: h.max_hp,
            hp: h.hp,
            max_mp: h.max_mp,
            mp: h.mp,
            att: h.att,
            def: h.def,
            map_id: h.map_id,
            position: self.position,
            rotation: self.rotation,
        }
    }

    /// Full state as shown to an observer.
    pub fn snapshot(&self) -> ActorSnapshot {
        match &self.kind {
            ActorKind::Hero(h) => ActorSnapshot::Hero(self.describe_hero(h)),
            ActorKind::Monster(m) => ActorSnapshot::Monster(MonsterSnapshot {
                entity_id: self.id,
                uid: m.uid,
                type_id: m.type_id,
                name: self.name.clone(),
                level: m.level,
                max_hp: m.max_hp,
                hp: m.hp,
                max_mp: m.max_mp,
                mp: m.mp,
                position: self.position,
                rotation: self.rotation,
            }),
        }
    }
}
