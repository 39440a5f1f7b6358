//! Client-facing notifications and their byte encoding.
//!
//! The simulation core only produces `Notify` values; framing and transport
//! belong to the session layer. Encoding is CBOR.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::types::{ClassType, EntityId, MapType, ZoneId};

/// Full hero state as shown to other clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroSnapshot {
    pub entity_id: EntityId,
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
    pub rotation: f32,
}

/// Full monster state as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterSnapshot {
    pub entity_id: EntityId,
    pub uid: i32,
    pub type_id: i32,
    pub name: String,
    pub level: i32,
    pub max_hp: i32,
    pub hp: i32,
    pub max_mp: i32,
    pub mp: i32,
    pub position: Vec3,
    pub rotation: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActorSnapshot {
    Hero(HeroSnapshot),
    Monster(MonsterSnapshot),
}

impl ActorSnapshot {
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Hero(h) => h.entity_id,
            Self::Monster(m) => m.entity_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateType {
    Alive,
    Dead,
}

/// One typed delta about an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateData {
    Move {
        position: Vec3,
        rotation: f32,
        velocity: Vec3,
    },
    Skill {
        skill_id: i32,
        targets: Vec<EntityId>,
        rotation: f32,
    },
    Damage {
        amount: i32,
    },
    Attribute {
        max_hp: i32,
        hp: i32,
        max_mp: i32,
        mp: i32,
    },
    State(StateType),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorUpdate {
    pub entity_id: EntityId,
    pub data: UpdateData,
}

/// Gate as advertised to an entering client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateInfo {
    pub uid: i32,
    pub position: Vec3,
    pub dest_map_type: MapType,
}

/// Zone description sent to a newly entering client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub zone_id: ZoneId,
    pub map_id: i32,
    pub map_type: MapType,
    pub gates: Vec<GateInfo>,
}

/// Server to client notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notify {
    /// An actor came into view.
    Appear(ActorSnapshot),
    /// An actor left the view.
    Disappear { entity_id: EntityId },
    /// Delta about an actor already in view.
    Update(ActorUpdate),
    /// The receiving hero entered a zone.
    EnterSuccess {
        hero: HeroSnapshot,
        zone: ZoneSnapshot,
    },
}

/// Errors from the notification codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("CBOR serialization error: {0}")]
    Encode(String),
    #[error("CBOR deserialization error: {0}")]
    Decode(String),
}

pub fn encode(message: &Notify) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(message, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

pub fn decode(bytes: &[u8]) -> Result<Notify, CodecError> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
