use std::time::Duration;

use glam::Vec3;
use gridrealm_ai::{AiEvent, MonsterContext, TargetView};
use gridrealm_common::EntityId;
use gridrealm_common::protocol::{StateType, UpdateData};
use rand::Rng;
use tracing::{debug, info, trace};

use super::{Zone, ZoneContext};
use crate::actor::{Actor, ActorKind, DeathSubscriber};

impl Zone {
    /// Client move request. Dead or unknown heroes are ignored.
    pub fn hero_move(&mut self, id: EntityId, position: Vec3, rotation: f32, velocity: Vec3) -> bool {
        let position = self.check_boundary(position);
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        if !actor.as_hero().is_some_and(|h| !h.is_dead()) {
            return false;
        }
        actor.rotation = rotation;
        actor.position = position;
        self.refresh_interest(id);
        self.publish_actor_update(
            id,
            UpdateData::Move {
                position,
                rotation,
                velocity,
            },
        );
        true
    }

    /// Client skill request. Every listed target present in the zone takes
    /// `skill.damage + att`.
    pub fn hero_skill(
        &mut self,
        id: EntityId,
        skill_id: i32,
        rotation: f32,
        targets: &[EntityId],
        ctx: &mut ZoneContext<'_>,
    ) -> bool {
        let data = ctx.data;
        let Some(actor) = self.actors.get_mut(&id) else {
            return false;
        };
        let Some(hero) = actor.as_hero_mut() else {
            return false;
        };
        if hero.is_dead() {
            return false;
        }
        let Some(skill) = data.skill(skill_id) else {
            debug!(actor = %id, skill_id, "unknown skill");
            return false;
        };
        if skill.class_type != hero.class_type || skill.cost > hero.mp() {
            debug!(actor = %id, skill_id, "skill rejected");
            return false;
        }
        hero.set_mp(hero.mp() - skill.cost);
        let power = skill.damage + hero.att;
        actor.rotation = rotation;

        self.publish_actor_update(
            id,
            UpdateData::Skill {
                skill_id,
                targets: targets.to_vec(),
                rotation,
            },
        );
        for &target in targets {
            self.damage(target, id, power, ctx);
        }
        true
    }

    /// Apply `amount` reduced by the target's defence, at least 1.
    ///
    /// A monster target engages its attacker before the hit lands.
    pub fn damage(&mut self, target: EntityId, attacker: EntityId, amount: i32, ctx: &mut ZoneContext<'_>) {
        let Some(actor) = self.actors.get(&target) else {
            return;
        };
        if actor.is_dead() {
            return;
        }
        if !actor.is_hero() {
            self.drive_monster(target, AiEvent::EngageCombat(attacker), ctx);
        }

        let Some(actor) = self.actors.get_mut(&target) else {
            return;
        };
        let dealt = match &mut actor.kind {
            ActorKind::Hero(h) => {
                let dealt = (amount - h.def).max(1);
                h.set_hp(h.hp() - dealt);
                dealt
            }
            ActorKind::Monster(m) => {
                let dealt = (amount - m.def).max(1);
                m.set_hp(m.hp() - dealt);
                dealt
            }
        };
        let dead = actor.is_dead();
        debug!(%target, %attacker, amount = dealt, "damage dealt");
        self.publish_actor_update(target, UpdateData::Damage { amount: dealt });
        if dead {
            self.die(target, ctx);
        }
    }

    /// Kill a living actor outright.
    pub fn kill(&mut self, id: EntityId, ctx: &mut ZoneContext<'_>) -> bool {
        match self.actors.get(&id) {
            Some(actor) if !actor.is_dead() => {
                self.die(id, ctx);
                true
            }
            _ => false,
        }
    }

    fn die(&mut self, id: EntityId, ctx: &mut ZoneContext<'_>) {
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        let monster = match &mut actor.kind {
            ActorKind::Hero(h) => {
                h.set_hp(0);
                false
            }
            ActorKind::Monster(m) => {
                m.set_hp(0);
                true
            }
        };
        if monster {
            self.drive_monster(id, AiEvent::Die, ctx);
        }
        info!(zone = %self.id, actor = %id, "actor died");
        self.publish_actor_update(id, UpdateData::State(StateType::Dead));

        let subscribers = self
            .actors
            .get_mut(&id)
            .and_then(Actor::as_monster_mut)
            .map(|m| std::mem::take(&mut m.death_subscribers))
            .unwrap_or_default();
        for subscriber in subscribers {
            match subscriber {
                DeathSubscriber::Spawner { spawn_id } => {
                    self.with_spawner(ctx, |spawner, zone, ctx| {
                        spawner.on_death(zone, spawn_id, id, ctx)
                    });
                }
            }
        }
    }

    /// +amount hp and mp whenever the regen deadline passes. Only a real
    /// change is broadcast.
    pub(super) fn regenerate_hero(&mut self, id: EntityId, ctx: &mut ZoneContext<'_>) {
        let now = ctx.scheduler.now();
        let Some(hero) = self.actors.get_mut(&id).and_then(Actor::as_hero_mut) else {
            return;
        };
        if hero.is_dead() || now < hero.regen_at {
            return;
        }
        let (hp, mp) = (hero.hp(), hero.mp());
        hero.set_hp(hp + ctx.config.hero_regen_amount);
        hero.set_mp(mp + ctx.config.hero_regen_amount);
        hero.regen_at = now + ctx.config.hero_regen_interval();
        if hero.hp() == hp && hero.mp() == mp {
            return;
        }
        let data = UpdateData::Attribute {
            max_hp: hero.max_hp(),
            hp: hero.hp(),
            max_mp: hero.max_mp(),
            mp: hero.mp(),
        };
        self.publish_actor_update(id, data);
    }

    /// Ground-plane move issued by the AI. `dt == 0` flushes a stop.
    fn monster_move(&mut self, id: EntityId, position: Vec3, dt: f32) {
        let position = Vec3::new(position.x, 0.0, position.z);
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        if actor.is_dead() {
            return;
        }
        let velocity = if dt > 0.0 {
            (position - actor.position) / dt
        } else {
            Vec3::ZERO
        };
        actor.position = position;
        let rotation = actor.rotation;
        self.refresh_interest(id);
        self.publish_actor_update(
            id,
            UpdateData::Move {
                position,
                rotation,
                velocity,
            },
        );
    }

    fn monster_attack(&mut self, id: EntityId, target: EntityId, ctx: &mut ZoneContext<'_>) {
        let Some(actor) = self.actors.get(&id) else {
            return;
        };
        let Some(monster) = actor.as_monster() else {
            return;
        };
        if monster.is_dead() || !self.actors.contains_key(&target) {
            return;
        }
        let (att, rotation) = (monster.att, actor.rotation);
        self.publish_actor_update(
            id,
            UpdateData::Skill {
                skill_id: 0,
                targets: vec![target],
                rotation,
            },
        );
        self.damage(target, id, att, ctx);
    }

    pub(crate) fn start_monster_ai(&mut self, id: EntityId, ctx: &mut ZoneContext<'_>) {
        self.run_monster_ai(id, None, ctx);
    }

    pub(crate) fn drive_monster(&mut self, id: EntityId, event: AiEvent, ctx: &mut ZoneContext<'_>) {
        self.run_monster_ai(id, Some(event), ctx);
    }

    /// The AI is detached from its monster while it runs, so it can act on
    /// the zone through the driver. `None` starts the machine.
    fn run_monster_ai(&mut self, id: EntityId, event: Option<AiEvent>, ctx: &mut ZoneContext<'_>) {
        let Some(mut ai) = self
            .actors
            .get_mut(&id)
            .and_then(Actor::as_monster_mut)
            .and_then(|m| m.ai.take())
        else {
            trace!(actor = %id, "no ai to drive");
            return;
        };
        {
            let mut driver = MonsterDriver {
                zone: &mut *self,
                ctx: &mut *ctx,
                id,
            };
            match event {
                Some(event) => ai.process(event, &mut driver),
                None => ai.start(&mut driver),
            }
        }
        if let Some(monster) = self.actors.get_mut(&id).and_then(Actor::as_monster_mut) {
            monster.ai = Some(ai);
        }
    }
}

/// The zone as seen by one monster's AI.
pub(crate) struct MonsterDriver<'z, 'c, 'a> {
    zone: &'z mut Zone,
    ctx: &'c mut ZoneContext<'a>,
    id: EntityId,
}

impl MonsterContext for MonsterDriver<'_, '_, '_> {
    fn now(&self) -> Duration {
        self.ctx.scheduler.now()
    }

    fn position(&self) -> Vec3 {
        self.zone
            .actors
            .get(&self.id)
            .map(|a| a.position)
            .unwrap_or_default()
    }

    fn rotation(&self) -> f32 {
        self.zone
            .actors
            .get(&self.id)
            .map(|a| a.rotation)
            .unwrap_or_default()
    }

    fn set_rotation(&mut self, yaw: f32) {
        if let Some(actor) = self.zone.actors.get_mut(&self.id) {
            actor.rotation = yaw;
        }
    }

    fn move_to(&mut self, position: Vec3, dt: f32) {
        self.zone.monster_move(self.id, position, dt);
    }

    fn attack(&mut self, target: EntityId) {
        self.zone.monster_attack(self.id, target, self.ctx);
    }

    fn find_target(&self, id: EntityId) -> Option<TargetView> {
        self.zone.actors.get(&id).map(|a| TargetView {
            position: a.position,
            dead: a.is_dead(),
        })
    }

    fn zone_contains(&self, position: Vec3) -> bool {
        self.zone.contains(position)
    }

    fn map_size(&self) -> (f32, f32) {
        (self.zone.map.width as f32, self.zone.map.height as f32)
    }

    fn random_range(&mut self, low: f32, high: f32) -> f32 {
        if high > low {
            self.ctx.rng.gen_range(low..high)
        } else {
            low
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gridrealm_ai::StateId;
    use gridrealm_common::protocol::{ActorUpdate, Notify};
    use gridrealm_common::{ClassType, Skill};

    use super::super::tests::{Harness, hero_record, sample_data, wolf};
    use super::super::ZoneKind;
    use super::*;
    use crate::peer::MemoryPeer;

    fn data() -> gridrealm_common::StaticData {
        sample_data().with_monster(wolf()).with_skill(Skill {
            skill_id: 1,
            class_type: ClassType::Knight,
            damage: 5,
            cost: 10,
        })
    }

    fn spawn_wolf(zone: &mut Zone, h: &mut Harness, at: Vec3) -> EntityId {
        let template = h.data.monster(3).cloned().unwrap();
        let actor = Actor::monster(EntityId::new(), &template, h.config.ai.clone());
        let id = zone.enter(actor, at, &mut h.ctx()).unwrap();
        zone.start_monster_ai(id, &mut h.ctx());
        id
    }

    #[test]
    fn defence_reduces_damage_to_at_least_one() {
        let mut h = Harness::new(data());
        let mut zone = h.zone(ZoneKind::Field);
        let hero = zone
            .enter(Actor::hero(&hero_record(Vec3::ZERO), None), Vec3::new(5.0, 0.0, 5.0), &mut h.ctx())
            .unwrap();

        zone.damage(hero, EntityId::new(), 1, &mut h.ctx());
        assert_eq!(zone.find_actor(hero).unwrap().as_hero().unwrap().hp(), 99);
        zone.damage(hero, EntityId::new(), 12, &mut h.ctx());
        assert_eq!(zone.find_actor(hero).unwrap().as_hero().unwrap().hp(), 89);
    }

    #[test]
    fn damaged_monster_engages_attacker() {
        let mut h = Harness::new(data());
        let mut zone = h.zone(ZoneKind::Field);
        let hero = zone
            .enter(Actor::hero(&hero_record(Vec3::ZERO), None), Vec3::new(5.0, 0.0, 5.0), &mut h.ctx())
            .unwrap();
        let wolf = spawn_wolf(&mut zone, &mut h, Vec3::new(6.0, 0.0, 5.0));

        zone.damage(wolf, hero, 5, &mut h.ctx());
        let monster = zone.find_actor(wolf).unwrap().as_monster().unwrap();
        assert_eq!(monster.hp(), 16);
        let ai = monster.ai().unwrap();
        assert!(ai.is_in(StateId::Combat));
        assert_eq!(ai.target(), Some(hero));
    }

    #[test]
    fn lethal_damage_kills_and_broadcasts_state() {
        let mut h = Harness::new(data());
        let mut zone = h.zone(ZoneKind::Field);
        let peer = Arc::new(MemoryPeer::new());
        let hero = zone
            .enter(
                Actor::hero(&hero_record(Vec3::ZERO), Some(peer.clone())),
                Vec3::new(5.0, 0.0, 5.0),
                &mut h.ctx(),
            )
            .unwrap();
        let wolf = spawn_wolf(&mut zone, &mut h, Vec3::new(6.0, 0.0, 5.0));
        peer.take();

        zone.damage(wolf, hero, 100, &mut h.ctx());
        let monster = zone.find_actor(wolf).unwrap().as_monster().unwrap();
        assert_eq!(monster.hp(), 0);
        assert_eq!(monster.ai().unwrap().state(), StateId::Dead);

        let received = peer.take();
        assert!(received.contains(&Notify::Update(ActorUpdate {
            entity_id: wolf,
            data: UpdateData::Damage { amount: 99 },
        })));
        assert_eq!(
            received.last(),
            Some(&Notify::Update(ActorUpdate {
                entity_id: wolf,
                data: UpdateData::State(StateType::Dead),
            }))
        );

        // corpses take no further damage
        zone.damage(wolf, hero, 100, &mut h.ctx());
        assert!(peer.is_empty());
        assert!(!zone.kill(wolf, &mut h.ctx()));
    }

    #[test]
    fn skill_spends_mana_and_hits_targets() {
        let mut h = Harness::new(data());
        let mut zone = h.zone(ZoneKind::Field);
        let hero = zone
            .enter(Actor::hero(&hero_record(Vec3::ZERO), None), Vec3::new(5.0, 0.0, 5.0), &mut h.ctx())
            .unwrap();
        let wolf = spawn_wolf(&mut zone, &mut h, Vec3::new(6.0, 0.0, 5.0));

        assert!(zone.hero_skill(hero, 1, 45.0, &[wolf], &mut h.ctx()));
        let actor = zone.find_actor(hero).unwrap();
        assert_eq!(actor.as_hero().unwrap().mp(), 40);
        assert_eq!(actor.rotation, 45.0);
        // 5 + 10 att - 1 def
        assert_eq!(zone.find_actor(wolf).unwrap().as_monster().unwrap().hp(), 6);

        assert!(!zone.hero_skill(hero, 99, 0.0, &[wolf], &mut h.ctx()));
    }

    #[test]
    fn skill_without_mana_is_rejected() {
        let mut h = Harness::new(data());
        let mut zone = h.zone(ZoneKind::Field);
        let mut record = hero_record(Vec3::ZERO);
        record.mp = 5;
        let hero = zone
            .enter(Actor::hero(&record, None), Vec3::new(5.0, 0.0, 5.0), &mut h.ctx())
            .unwrap();
        assert!(!zone.hero_skill(hero, 1, 0.0, &[], &mut h.ctx()));
        assert_eq!(zone.find_actor(hero).unwrap().as_hero().unwrap().mp(), 5);
    }

    #[test]
    fn dead_hero_cannot_move() {
        let mut h = Harness::new(data());
        let mut zone = h.zone(ZoneKind::Field);
        let hero = zone
            .enter(Actor::hero(&hero_record(Vec3::ZERO), None), Vec3::new(5.0, 0.0, 5.0), &mut h.ctx())
            .unwrap();
        assert!(zone.kill(hero, &mut h.ctx()));
        assert!(!zone.hero_move(hero, Vec3::new(50.0, 0.0, 50.0), 0.0, Vec3::ZERO));
        assert_eq!(zone.find_actor(hero).unwrap().position, Vec3::new(5.0, 0.0, 5.0));
    }

    #[test]
    fn hero_move_is_clamped_to_zone() {
        let mut h = Harness::new(data());
        let mut zone = h.zone(ZoneKind::Field);
        let hero = zone
            .enter(Actor::hero(&hero_record(Vec3::ZERO), None), Vec3::new(5.0, 0.0, 5.0), &mut h.ctx())
            .unwrap();
        assert!(zone.hero_move(hero, Vec3::new(150.0, 0.0, -4.0), 0.0, Vec3::ZERO));
        let actor = zone.find_actor(hero).unwrap();
        assert_eq!(actor.position, Vec3::new(100.0, 0.0, 0.0));
        // the far edge still belongs to a cell
        assert_eq!(actor.current_cell(), Some(gridrealm_grid::CellCoord::new(9, 0, 0)));
    }

    #[test]
    fn regen_restores_and_reports_only_changes() {
        let mut h = Harness::new(data());
        let mut zone = h.zone(ZoneKind::Field);
        let peer = Arc::new(MemoryPeer::new());
        let mut record = hero_record(Vec3::ZERO);
        record.hp = 90;
        let hero = zone
            .enter(Actor::hero(&record, Some(peer.clone())), Vec3::new(5.0, 0.0, 5.0), &mut h.ctx())
            .unwrap();
        peer.take();

        zone.regenerate_hero(hero, &mut h.ctx());
        assert_eq!(zone.find_actor(hero).unwrap().as_hero().unwrap().hp(), 95);
        assert_eq!(peer.take().len(), 1);

        // not due yet
        zone.regenerate_hero(hero, &mut h.ctx());
        assert_eq!(zone.find_actor(hero).unwrap().as_hero().unwrap().hp(), 95);

        h.scheduler.set_now(Duration::from_secs(5));
        zone.regenerate_hero(hero, &mut h.ctx());
        assert_eq!(zone.find_actor(hero).unwrap().as_hero().unwrap().hp(), 100);
        peer.take();

        h.scheduler.set_now(Duration::from_secs(10));
        zone.regenerate_hero(hero, &mut h.ctx());
        assert!(peer.is_empty());
    }

    #[test]
    fn monster_chases_and_bites_hero() {
        let mut h = Harness::new(data());
        let mut zone = h.zone(ZoneKind::Field);
        let hero = zone
            .enter(Actor::hero(&hero_record(Vec3::ZERO), None), Vec3::new(5.0, 0.0, 5.0), &mut h.ctx())
            .unwrap();
        let wolf = spawn_wolf(&mut zone, &mut h, Vec3::new(9.0, 0.0, 5.0));
        zone.drive_monster(wolf, AiEvent::EngageCombat(hero), &mut h.ctx());

        for _ in 0..20 {
            zone.drive_monster(wolf, AiEvent::Tick(0.1), &mut h.ctx());
        }
        let position = zone.find_actor(wolf).unwrap().position;
        assert!(position.distance(Vec3::new(5.0, 0.0, 5.0)) <= 1.5);
        // 6 att - 2 def
        assert_eq!(zone.find_actor(hero).unwrap().as_hero().unwrap().hp(), 96);
    }
}
