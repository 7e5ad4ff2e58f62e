/// The step function: advances the world by one tick.
///
/// Processing order:
///   1. Player bookkeeping (ice cooldown)
///   2. Monster movement, in spawn order
///   3. Ice melt
///   4. Contact sweep (monster and player on one cell)
///   5. Defeat check
///
/// A monster whose move is rejected simply stays put; the failure is
/// logged at trace level and the rest of the tick carries on.

use log::{debug, trace};

use crate::domain::ai::AiView;
use crate::domain::coord::Coord;
use crate::domain::entity::EntityId;
use crate::domain::object::StaticObject;
use crate::error::Result;

use super::event::{EventSource, GameEvent, GameEventKind};
use super::world::{GamePhase, World};

impl World {
    /// Advance one tick. Does nothing unless the game is Running; returns
    /// whether a tick was processed.
    pub fn tick(&mut self) -> bool {
        if self.phase != GamePhase::Running || self.player.is_none() {
            return false;
        }
        self.tick += 1;

        if let Some(p) = self.player.as_mut() {
            p.update();
        }
        for i in 0..self.monsters.len() {
            if let Err(e) = self.update_monster(i) {
                trace!("tick {}: monster#{i} stays: {e}", self.tick);
            }
        }
        if let Err(e) = self.melt_ice() {
            debug!("tick {}: ice melt interrupted: {e}", self.tick);
        }
        self.sweep_contacts();
        self.check_defeat();
        true
    }

    fn target_position(&self, target: Option<EntityId>) -> Option<Coord> {
        target.and_then(|t| self.position_of(t))
    }

    fn update_monster(&mut self, index: usize) -> Result<()> {
        let Some(target_id) = self.monsters.get(index).map(|m| m.target()) else {
            return Ok(());
        };
        let target = self.target_position(target_id);

        let monster = &mut self.monsters[index];
        let view = AiView {
            grid: &self.grid,
            position: monster.position,
            facing: monster.facing,
            target,
        };
        let Some(dir) = monster.strategy.next_direction(&view) else {
            return Ok(());
        };
        monster.facing = dir;
        let dest = monster.position.step(dir);

        let ice_ahead = self
            .grid
            .cell(dest)
            .ok()
            .and_then(|c| c.static_obj())
            .is_some_and(StaticObject::is_ice);
        if ice_ahead && monster.strategy.can_break_ice() {
            if monster.strategy.try_break() {
                debug!("monster#{index} smashes ice at {dest}");
                self.destroy_ice_at(dest)?;
            }
            return Ok(());
        }

        self.move_entity(EntityId::Monster(index), dest).map(|_| ())
    }

    fn melt_ice(&mut self) -> Result<()> {
        let ice: Vec<Coord> = self
            .grid
            .cells()
            .filter(|c| c.static_obj().is_some_and(StaticObject::is_ice))
            .map(|c| c.pos())
            .collect();

        for pos in ice {
            let melted = self
                .grid
                .static_at_mut(pos)
                .and_then(StaticObject::as_ice_mut)
                .is_some_and(|ice| ice.tick());
            if !melted {
                continue;
            }
            self.grid.set_static(pos, None)?;
            self.publish(
                GameEvent::new(GameEventKind::IceDestroyed)
                    .from_source(EventSource::Cell(pos))
                    .at(pos)
                    .with("reason", "melted"),
            );
        }
        Ok(())
    }

    /// Occupancy keeps monsters off the player's cell, so this only fires
    /// if something put them there outside the resolver.
    fn sweep_contacts(&mut self) {
        let Some(player_pos) = self.player.as_ref().map(|p| p.position()) else { return };
        let contacts: Vec<_> = self
            .monsters
            .iter()
            .filter(|m| m.position() == player_pos)
            .map(|m| m.id())
            .collect();
        for monster in contacts {
            self.publish(
                GameEvent::new(GameEventKind::Collision)
                    .from_source(monster)
                    .at(player_pos)
                    .with("mover", monster.to_string())
                    .with("other", EntityId::Player.to_string()),
            );
            self.hit_player();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::ai::PathChase;
    use crate::domain::coord::{Coord, Direction};
    use crate::domain::entity::EntityId;
    use crate::sim::event::GameEventKind;
    use crate::sim::world::GamePhase;
    use crate::test_support::{chaser, level, squid, troll, wall, world_with};

    #[test]
    fn tick_is_a_no_op_until_running() {
        let (mut w, _) = world_with(level(3, 3, (0, 0)));
        assert!(!w.tick());
        w.load_level(1).unwrap();
        w.pause().unwrap();
        assert!(!w.tick());
        assert_eq!(w.tick_count(), 0);
        w.resume().unwrap();
        assert!(w.tick());
        assert_eq!(w.tick_count(), 1);
    }

    #[test]
    fn patrol_follows_its_script() {
        let mut desc = level(5, 3, (0, 0));
        desc.enemies.push(troll((2, 1), vec![Direction::Right, Direction::Left]));
        let (mut w, _) = world_with(desc);
        w.load_level(1).unwrap();
        w.tick();
        assert_eq!(w.monsters()[0].position(), Coord::new(3, 1));
        assert_eq!(w.monsters()[0].facing(), Direction::Right);
        w.tick();
        assert_eq!(w.monsters()[0].position(), Coord::new(2, 1));
        w.audit_occupancy().unwrap();
    }

    #[test]
    fn monster_blocked_by_wall_stays_and_tick_continues() {
        let mut desc = level(5, 1, (4, 0));
        desc.statics.push(wall((1, 0)));
        desc.enemies.push(troll((0, 0), vec![Direction::Right]));
        desc.enemies.push(troll((2, 0), vec![Direction::Right]));
        let (mut w, _) = world_with(desc);
        w.load_level(1).unwrap();
        assert!(w.tick());
        assert_eq!(w.monsters()[0].position(), Coord::new(0, 0));
        assert_eq!(w.monsters()[1].position(), Coord::new(3, 0));
    }

    #[test]
    fn rejected_monster_move_does_not_stop_ice_melt() {
        let mut desc = level(5, 2, (4, 0));
        desc.statics.push(wall((1, 0)));
        desc.enemies.push(troll((0, 0), vec![Direction::Right]));
        let (mut w, log) = world_with(desc);
        w.rules.ice_lifetime_ticks = 1;
        w.load_level(1).unwrap();
        w.create_ice_at(Coord::new(2, 1), None).unwrap();
        log.clear();

        assert!(w.tick());
        assert_eq!(w.monsters()[0].position(), Coord::new(0, 0));
        assert!(w.grid().cell(Coord::new(2, 1)).unwrap().static_obj().is_none());
        let melted = log.first(GameEventKind::IceDestroyed).unwrap();
        assert_eq!(melted.position(), Some(Coord::new(2, 1)));
        assert_eq!(melted.get_str("reason"), Some("melted"));
        w.audit_occupancy().unwrap();
    }

    #[test]
    fn chaser_closes_in_and_hits_the_player() {
        let mut desc = level(5, 1, (0, 0));
        desc.enemies.push(chaser((3, 0)));
        let (mut w, log) = world_with(desc);
        w.load_level(1).unwrap();
        w.tick();
        w.tick();
        assert_eq!(w.monsters()[0].position(), Coord::new(1, 0));
        assert_eq!(log.count(GameEventKind::Collision), 0);
        w.tick();
        assert_eq!(log.count(GameEventKind::Collision), 1);
        assert_eq!(log.count(GameEventKind::PlayerHit), 1);
        assert_eq!(w.player().unwrap().lives(), 2);
        // Player was already on its spawn, so it stays.
        assert_eq!(w.player().unwrap().position(), Coord::new(0, 0));
    }

    #[test]
    fn running_out_of_lives_ends_in_defeat() {
        let mut desc = level(2, 1, (0, 0));
        desc.enemies.push(chaser((1, 0)));
        let (mut w, log) = world_with(desc);
        w.load_level(1).unwrap();
        for _ in 0..3 {
            w.tick();
        }
        assert_eq!(log.count(GameEventKind::PlayerHit), 3);
        assert_eq!(log.count(GameEventKind::PlayerDied), 1);
        assert_eq!(w.phase(), GamePhase::Defeat);
        assert!(!w.tick());
    }

    #[test]
    fn plain_chaser_waits_behind_ice() {
        let mut desc = level(3, 1, (2, 0));
        desc.enemies.push(chaser((0, 0)));
        let (mut w, _) = world_with(desc);
        w.load_level(1).unwrap();
        w.create_ice_at(Coord::new(1, 0), None).unwrap();
        w.tick();
        assert_eq!(w.monsters()[0].position(), Coord::new(0, 0));
        assert!(w.grid().cell(Coord::new(1, 0)).unwrap().static_obj().is_some());
    }

    #[test]
    fn squid_breaks_ice_then_advances() {
        let mut desc = level(4, 1, (3, 0));
        desc.enemies.push(squid((0, 0)));
        let (mut w, log) = world_with(desc);
        w.load_level(1).unwrap();
        w.create_ice_at(Coord::new(1, 0), None).unwrap();
        w.tick();
        assert_eq!(log.count(GameEventKind::IceDestroyed), 1);
        assert_eq!(w.monsters()[0].position(), Coord::new(0, 0));
        assert_eq!(w.monsters()[0].facing(), Direction::Right);
        w.tick();
        assert_eq!(w.monsters()[0].position(), Coord::new(1, 0));
    }

    #[test]
    fn squid_respects_break_cooldown() {
        let mut desc = level(5, 1, (4, 0));
        desc.enemies.push(squid((0, 0)));
        let (mut w, log) = world_with(desc);
        w.rules.ice_lifetime_ticks = 50;
        w.load_level(1).unwrap();
        w.create_ice_at(Coord::new(1, 0), None).unwrap();
        w.tick(); // breaks (1, 0)
        w.create_ice_at(Coord::new(1, 0), None).unwrap();
        w.tick(); // cooldown: waits
        assert!(w.grid().cell(Coord::new(1, 0)).unwrap().static_obj().is_some());
        w.tick(); // breaks again
        assert_eq!(log.count(GameEventKind::IceDestroyed), 2);
        assert_eq!(w.monsters()[0].position(), Coord::new(0, 0));
    }

    #[test]
    fn swapped_strategy_takes_over() {
        let mut desc = level(3, 3, (2, 2));
        desc.enemies.push(troll((0, 0), vec![Direction::Up]));
        let (mut w, _) = world_with(desc);
        w.load_level(1).unwrap();
        let old = w.monster_mut(0).unwrap().set_strategy(Box::new(PathChase::new()));
        assert_eq!(old.name(), "patrol");
        w.tick();
        assert_eq!(w.monsters()[0].position(), Coord::new(0, 1));
        w.monster_mut(0).unwrap().set_target(None);
        w.tick();
        assert_eq!(w.monsters()[0].position(), Coord::new(0, 1));
        assert_eq!(w.grid().cell(Coord::new(0, 1)).unwrap().dynamic(), Some(EntityId::Monster(0)));
    }

    #[test]
    fn ice_melts_on_schedule() {
        let (mut w, log) = world_with(level(3, 3, (1, 1)));
        w.load_level(1).unwrap();
        w.player_create_ice().unwrap();
        let at = Coord::new(1, 0);
        for _ in 0..4 {
            w.tick();
        }
        assert!(w.grid().cell(at).unwrap().static_obj().is_some());
        assert_eq!(log.count(GameEventKind::IceDestroyed), 0);
        w.tick();
        assert!(w.grid().cell(at).unwrap().static_obj().is_none());
        let melted = log.first(GameEventKind::IceDestroyed).unwrap();
        assert_eq!(melted.get_str("reason"), Some("melted"));
    }
}
