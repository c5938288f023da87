use std::error::Error;
use std::fmt;

use crate::constants::{
    ELROY_BOOST_1_PCT, ELROY_BOOST_2_PCT, EYES_SPEED_PX_PER_SEC, FULL_SPEED_PX_PER_SEC,
    HOUSE_SPEED_PX_PER_SEC,
};
use crate::maze::Maze;
use crate::rng::Rng;
use crate::types::{
    CellIndex, Direction, GameEvent, GhostMode, GhostPersonality, GhostState, GhostView,
    LevelProps,
};

use super::movers::Mover;
use super::phase::{FrightSession, GhostHouse};
use super::tile::Tile;

pub struct TickContext<'a> {
    pub dt_sec: f32,
    pub now_ms: u64,
    pub maze: &'a Maze,
    pub player_cell: CellIndex,
    pub player_dir: Direction,
    pub chaser_cell: CellIndex,
    pub dots_remaining: i32,
    pub props: LevelProps,
    pub timer_mode: GhostMode,
    pub fright: Option<&'a FrightSession>,
    pub house: &'a GhostHouse,
    pub rng: &'a mut Rng,
    pub events: &'a mut Vec<GameEvent>,
    pub suppress_player_eaten: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CenterAction {
    Continue,
    ReverseIntoFright,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickError {
    NoMoverForMode(GhostPersonality, GhostMode),
    MoverMissing(GhostPersonality),
    CenterActionMissing(GhostPersonality),
    FrightWithoutSession(GhostPersonality),
}

impl fmt::Display for TickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMoverForMode(personality, mode) => {
                write!(f, "no mover resolves for {personality:?} in mode {mode:?}")
            }
            Self::MoverMissing(personality) => {
                write!(f, "{personality:?} ticked with no active mover")
            }
            Self::CenterActionMissing(personality) => {
                write!(f, "{personality:?} centered with no armed on-center action")
            }
            Self::FrightWithoutSession(personality) => {
                write!(f, "{personality:?} is frightened with no active fright session")
            }
        }
    }
}

impl Error for TickError {}

#[derive(Clone, Debug)]
pub struct Ghost {
    pub(crate) personality: GhostPersonality,
    pub(crate) state: GhostState,
    pub(crate) mode: GhostMode,
    pub(crate) tile: Tile,
    pub(crate) spawn_cell: CellIndex,
    pub(crate) spawn_dir: Direction,
    pub(crate) dir: Direction,
    pub(crate) next_dir: Direction,
    pub(crate) visible: bool,
    pub(crate) moving: bool,
    pub(crate) on_center: Option<CenterAction>,
    pub(crate) mover: Option<Mover>,
}

impl Ghost {
    pub fn new(personality: GhostPersonality, maze: &Maze) -> Self {
        let spawn_cell = maze.ghost_spawn(personality);
        let mut ghost = Self {
            personality,
            state: GhostState::Normal,
            mode: GhostMode::InHouse,
            tile: Tile::at_cell_center(spawn_cell, maze.width_cells()),
            spawn_cell,
            spawn_dir: Direction::Up,
            dir: Direction::Up,
            next_dir: Direction::Up,
            visible: true,
            moving: true,
            on_center: Some(CenterAction::Continue),
            mover: None,
        };
        ghost.reset();
        ghost
    }

    pub fn reset(&mut self) {
        self.state = GhostState::Normal;
        self.mode = GhostMode::InHouse;
        self.on_center = Some(CenterAction::Continue);
        let (x, y) = self.spawn_cell.center_px();
        self.tile.set_position(x, y);
        self.dir = self.spawn_dir;
        self.next_dir = self.spawn_dir;
        self.visible = true;
        self.moving = true;
        self.mover = None;
    }

    pub fn personality(&self) -> GhostPersonality {
        self.personality
    }

    pub fn state(&self) -> GhostState {
        self.state
    }

    pub fn mode(&self) -> GhostMode {
        self.mode
    }

    pub fn cell(&self) -> CellIndex {
        self.tile.cell()
    }

    pub fn set_moving(&mut self, moving: bool) {
        self.moving = moving;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn on_power_pellet(&mut self) {
        if self.state == GhostState::Eyes {
            return;
        }
        self.state = GhostState::Frightened;
        if matches!(self.mode, GhostMode::Chase | GhostMode::Scatter) {
            self.on_center = Some(CenterAction::ReverseIntoFright);
        }
    }

    pub fn update(&mut self, ctx: &mut TickContext) -> Result<(), TickError> {
        if !self.moving {
            return Ok(());
        }

        let speed_px = self.current_speed_px_per_sec(ctx) * ctx.dt_sec;
        self.recenter_lane(speed_px);
        self.check_collision(ctx);

        if self.tile.is_centered() {
            let action = self
                .on_center
                .take()
                .ok_or(TickError::CenterActionMissing(self.personality))?;
            self.apply_center_action(action);
            self.on_center = Some(CenterAction::Continue);
        }

        self.resolve_mover(ctx)?;
        let mut mover = self
            .mover
            .take()
            .ok_or(TickError::MoverMissing(self.personality))?;
        mover.advance(self, speed_px, ctx);
        self.mover = Some(mover);

        if self.state == GhostState::Frightened {
            let session = ctx
                .fright
                .ok_or(TickError::FrightWithoutSession(self.personality))?;
            if session.finished(ctx.now_ms) {
                self.state = GhostState::Normal;
            }
        }

        Ok(())
    }

    fn apply_center_action(&mut self, action: CenterAction) {
        match action {
            CenterAction::Continue => {}
            CenterAction::ReverseIntoFright => {
                self.dir = self.dir.reverse();
                self.next_dir = self.dir;
                self.mode = GhostMode::Frightened;
            }
        }
    }

    fn check_collision(&mut self, ctx: &mut TickContext) {
        if self.tile.cell() != ctx.player_cell {
            return;
        }
        match self.state {
            GhostState::Normal => {
                if !ctx.suppress_player_eaten {
                    ctx.events.push(GameEvent::PlayerEaten {
                        by: self.personality,
                    });
                }
            }
            GhostState::Frightened => {
                ctx.events.push(GameEvent::GhostEaten {
                    ghost: self.personality,
                });
                self.state = GhostState::Eyes;
                self.mode = GhostMode::GoingToHouse;
            }
            GhostState::Eyes => {}
        }
    }

    fn resolve_mover(&mut self, ctx: &TickContext) -> Result<(), TickError> {
        if matches!(
            self.mode,
            GhostMode::Undecided | GhostMode::Scatter | GhostMode::Chase
        ) {
            self.mode = ctx.timer_mode;
        } else if self.mode == GhostMode::Frightened && self.state != GhostState::Frightened {
            self.mode = ctx.timer_mode;
        }

        let resolved = self.mode;
        if self.mover.as_ref().map(|mover| mover.mode()) == Some(resolved) {
            return Ok(());
        }

        if resolved == GhostMode::InHouse {
            self.state = GhostState::Normal;
        }
        let decided_cell = if self.tile.is_centered() {
            Some(self.tile.cell())
        } else {
            None
        };
        self.mover = Some(
            Mover::for_mode(resolved, decided_cell)
                .ok_or(TickError::NoMoverForMode(self.personality, resolved))?,
        );
        Ok(())
    }

    fn recenter_lane(&mut self, speed_px: f32) {
        if !matches!(self.mode, GhostMode::Scatter | GhostMode::Chase) {
            return;
        }
        let (x, y) = self.tile.position();
        let (cx, cy) = self.tile.center_px();
        if self.dir.is_vertical() {
            let drift = cx - x;
            if drift != 0.0 {
                let step = drift.abs().min(speed_px);
                self.tile.set_position(x + drift.signum() * step, y);
            }
        } else if self.dir.is_horizontal() {
            let drift = cy - y;
            if drift != 0.0 {
                let step = drift.abs().min(speed_px);
                self.tile.set_position(x, y + drift.signum() * step);
            }
        }
    }

    pub(crate) fn current_speed_px_per_sec(&self, ctx: &TickContext) -> f32 {
        if self.mode == GhostMode::InHouse {
            return HOUSE_SPEED_PX_PER_SEC;
        }
        if self.state == GhostState::Eyes {
            return EYES_SPEED_PX_PER_SEC;
        }
        if self.state == GhostState::Frightened {
            return FULL_SPEED_PX_PER_SEC * ctx.props.fright_speed_pct as f32 / 100.0;
        }
        if ctx.maze.is_tunnel(self.tile.cell()) {
            return FULL_SPEED_PX_PER_SEC * ctx.props.tunnel_speed_pct as f32 / 100.0;
        }
        FULL_SPEED_PX_PER_SEC * self.normal_speed_pct(ctx) as f32 / 100.0
    }

    fn normal_speed_pct(&self, ctx: &TickContext) -> u32 {
        let mut pct = ctx.props.ghost_speed_pct;
        if self.personality == GhostPersonality::Chaser {
            if ctx.dots_remaining <= ctx.props.elroy_dots_2 {
                pct += ELROY_BOOST_2_PCT;
            } else if ctx.dots_remaining <= ctx.props.elroy_dots_1 {
                pct += ELROY_BOOST_1_PCT;
            }
        }
        pct
    }

    pub fn view(&self) -> GhostView {
        let (x, y) = self.tile.position();
        let target = self
            .mover
            .as_ref()
            .map(|mover| mover.target())
            .unwrap_or_else(|| self.tile.cell());
        GhostView {
            id: self.personality,
            x,
            y,
            dir: self.dir,
            state: self.state,
            mode: self.mode,
            visible: self.visible,
            target_col: target.col,
            target_row: target.row,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::constants::level_props;

    use super::*;

    struct Fixture {
        maze: Maze,
        house: GhostHouse,
        rng: Rng,
        events: Vec<GameEvent>,
        fright: Option<FrightSession>,
        timer_mode: GhostMode,
        player_cell: CellIndex,
        suppress_player_eaten: bool,
        now_ms: u64,
        dots_remaining: i32,
    }

    impl Fixture {
        fn new() -> Self {
            let maze = Maze::new();
            let mut house = GhostHouse::new(&maze);
            house.schedule_releases(0);
            Self {
                maze,
                house,
                rng: Rng::new(11),
                events: Vec::new(),
                fright: None,
                timer_mode: GhostMode::Chase,
                player_cell: CellIndex::new(13, 23),
                suppress_player_eaten: false,
                now_ms: 0,
                dots_remaining: 240,
            }
        }

        fn ctx(&mut self, dt_sec: f32) -> TickContext<'_> {
            TickContext {
                dt_sec,
                now_ms: self.now_ms,
                maze: &self.maze,
                player_cell: self.player_cell,
                player_dir: Direction::Left,
                chaser_cell: CellIndex::new(13, 11),
                dots_remaining: self.dots_remaining,
                props: level_props(1),
                timer_mode: self.timer_mode,
                fright: self.fright.as_ref(),
                house: &self.house,
                rng: &mut self.rng,
                events: &mut self.events,
                suppress_player_eaten: self.suppress_player_eaten,
            }
        }
    }

    fn roaming_ghost(fixture: &Fixture, cell: CellIndex, dir: Direction) -> Ghost {
        let mut ghost = Ghost::new(GhostPersonality::Chaser, &fixture.maze);
        let (x, y) = cell.center_px();
        ghost.tile.set_position(x, y);
        ghost.dir = dir;
        ghost.next_dir = dir;
        ghost.mode = GhostMode::Chase;
        ghost
    }

    #[test]
    fn power_pellet_reverses_facing_at_the_next_center() {
        let mut fixture = Fixture::new();
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);

        let mut ctx = fixture.ctx(0.0);
        ghost.update(&mut ctx).expect("tick should succeed");
        assert_eq!(ghost.mode(), GhostMode::Chase);
        assert_eq!(ghost.dir, Direction::Right);

        ghost.on_power_pellet();
        assert_eq!(ghost.state(), GhostState::Frightened);
        assert_eq!(ghost.on_center, Some(CenterAction::ReverseIntoFright));

        fixture.fright = Some(FrightSession::new(0, 6_000));
        let mut ctx = fixture.ctx(0.0);
        ghost.update(&mut ctx).expect("tick should succeed");

        assert_eq!(ghost.state(), GhostState::Frightened);
        assert_eq!(ghost.dir, Direction::Left);
        assert_eq!(
            ghost.mover.as_ref().map(|mover| mover.mode()),
            Some(GhostMode::Frightened)
        );
        assert_eq!(ghost.on_center, Some(CenterAction::Continue));
    }

    #[test]
    fn power_pellet_is_ignored_while_retreating_as_eyes() {
        let fixture = Fixture::new();
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        ghost.state = GhostState::Eyes;
        ghost.mode = GhostMode::GoingToHouse;

        ghost.on_power_pellet();

        assert_eq!(ghost.state(), GhostState::Eyes);
        assert_eq!(ghost.mode(), GhostMode::GoingToHouse);
        assert_eq!(ghost.on_center, Some(CenterAction::Continue));
    }

    #[test]
    fn collision_while_normal_publishes_player_eaten_and_keeps_state() {
        let mut fixture = Fixture::new();
        fixture.player_cell = CellIndex::new(6, 5);
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);

        let mut ctx = fixture.ctx(0.0);
        ghost.update(&mut ctx).expect("tick should succeed");

        let eaten: Vec<_> = fixture
            .events
            .iter()
            .filter(|event| matches!(event, GameEvent::PlayerEaten { .. }))
            .collect();
        assert_eq!(eaten.len(), 1);
        assert_eq!(ghost.state(), GhostState::Normal);
        assert_eq!(ghost.mode(), GhostMode::Chase);
    }

    #[test]
    fn debug_override_suppresses_the_player_eaten_event() {
        let mut fixture = Fixture::new();
        fixture.player_cell = CellIndex::new(6, 5);
        fixture.suppress_player_eaten = true;
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);

        let mut ctx = fixture.ctx(0.0);
        ghost.update(&mut ctx).expect("tick should succeed");

        assert!(fixture.events.is_empty());
    }

    #[test]
    fn collision_while_frightened_turns_the_ghost_into_eyes() {
        let mut fixture = Fixture::new();
        fixture.player_cell = CellIndex::new(6, 5);
        fixture.fright = Some(FrightSession::new(0, 6_000));
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        ghost.state = GhostState::Frightened;

        let mut ctx = fixture.ctx(0.0);
        ghost.update(&mut ctx).expect("tick should succeed");

        let eaten: Vec<_> = fixture
            .events
            .iter()
            .filter(|event| matches!(event, GameEvent::GhostEaten { .. }))
            .collect();
        assert_eq!(eaten.len(), 1);
        assert_eq!(ghost.state(), GhostState::Eyes);
        assert_eq!(ghost.mode(), GhostMode::GoingToHouse);
        assert_eq!(
            ghost.mover.as_ref().map(|mover| mover.mode()),
            Some(GhostMode::GoingToHouse)
        );
    }

    #[test]
    fn in_house_speed_wins_regardless_of_state() {
        let mut fixture = Fixture::new();
        let mut ghost = Ghost::new(GhostPersonality::Chaser, &fixture.maze);
        ghost.mode = GhostMode::InHouse;
        ghost.state = GhostState::Eyes;
        let ctx = fixture.ctx(0.0);
        assert_eq!(ghost.current_speed_px_per_sec(&ctx), HOUSE_SPEED_PX_PER_SEC);
    }

    #[test]
    fn eyes_speed_wins_outside_the_house() {
        let mut fixture = Fixture::new();
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(2, 14), Direction::Left);
        ghost.state = GhostState::Eyes;
        ghost.mode = GhostMode::GoingToHouse;
        let ctx = fixture.ctx(0.0);
        assert_eq!(ghost.current_speed_px_per_sec(&ctx), EYES_SPEED_PX_PER_SEC);
    }

    #[test]
    fn fright_tunnel_and_normal_speeds_follow_level_props() {
        let mut fixture = Fixture::new();
        let props = level_props(1);

        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        ghost.state = GhostState::Frightened;
        let ctx = fixture.ctx(0.0);
        let fright = ghost.current_speed_px_per_sec(&ctx);
        assert!(
            (fright - FULL_SPEED_PX_PER_SEC * props.fright_speed_pct as f32 / 100.0).abs() < 1e-4
        );

        let tunnel_ghost = roaming_ghost(&fixture, CellIndex::new(2, 14), Direction::Left);
        let ctx = fixture.ctx(0.0);
        let tunnel = tunnel_ghost.current_speed_px_per_sec(&ctx);
        assert!(
            (tunnel - FULL_SPEED_PX_PER_SEC * props.tunnel_speed_pct as f32 / 100.0).abs() < 1e-4
        );

        let normal_ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        let ctx = fixture.ctx(0.0);
        let normal = normal_ghost.current_speed_px_per_sec(&ctx);
        assert!(
            (normal - FULL_SPEED_PX_PER_SEC * props.ghost_speed_pct as f32 / 100.0).abs() < 1e-4
        );
    }

    #[test]
    fn chaser_accelerates_as_dots_run_out() {
        let mut fixture = Fixture::new();
        let ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        let props = level_props(1);

        fixture.dots_remaining = props.elroy_dots_1;
        let ctx = fixture.ctx(0.0);
        let boosted_once = ghost.current_speed_px_per_sec(&ctx);
        assert!(
            (boosted_once
                - FULL_SPEED_PX_PER_SEC * (props.ghost_speed_pct + ELROY_BOOST_1_PCT) as f32
                    / 100.0)
                .abs()
                < 1e-4
        );

        fixture.dots_remaining = props.elroy_dots_2;
        let ctx = fixture.ctx(0.0);
        let boosted_twice = ghost.current_speed_px_per_sec(&ctx);
        assert!(
            (boosted_twice
                - FULL_SPEED_PX_PER_SEC * (props.ghost_speed_pct + ELROY_BOOST_2_PCT) as f32
                    / 100.0)
                .abs()
                < 1e-4
        );

        let mut other = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        other.personality = GhostPersonality::Wary;
        let ctx = fixture.ctx(0.0);
        let unboosted = other.current_speed_px_per_sec(&ctx);
        assert!(
            (unboosted - FULL_SPEED_PX_PER_SEC * props.ghost_speed_pct as f32 / 100.0).abs() < 1e-4
        );
    }

    #[test]
    fn reset_restores_spawn_no_matter_the_prior_state() {
        let mut fixture = Fixture::new();
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        ghost.state = GhostState::Eyes;
        ghost.mode = GhostMode::GoingToHouse;
        ghost.visible = false;
        ghost.moving = false;
        ghost.on_center = Some(CenterAction::ReverseIntoFright);
        let mut ctx = fixture.ctx(0.0);
        ghost.update(&mut ctx).expect("tick should succeed");

        ghost.reset();
        ghost.reset();

        assert_eq!(ghost.state(), GhostState::Normal);
        assert_eq!(ghost.mode(), GhostMode::InHouse);
        assert_eq!(ghost.cell(), ghost.spawn_cell);
        assert_eq!(ghost.tile.position(), ghost.spawn_cell.center_px());
        assert_eq!(ghost.dir, ghost.spawn_dir);
        assert_eq!(ghost.on_center, Some(CenterAction::Continue));
        assert!(ghost.visible);
        assert!(ghost.moving);
        assert!(ghost.mover.is_none());
    }

    #[test]
    fn frightened_state_without_a_session_fails_the_tick() {
        let mut fixture = Fixture::new();
        fixture.fright = None;
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        ghost.state = GhostState::Frightened;

        let mut ctx = fixture.ctx(0.0);
        assert_eq!(
            ghost.update(&mut ctx),
            Err(TickError::FrightWithoutSession(GhostPersonality::Chaser))
        );
    }

    #[test]
    fn centered_tile_without_an_armed_action_fails_the_tick() {
        let mut fixture = Fixture::new();
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        ghost.on_center = None;

        let mut ctx = fixture.ctx(0.0);
        assert_eq!(
            ghost.update(&mut ctx),
            Err(TickError::CenterActionMissing(GhostPersonality::Chaser))
        );
    }

    #[test]
    fn fright_expiry_reverts_state_then_mode_rejoins_the_rotation() {
        let mut fixture = Fixture::new();
        fixture.fright = Some(FrightSession::new(0, 6_000));
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        ghost.on_power_pellet();

        let mut ctx = fixture.ctx(0.0);
        ghost.update(&mut ctx).expect("tick should succeed");
        assert_eq!(ghost.mode(), GhostMode::Frightened);

        fixture.now_ms = 6_000;
        let mut ctx = fixture.ctx(0.0);
        ghost.update(&mut ctx).expect("tick should succeed");
        assert_eq!(ghost.state(), GhostState::Normal);
        assert_eq!(ghost.mode(), GhostMode::Frightened);

        fixture.fright = None;
        let mut ctx = fixture.ctx(0.0);
        ghost.update(&mut ctx).expect("tick should succeed");
        assert_eq!(ghost.mode(), GhostMode::Chase);
        assert_eq!(
            ghost.mover.as_ref().map(|mover| mover.mode()),
            Some(GhostMode::Chase)
        );
    }

    #[test]
    fn a_stopped_ghost_neither_moves_nor_collides() {
        let mut fixture = Fixture::new();
        fixture.player_cell = CellIndex::new(6, 5);
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Right);
        ghost.moving = false;
        let before = ghost.tile.position();

        let mut ctx = fixture.ctx(1.0 / 60.0);
        ghost.update(&mut ctx).expect("tick should succeed");

        assert_eq!(ghost.tile.position(), before);
        assert!(fixture.events.is_empty());
    }

    #[test]
    fn lane_recentering_pulls_vertical_motion_back_to_the_column_center() {
        let mut fixture = Fixture::new();
        fixture.player_cell = CellIndex::new(6, 1);
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(6, 5), Direction::Up);
        let (cx, cy) = ghost.tile.center_px();
        ghost.tile.set_position(cx + 0.4, cy);

        let mut ctx = fixture.ctx(1.0 / 60.0);
        ghost.update(&mut ctx).expect("tick should succeed");

        let (x, _) = ghost.tile.position();
        assert!((x - cx).abs() < 1e-3);
    }

    #[test]
    fn scatter_chase_timer_is_ignored_while_retreating() {
        let mut fixture = Fixture::new();
        fixture.timer_mode = GhostMode::Scatter;
        let mut ghost = roaming_ghost(&fixture, CellIndex::new(9, 11), Direction::Right);
        ghost.state = GhostState::Eyes;
        ghost.mode = GhostMode::GoingToHouse;

        let mut ctx = fixture.ctx(0.0);
        ghost.update(&mut ctx).expect("tick should succeed");

        assert_eq!(ghost.mode(), GhostMode::GoingToHouse);
    }
}
