use std::collections::BTreeSet;

use crate::constants::{
    level_props, CELL_PX, DEATH_HOLD_MS, DOT_SCORE, EXTRA_LIFE_SCORE, FULL_SPEED_PX_PER_SEC,
    GHOST_SCORE, LEVEL_CLEAR_HOLD_MS, MAX_GHOST_CHAIN, POWER_PELLET_SCORE, STARTING_LIVES,
    TICK_RATE,
};
use crate::maze::Maze;
use crate::rng::Rng;
use crate::types::{
    CellIndex, Direction, GameConfig, GameEvent, GameOverReason, GameSummary, GhostPersonality,
    GhostState, PlayerView, Snapshot, StartPlayer, WorldInit,
};

pub mod ghost;
pub mod movers;
pub mod phase;
pub mod tile;
mod utils;

use self::ghost::{Ghost, TickContext, TickError};
use self::phase::{FrightSession, GhostHouse, ModeTimer};
use self::tile::Tile;
use self::utils::{manhattan_cells, now_ms};

const MAX_STEP_PX: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingReset {
    LifeLost,
    LevelClear,
}

#[derive(Clone, Debug)]
struct PlayerInternal {
    id: String,
    name: String,
    reconnect_token: String,
    connected: bool,
    ai: bool,
    tile: Tile,
    dir: Direction,
    next_dir: Direction,
    moving: bool,
    ai_think_at: u64,
}

#[derive(Clone, Debug, Default)]
pub struct GameEngineOptions {
    pub starting_level: Option<u32>,
    pub invincible_player: bool,
}

#[derive(Clone, Debug)]
pub struct GameEngine {
    pub started_at_ms: u64,
    pub config: GameConfig,

    maze: Maze,
    rng: Rng,
    seed: u32,
    player: PlayerInternal,
    ghosts: Vec<Ghost>,
    dots: BTreeSet<(i32, i32)>,
    energizers: BTreeSet<(i32, i32)>,
    events: Vec<GameEvent>,
    mode_timer: ModeTimer,
    fright: Option<FrightSession>,
    fright_chain: i32,
    house: GhostHouse,
    invincible_player: bool,

    level: u32,
    score: i32,
    lives: i32,
    dots_eaten: i32,
    ghosts_eaten: i32,
    lives_used: i32,
    extra_life_awarded: bool,

    elapsed_ms: u64,
    tick_counter: u64,
    hold_until_ms: u64,
    pending_reset: Option<PendingReset>,
    ended: bool,
    end_reason: Option<GameOverReason>,
}

impl GameEngine {
    pub fn new(start_player: StartPlayer, seed: u32, options: GameEngineOptions) -> Self {
        let mut rng = Rng::new(seed);
        let started_at_ms = now_ms();
        let maze = Maze::new();
        let starting_level = options.starting_level.unwrap_or(1).max(1);

        let config = GameConfig {
            tick_rate: TICK_RATE,
            cell_px: CELL_PX,
            starting_lives: STARTING_LIVES,
            extra_life_score: EXTRA_LIFE_SCORE,
            starting_level,
        };

        let spawn = maze.player_spawn();
        let player = PlayerInternal {
            id: start_player.id,
            name: start_player.name,
            reconnect_token: start_player.reconnect_token,
            connected: start_player.connected,
            ai: !start_player.connected,
            tile: Tile::at_cell_center(spawn, maze.width_cells()),
            dir: Direction::Left,
            next_dir: Direction::Left,
            moving: false,
            ai_think_at: started_at_ms + rng.int(50, 180) as u64,
        };

        let ghosts = GhostPersonality::all()
            .into_iter()
            .map(|personality| Ghost::new(personality, &maze))
            .collect();
        let mut house = GhostHouse::new(&maze);
        house.schedule_releases(started_at_ms);
        let dots = maze.dot_cells();
        let energizers = maze.energizer_cells();

        Self {
            started_at_ms,
            config,
            maze,
            rng,
            seed,
            player,
            ghosts,
            dots,
            energizers,
            events: Vec::new(),
            mode_timer: ModeTimer::for_level(starting_level),
            fright: None,
            fright_chain: 0,
            house,
            invincible_player: options.invincible_player,
            level: starting_level,
            score: 0,
            lives: STARTING_LIVES,
            dots_eaten: 0,
            ghosts_eaten: 0,
            lives_used: 0,
            extra_life_awarded: false,
            elapsed_ms: 0,
            tick_counter: 0,
            hold_until_ms: 0,
            pending_reset: None,
            ended: false,
            end_reason: None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn get_world_init(&self) -> WorldInit {
        self.maze.to_world_init()
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.player.id == player_id
    }

    pub fn get_reconnect_token(&self, player_id: &str) -> Option<String> {
        if self.player.id == player_id {
            Some(self.player.reconnect_token.clone())
        } else {
            None
        }
    }

    pub fn set_player_connection(&mut self, player_id: &str, connected: bool) {
        if self.player.id == player_id {
            self.player.connected = connected;
            self.player.ai = !connected;
        }
    }

    pub fn receive_input(&mut self, player_id: &str, dir: Option<Direction>) {
        if self.player.id != player_id || self.player.ai {
            return;
        }
        if let Some(dir) = dir {
            self.player.next_dir = dir;
        }
    }

    /// Marks the game as ended after an unrecoverable tick failure.
    pub fn abort(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.end_reason = Some(GameOverReason::Aborted);
        self.events.push(GameEvent::GameOver {
            score: self.score,
            level: self.level,
        });
    }

    pub fn step(&mut self, dt_ms: u64) -> Result<(), TickError> {
        if self.ended {
            return Ok(());
        }
        self.tick_counter += 1;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        let now_ms = self.started_at_ms.saturating_add(self.elapsed_ms);

        if now_ms < self.hold_until_ms {
            return Ok(());
        }
        if let Some(pending) = self.pending_reset.take() {
            self.apply_reset(pending, now_ms);
        }

        // The scatter/chase clock pauses while a fright session runs.
        if self.fright.is_none() {
            self.mode_timer.advance(dt_ms);
        }

        if self.player.ai {
            self.drive_player_ai(now_ms);
        }
        self.update_player(dt_ms);
        self.apply_player_pickups(now_ms);

        let events_before = self.events.len();
        self.update_ghosts(dt_ms, now_ms)?;
        self.apply_collision_outcomes(events_before, now_ms);

        if let Some(session) = self.fright {
            if session.finished(now_ms) {
                self.fright = None;
            }
        }

        self.check_extra_life();
        self.check_level_clear(now_ms);
        Ok(())
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let now_ms = self.started_at_ms.saturating_add(self.elapsed_ms);
        let (px, py) = self.player.tile.position();
        let snapshot = Snapshot {
            tick: self.tick_counter,
            now_ms,
            level: self.level,
            score: self.score,
            lives: self.lives,
            dots_remaining: self.dots.len() as i32,
            fright_ms_left: self
                .fright
                .map(|session| session.remaining_ms(now_ms))
                .unwrap_or(0),
            player: PlayerView {
                x: px,
                y: py,
                dir: self.player.dir,
                moving: self.player.moving,
            },
            ghosts: self.ghosts.iter().map(|ghost| ghost.view()).collect(),
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    pub fn build_summary(&self) -> GameSummary {
        GameSummary {
            reason: self.end_reason.unwrap_or(GameOverReason::OutOfLives),
            score: self.score,
            level_reached: self.level,
            duration_ms: self.elapsed_ms,
            dots_eaten: self.dots_eaten,
            ghosts_eaten: self.ghosts_eaten,
            lives_used: self.lives_used,
        }
    }

    fn apply_reset(&mut self, pending: PendingReset, now_ms: u64) {
        if pending == PendingReset::LevelClear {
            self.level += 1;
            self.dots = self.maze.dot_cells();
            self.energizers = self.maze.energizer_cells();
        }
        self.mode_timer = ModeTimer::for_level(self.level);
        self.fright = None;
        self.fright_chain = 0;
        self.house.schedule_releases(now_ms);
        for ghost in &mut self.ghosts {
            ghost.reset();
        }
        let spawn = self.maze.player_spawn();
        let (x, y) = spawn.center_px();
        self.player.tile.set_position(x, y);
        self.player.dir = Direction::Left;
        self.player.next_dir = Direction::Left;
        self.player.moving = false;
        self.player.ai_think_at = now_ms;
    }

    fn drive_player_ai(&mut self, now_ms: u64) {
        if now_ms < self.player.ai_think_at {
            return;
        }
        self.player.ai_think_at = now_ms + self.rng.int(90, 190) as u64;
        let cell = self.player.tile.cell();

        if let Some(ghost_cell) = self.nearest_ghost_cell(GhostState::Normal) {
            if manhattan_cells(cell, ghost_cell) <= 4 {
                self.player.next_dir = self.choose_escape_direction(cell);
                return;
            }
        }

        if self.fright.is_some() {
            if let Some(ghost_cell) = self.nearest_ghost_cell(GhostState::Frightened) {
                if manhattan_cells(cell, ghost_cell) <= 8 {
                    self.player.next_dir = self.choose_toward_direction(cell, ghost_cell);
                    return;
                }
            }
        }

        if let Some(dot) = self.nearest_pickup(cell) {
            self.player.next_dir = self.choose_toward_direction(cell, dot);
        }
    }

    fn nearest_ghost_cell(&self, state: GhostState) -> Option<CellIndex> {
        self.ghosts
            .iter()
            .filter(|ghost| ghost.state() == state)
            .map(|ghost| ghost.cell())
            .min_by_key(|ghost_cell| manhattan_cells(self.player.tile.cell(), *ghost_cell))
    }

    fn nearest_pickup(&self, from: CellIndex) -> Option<CellIndex> {
        self.dots
            .iter()
            .chain(self.energizers.iter())
            .map(|(col, row)| CellIndex::new(*col, *row))
            .min_by_key(|cell| manhattan_cells(from, *cell))
    }

    fn choose_escape_direction(&self, from: CellIndex) -> Direction {
        let threats: Vec<CellIndex> = self
            .ghosts
            .iter()
            .filter(|ghost| ghost.state() == GhostState::Normal)
            .map(|ghost| ghost.cell())
            .collect();
        let mut best: Option<(i32, Direction)> = None;
        for dir in [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ] {
            let mut next = from.offset(dir);
            next.col = self.maze.wrap_col(next.col);
            if !self.maze.is_walkable(next) {
                continue;
            }
            let clearance = threats
                .iter()
                .map(|threat| manhattan_cells(next, *threat))
                .min()
                .unwrap_or(i32::MAX);
            if best.map(|(score, _)| clearance > score).unwrap_or(true) {
                best = Some((clearance, dir));
            }
        }
        best.map(|(_, dir)| dir).unwrap_or(self.player.dir)
    }

    fn choose_toward_direction(&self, from: CellIndex, target: CellIndex) -> Direction {
        let reverse = self.player.dir.reverse();
        let mut best: Option<(i32, Direction)> = None;
        let mut reverse_fallback: Option<Direction> = None;
        for dir in [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ] {
            let mut next = from.offset(dir);
            next.col = self.maze.wrap_col(next.col);
            if !self.maze.is_walkable(next) {
                continue;
            }
            if dir == reverse {
                reverse_fallback = Some(dir);
                continue;
            }
            let distance = manhattan_cells(next, target);
            if best.map(|(score, _)| distance < score).unwrap_or(true) {
                best = Some((distance, dir));
            }
        }
        best.map(|(_, dir)| dir)
            .or(reverse_fallback)
            .unwrap_or(self.player.dir)
    }

    fn update_player(&mut self, dt_ms: u64) {
        let props = level_props(self.level);
        let speed_pct = if self.fright.is_some() {
            props.player_fright_speed_pct
        } else {
            props.player_speed_pct
        };
        let speed_px = FULL_SPEED_PX_PER_SEC * speed_pct as f32 / 100.0 * dt_ms as f32 / 1000.0;

        let desired = self.player.next_dir;
        if desired != Direction::None && desired == self.player.dir.reverse() {
            self.player.dir = desired;
        }

        let mut moved = false;
        let mut remaining = speed_px;
        while remaining > 0.0 {
            let step = remaining.min(MAX_STEP_PX);
            remaining -= step;

            if self.player.tile.is_centered() {
                let desired = self.player.next_dir;
                if desired != Direction::None
                    && desired != self.player.dir
                    && self.walkable_from_player(desired)
                {
                    let (cx, cy) = self.player.tile.center_px();
                    self.player.tile.set_position(cx, cy);
                    self.player.dir = desired;
                }
                if !self.walkable_from_player(self.player.dir) {
                    let (cx, cy) = self.player.tile.center_px();
                    self.player.tile.set_position(cx, cy);
                    break;
                }
            }

            let (dx, dy) = self.player.dir.delta();
            if dx == 0 && dy == 0 {
                break;
            }
            let (x, y) = self.player.tile.position();
            self.player
                .tile
                .set_position(x + dx as f32 * step, y + dy as f32 * step);
            moved = true;
        }
        self.player.moving = moved;
    }

    fn walkable_from_player(&mut self, dir: Direction) -> bool {
        let next = self.player.tile.adjacent_cell(dir);
        self.maze.is_walkable(next)
    }

    fn apply_player_pickups(&mut self, now_ms: u64) {
        let cell = self.player.tile.cell();
        let key = (cell.col, cell.row);

        if self.dots.remove(&key) {
            self.score += DOT_SCORE;
            self.dots_eaten += 1;
            self.events.push(GameEvent::DotEaten {
                x: cell.col,
                y: cell.row,
            });
        }

        if self.energizers.remove(&key) {
            self.score += POWER_PELLET_SCORE;
            let props = level_props(self.level);
            self.fright = Some(FrightSession::new(now_ms, props.fright_duration_ms));
            self.fright_chain = 0;
            for ghost in &mut self.ghosts {
                ghost.on_power_pellet();
            }
            self.events.push(GameEvent::PowerPelletEaten {
                x: cell.col,
                y: cell.row,
            });
        }
    }

    fn update_ghosts(&mut self, dt_ms: u64, now_ms: u64) -> Result<(), TickError> {
        let player_cell = self.player.tile.cell();
        let player_dir = self.player.dir;
        let chaser_cell = self
            .ghosts
            .iter()
            .find(|ghost| ghost.personality() == GhostPersonality::Chaser)
            .map(|ghost| ghost.cell())
            .unwrap_or(player_cell);
        let props = level_props(self.level);
        let timer_mode = self.mode_timer.current();
        let dots_remaining = self.dots.len() as i32;

        let mut ghosts = std::mem::take(&mut self.ghosts);
        let mut outcome = Ok(());
        for ghost in ghosts.iter_mut() {
            let mut ctx = TickContext {
                dt_sec: dt_ms as f32 / 1000.0,
                now_ms,
                maze: &self.maze,
                player_cell,
                player_dir,
                chaser_cell,
                dots_remaining,
                props,
                timer_mode,
                fright: self.fright.as_ref(),
                house: &self.house,
                rng: &mut self.rng,
                events: &mut self.events,
                suppress_player_eaten: self.invincible_player,
            };
            if let Err(error) = ghost.update(&mut ctx) {
                outcome = Err(error);
                break;
            }
        }
        self.ghosts = ghosts;
        outcome
    }

    fn apply_collision_outcomes(&mut self, events_before: usize, now_ms: u64) {
        let mut ghosts_eaten = 0;
        let mut player_eaten = false;
        for event in &self.events[events_before..] {
            match event {
                GameEvent::GhostEaten { .. } => ghosts_eaten += 1,
                GameEvent::PlayerEaten { .. } => player_eaten = true,
                _ => {}
            }
        }

        for _ in 0..ghosts_eaten {
            self.score += GHOST_SCORE << self.fright_chain;
            self.fright_chain = (self.fright_chain + 1).min(MAX_GHOST_CHAIN);
            self.ghosts_eaten += 1;
        }

        if player_eaten {
            self.lives -= 1;
            self.lives_used += 1;
            self.events.push(GameEvent::LifeLost {
                lives_left: self.lives,
            });
            if self.lives <= 0 {
                self.ended = true;
                self.end_reason = Some(GameOverReason::OutOfLives);
                self.events.push(GameEvent::GameOver {
                    score: self.score,
                    level: self.level,
                });
            } else {
                self.hold_until_ms = now_ms + DEATH_HOLD_MS;
                self.pending_reset = Some(PendingReset::LifeLost);
            }
        }
    }

    fn check_extra_life(&mut self) {
        if self.extra_life_awarded || self.score < EXTRA_LIFE_SCORE {
            return;
        }
        self.extra_life_awarded = true;
        self.lives += 1;
        self.events.push(GameEvent::ExtraLife { score: self.score });
    }

    fn check_level_clear(&mut self, now_ms: u64) {
        if self.ended || self.pending_reset.is_some() {
            return;
        }
        if !self.dots.is_empty() || !self.energizers.is_empty() {
            return;
        }
        self.events.push(GameEvent::LevelCleared { level: self.level });
        self.hold_until_ms = now_ms + LEVEL_CLEAR_HOLD_MS;
        self.pending_reset = Some(PendingReset::LevelClear);
    }
}
