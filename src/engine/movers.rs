use crate::constants::scatter_corner;
use crate::maze::Maze;
use crate::types::{CellIndex, Direction, GhostMode, GhostPersonality};

use super::ghost::{Ghost, TickContext};
use super::utils::manhattan_cells;

const TURN_ORDER: [Direction; 4] = [
    Direction::Up,
    Direction::Left,
    Direction::Down,
    Direction::Right,
];

const MAX_STEP_PX: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MoverKind {
    Scatter,
    Chase,
    Frightened,
    House,
    ReturnHome,
}

#[derive(Clone, Debug)]
pub struct Mover {
    mode: GhostMode,
    kind: MoverKind,
    target: CellIndex,
    decided_cell: Option<CellIndex>,
}

impl Mover {
    pub fn for_mode(mode: GhostMode, decided_cell: Option<CellIndex>) -> Option<Self> {
        let kind = match mode {
            GhostMode::Scatter => MoverKind::Scatter,
            GhostMode::Chase => MoverKind::Chase,
            GhostMode::Frightened => MoverKind::Frightened,
            GhostMode::InHouse => MoverKind::House,
            GhostMode::GoingToHouse => MoverKind::ReturnHome,
            GhostMode::Undecided => return None,
        };
        Some(Self {
            mode,
            kind,
            target: CellIndex::new(0, 0),
            decided_cell,
        })
    }

    pub fn mode(&self) -> GhostMode {
        self.mode
    }

    pub fn target(&self) -> CellIndex {
        self.target
    }

    pub fn advance(&mut self, ghost: &mut Ghost, speed_px: f32, ctx: &mut TickContext) {
        match self.kind {
            MoverKind::Scatter => {
                let target = scatter_corner(ghost.personality);
                self.seek(ghost, speed_px, ctx, target, false);
            }
            MoverKind::Chase => {
                let target = chase_target(ghost.personality, ghost.tile.cell(), ctx);
                self.seek(ghost, speed_px, ctx, target, false);
            }
            MoverKind::Frightened => self.advance_frightened(ghost, speed_px, ctx),
            MoverKind::House => self.advance_in_house(ghost, speed_px, ctx),
            MoverKind::ReturnHome => self.advance_return_home(ghost, speed_px, ctx),
        }
    }

    fn seek(
        &mut self,
        ghost: &mut Ghost,
        speed_px: f32,
        ctx: &TickContext,
        target: CellIndex,
        through_door: bool,
    ) {
        self.target = target;
        let mut remaining = speed_px;
        while remaining > 0.0 {
            let step = remaining.min(MAX_STEP_PX);
            remaining -= step;
            self.turn_at_center(ghost, ctx.maze, through_door);
            step_along(ghost, ghost.dir, step);
        }
    }

    fn turn_at_center(&mut self, ghost: &mut Ghost, maze: &Maze, through_door: bool) {
        if !ghost.tile.is_centered() {
            return;
        }
        let cell = ghost.tile.cell();
        if self.decided_cell == Some(cell) {
            return;
        }
        self.decided_cell = Some(cell);

        let reverse = ghost.dir.reverse();
        let mut best: Option<(f32, Direction)> = None;
        for dir in TURN_ORDER {
            if dir == reverse {
                continue;
            }
            let candidate = ghost.tile.adjacent(dir).cell();
            if !can_enter(maze, candidate, through_door) {
                continue;
            }
            let score = squared_distance(candidate, self.target);
            if best.map(|(s, _)| score < s).unwrap_or(true) {
                best = Some((score, dir));
            }
        }

        let chosen = match best {
            Some((_, dir)) => dir,
            None => reverse,
        };
        ghost.next_dir = chosen;
        ghost.dir = chosen;
    }

    fn advance_frightened(&mut self, ghost: &mut Ghost, speed_px: f32, ctx: &mut TickContext) {
        let mut remaining = speed_px;
        while remaining > 0.0 {
            let step = remaining.min(MAX_STEP_PX);
            remaining -= step;

            if ghost.tile.is_centered() {
                let cell = ghost.tile.cell();
                if self.decided_cell != Some(cell) {
                    self.decided_cell = Some(cell);
                    let reverse = ghost.dir.reverse();
                    let mut candidates = Vec::new();
                    for dir in TURN_ORDER {
                        if dir == reverse {
                            continue;
                        }
                        let candidate = ghost.tile.adjacent(dir).cell();
                        if can_enter(ctx.maze, candidate, false) {
                            candidates.push((dir, candidate));
                        }
                    }
                    let (chosen, chosen_cell) = if candidates.is_empty() {
                        (reverse, ghost.tile.adjacent(reverse).cell())
                    } else {
                        candidates[ctx.rng.pick_index(candidates.len())]
                    };
                    self.target = chosen_cell;
                    ghost.next_dir = chosen;
                    ghost.dir = chosen;
                }
            }
            step_along(ghost, ghost.dir, step);
        }
    }

    fn advance_in_house(&mut self, ghost: &mut Ghost, speed_px: f32, ctx: &TickContext) {
        self.target = ctx.house.exit_cell();
        let (x, y) = ghost.tile.position();

        if !ctx.house.may_leave(ghost.personality, ctx.now_ms) {
            if !ghost.dir.is_vertical() {
                ghost.dir = Direction::Up;
            }
            let mut next_y = y + ghost.dir.delta().1 as f32 * speed_px;
            if next_y <= ctx.house.bounce_min_y_px() {
                next_y = ctx.house.bounce_min_y_px();
                ghost.dir = Direction::Down;
            } else if next_y >= ctx.house.bounce_max_y_px() {
                next_y = ctx.house.bounce_max_y_px();
                ghost.dir = Direction::Up;
            }
            ghost.tile.set_position(x, next_y);
            return;
        }

        let align_x = ctx.house.align_x_px();
        if (x - align_x).abs() > 0.5 {
            let step = speed_px.min((x - align_x).abs());
            ghost.dir = if x > align_x {
                Direction::Left
            } else {
                Direction::Right
            };
            ghost.tile.set_position(x + ghost.dir.delta().0 as f32 * step, y);
            return;
        }

        let (exit_x, exit_y) = ctx.house.exit_cell().center_px();
        if y - exit_y > 0.5 {
            ghost.dir = Direction::Up;
            let step = speed_px.min(y - exit_y);
            ghost.tile.set_position(align_x, y - step);
            return;
        }

        ghost.tile.set_position(exit_x, exit_y);
        ghost.dir = Direction::Left;
        ghost.next_dir = Direction::Left;
        ghost.mode = GhostMode::Undecided;
    }

    fn advance_return_home(&mut self, ghost: &mut Ghost, speed_px: f32, ctx: &TickContext) {
        let inside = ctx.house.inside_cell();
        let cell = ghost.tile.cell();
        let descending = cell == ctx.house.exit_cell()
            || ctx.maze.is_door(cell)
            || ctx.maze.in_house(cell);
        let target = if descending { inside } else { ctx.house.exit_cell() };
        self.seek(ghost, speed_px, ctx, target, true);

        if ghost.tile.cell() == inside && ghost.tile.is_centered() {
            let (x, y) = inside.center_px();
            ghost.tile.set_position(x, y);
            ghost.mode = GhostMode::InHouse;
        }
    }
}

fn step_along(ghost: &mut Ghost, dir: Direction, step: f32) {
    let (dx, dy) = dir.delta();
    let (x, y) = ghost.tile.position();
    ghost
        .tile
        .set_position(x + dx as f32 * step, y + dy as f32 * step);
}

fn can_enter(maze: &Maze, cell: CellIndex, through_door: bool) -> bool {
    maze.is_walkable(cell) || (through_door && maze.is_door(cell))
}

fn squared_distance(a: CellIndex, b: CellIndex) -> f32 {
    let dx = (a.col - b.col) as f32;
    let dy = (a.row - b.row) as f32;
    dx * dx + dy * dy
}

fn chase_target(
    personality: GhostPersonality,
    ghost_cell: CellIndex,
    ctx: &TickContext,
) -> CellIndex {
    match personality {
        GhostPersonality::Chaser => ctx.player_cell,
        GhostPersonality::Ambusher => {
            let (dx, dy) = ctx.player_dir.delta();
            CellIndex::new(ctx.player_cell.col + dx * 4, ctx.player_cell.row + dy * 4)
        }
        GhostPersonality::Flanker => {
            let (dx, dy) = ctx.player_dir.delta();
            let probe = CellIndex::new(ctx.player_cell.col + dx * 2, ctx.player_cell.row + dy * 2);
            CellIndex::new(
                2 * probe.col - ctx.chaser_cell.col,
                2 * probe.row - ctx.chaser_cell.row,
            )
        }
        GhostPersonality::Wary => {
            if manhattan_cells(ghost_cell, ctx.player_cell) > 8 {
                ctx.player_cell
            } else {
                scatter_corner(GhostPersonality::Wary)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::constants::level_props;
    use crate::engine::phase::{FrightSession, GhostHouse, ModeTimer};
    use crate::rng::Rng;
    use crate::types::{GameEvent, GhostState};

    use super::*;

    struct Fixture {
        maze: Maze,
        house: GhostHouse,
        rng: Rng,
        events: Vec<GameEvent>,
        timer: ModeTimer,
        fright: Option<FrightSession>,
    }

    impl Fixture {
        fn new() -> Self {
            let maze = Maze::new();
            let mut house = GhostHouse::new(&maze);
            house.schedule_releases(0);
            Self {
                maze,
                house,
                rng: Rng::new(7),
                events: Vec::new(),
                timer: ModeTimer::for_level(1),
                fright: None,
            }
        }

        fn ctx(&mut self, now_ms: u64, dt_sec: f32) -> TickContext<'_> {
            TickContext {
                dt_sec,
                now_ms,
                maze: &self.maze,
                player_cell: CellIndex::new(13, 23),
                player_dir: Direction::Left,
                chaser_cell: CellIndex::new(13, 11),
                dots_remaining: 240,
                props: level_props(1),
                timer_mode: self.timer.current(),
                fright: self.fright.as_ref(),
                house: &self.house,
                rng: &mut self.rng,
                events: &mut self.events,
                suppress_player_eaten: false,
            }
        }
    }

    fn ghost_at(
        fixture: &Fixture,
        personality: GhostPersonality,
        cell: CellIndex,
        dir: Direction,
        mode: GhostMode,
    ) -> Ghost {
        let mut ghost = Ghost::new(personality, &fixture.maze);
        let (x, y) = cell.center_px();
        ghost.tile.set_position(x, y);
        ghost.dir = dir;
        ghost.next_dir = dir;
        ghost.mode = mode;
        ghost
    }

    #[test]
    fn undecided_mode_has_no_mover() {
        assert!(Mover::for_mode(GhostMode::Undecided, None).is_none());
        assert!(Mover::for_mode(GhostMode::Scatter, None).is_some());
    }

    #[test]
    fn scatter_mover_turns_toward_its_corner() {
        let mut fixture = Fixture::new();
        let mut ghost = ghost_at(
            &fixture,
            GhostPersonality::Chaser,
            CellIndex::new(6, 5),
            Direction::Down,
            GhostMode::Scatter,
        );
        let mut mover = Mover::for_mode(GhostMode::Scatter, None).unwrap();
        let mut ctx = fixture.ctx(0, 1.0 / 60.0);
        mover.advance(&mut ghost, 1.0, &mut ctx);
        assert_eq!(mover.target(), scatter_corner(GhostPersonality::Chaser));
        assert_eq!(ghost.dir, Direction::Right);
    }

    #[test]
    fn seeking_mover_never_picks_a_wall() {
        let mut fixture = Fixture::new();
        let mut ghost = ghost_at(
            &fixture,
            GhostPersonality::Ambusher,
            CellIndex::new(1, 1),
            Direction::Left,
            GhostMode::Scatter,
        );
        let mut mover = Mover::for_mode(GhostMode::Scatter, None).unwrap();
        let mut ctx = fixture.ctx(0, 1.0 / 60.0);
        mover.advance(&mut ghost, 1.0, &mut ctx);
        let next = ghost.tile.adjacent(ghost.dir).cell();
        assert!(fixture.maze.is_walkable(next));
    }

    #[test]
    fn frightened_mover_never_reverses_at_a_decision() {
        let mut fixture = Fixture::new();
        for seed in 0..50 {
            fixture.rng = Rng::new(seed);
            let mut ghost = ghost_at(
                &fixture,
                GhostPersonality::Flanker,
                CellIndex::new(6, 5),
                Direction::Right,
                GhostMode::Frightened,
            );
            let mut mover = Mover::for_mode(GhostMode::Frightened, None).unwrap();
            let mut ctx = fixture.ctx(0, 1.0 / 60.0);
            mover.advance(&mut ghost, 0.5, &mut ctx);
            assert_ne!(ghost.dir, Direction::Left);
        }
    }

    #[test]
    fn house_mover_bounces_until_release() {
        let mut fixture = Fixture::new();
        fixture.house.schedule_releases(0);
        let spawn = fixture.maze.ghost_spawn(GhostPersonality::Wary);
        let mut ghost = ghost_at(
            &fixture,
            GhostPersonality::Wary,
            spawn,
            Direction::Up,
            GhostMode::InHouse,
        );
        let mut mover = Mover::for_mode(GhostMode::InHouse, None).unwrap();
        for _ in 0..200 {
            let mut ctx = fixture.ctx(1_000, 1.0 / 60.0);
            mover.advance(&mut ghost, 0.5, &mut ctx);
            let (_, y) = ghost.tile.position();
            assert!(y >= fixture.house.bounce_min_y_px());
            assert!(y <= fixture.house.bounce_max_y_px());
        }
        assert_eq!(ghost.mode, GhostMode::InHouse);
    }

    #[test]
    fn house_mover_walks_out_and_flips_to_undecided() {
        let mut fixture = Fixture::new();
        fixture.house.schedule_releases(0);
        let spawn = fixture.maze.ghost_spawn(GhostPersonality::Wary);
        let mut ghost = ghost_at(
            &fixture,
            GhostPersonality::Wary,
            spawn,
            Direction::Up,
            GhostMode::InHouse,
        );
        let mut mover = Mover::for_mode(GhostMode::InHouse, None).unwrap();
        for _ in 0..600 {
            let mut ctx = fixture.ctx(60_000, 1.0 / 60.0);
            mover.advance(&mut ghost, 0.5, &mut ctx);
            if ghost.mode == GhostMode::Undecided {
                break;
            }
        }
        assert_eq!(ghost.mode, GhostMode::Undecided);
        assert_eq!(ghost.tile.cell(), fixture.house.exit_cell());
    }

    #[test]
    fn return_home_mover_reaches_the_house_and_enters_it() {
        let mut fixture = Fixture::new();
        let mut ghost = ghost_at(
            &fixture,
            GhostPersonality::Chaser,
            CellIndex::new(9, 11),
            Direction::Right,
            GhostMode::GoingToHouse,
        );
        ghost.state = GhostState::Eyes;
        let mut mover = Mover::for_mode(GhostMode::GoingToHouse, None).unwrap();
        for _ in 0..2_000 {
            let mut ctx = fixture.ctx(0, 1.0 / 60.0);
            mover.advance(&mut ghost, 2.0, &mut ctx);
            if ghost.mode == GhostMode::InHouse {
                break;
            }
        }
        assert_eq!(ghost.mode, GhostMode::InHouse);
        assert_eq!(ghost.tile.cell(), fixture.house.inside_cell());
    }

    #[test]
    fn chase_targets_differ_by_personality() {
        let mut fixture = Fixture::new();
        let mut ctx = fixture.ctx(0, 1.0 / 60.0);
        ctx.player_cell = CellIndex::new(10, 20);
        ctx.player_dir = Direction::Up;
        ctx.chaser_cell = CellIndex::new(6, 20);

        let chaser = chase_target(GhostPersonality::Chaser, CellIndex::new(1, 1), &ctx);
        assert_eq!(chaser, CellIndex::new(10, 20));

        let ambusher = chase_target(GhostPersonality::Ambusher, CellIndex::new(1, 1), &ctx);
        assert_eq!(ambusher, CellIndex::new(10, 16));

        let flanker = chase_target(GhostPersonality::Flanker, CellIndex::new(1, 1), &ctx);
        assert_eq!(flanker, CellIndex::new(14, 16));

        let far_wary = chase_target(GhostPersonality::Wary, CellIndex::new(1, 1), &ctx);
        assert_eq!(far_wary, CellIndex::new(10, 20));

        let near_wary = chase_target(GhostPersonality::Wary, CellIndex::new(9, 20), &ctx);
        assert_eq!(near_wary, scatter_corner(GhostPersonality::Wary));
    }
}
