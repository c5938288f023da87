use crate::types::{GhostMode, GhostPersonality, LevelProps};

pub const TICK_RATE: u32 = 60;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const CELL_PX: i32 = 8;
pub const CENTER_TOLERANCE_PX: f32 = 0.75;

pub const FULL_SPEED_PX_PER_SEC: f32 = 76.0;
pub const HOUSE_SPEED_PX_PER_SEC: f32 = 30.0;
pub const EYES_SPEED_PX_PER_SEC: f32 = 152.0;

pub const STARTING_LIVES: i32 = 3;
pub const EXTRA_LIFE_SCORE: i32 = 10_000;
pub const DOT_SCORE: i32 = 10;
pub const POWER_PELLET_SCORE: i32 = 50;
pub const GHOST_SCORE: i32 = 200;
pub const MAX_GHOST_CHAIN: i32 = 3;

pub const DEATH_HOLD_MS: u64 = 2_000;
pub const LEVEL_CLEAR_HOLD_MS: u64 = 2_500;

pub const ELROY_BOOST_1_PCT: u32 = 5;
pub const ELROY_BOOST_2_PCT: u32 = 10;

pub fn level_props(level: u32) -> LevelProps {
    let level = level.max(1);
    if level == 1 {
        return LevelProps {
            level,
            player_speed_pct: 80,
            player_fright_speed_pct: 90,
            ghost_speed_pct: 75,
            tunnel_speed_pct: 40,
            fright_speed_pct: 50,
            fright_duration_ms: 6_000,
            elroy_dots_1: 20,
            elroy_dots_2: 10,
        };
    }
    if level <= 4 {
        return LevelProps {
            level,
            player_speed_pct: 90,
            player_fright_speed_pct: 95,
            ghost_speed_pct: 85,
            tunnel_speed_pct: 45,
            fright_speed_pct: 55,
            fright_duration_ms: 5_000,
            elroy_dots_1: 30,
            elroy_dots_2: 15,
        };
    }
    if level <= 20 {
        return LevelProps {
            level,
            player_speed_pct: 100,
            player_fright_speed_pct: 100,
            ghost_speed_pct: 95,
            tunnel_speed_pct: 50,
            fright_speed_pct: 60,
            fright_duration_ms: 2_000,
            elroy_dots_1: 40,
            elroy_dots_2: 20,
        };
    }
    LevelProps {
        level,
        player_speed_pct: 90,
        player_fright_speed_pct: 90,
        ghost_speed_pct: 95,
        tunnel_speed_pct: 50,
        fright_speed_pct: 60,
        fright_duration_ms: 1_000,
        elroy_dots_1: 40,
        elroy_dots_2: 20,
    }
}

pub fn scatter_chase_phases(level: u32) -> Vec<(GhostMode, u64)> {
    let scatter_tail_ms = if level >= 5 { 4_000 } else { 5_000 };
    vec![
        (GhostMode::Scatter, 7_000),
        (GhostMode::Chase, 20_000),
        (GhostMode::Scatter, 7_000),
        (GhostMode::Chase, 20_000),
        (GhostMode::Scatter, scatter_tail_ms),
        (GhostMode::Chase, 20_000),
        (GhostMode::Scatter, scatter_tail_ms),
    ]
}

pub fn house_release_delay_ms(personality: GhostPersonality) -> u64 {
    match personality {
        GhostPersonality::Chaser => 0,
        GhostPersonality::Ambusher => 3_000,
        GhostPersonality::Flanker => 8_000,
        GhostPersonality::Wary => 15_000,
    }
}

pub fn scatter_corner(personality: GhostPersonality) -> crate::types::CellIndex {
    use crate::types::CellIndex;
    match personality {
        GhostPersonality::Chaser => CellIndex::new(25, 0),
        GhostPersonality::Ambusher => CellIndex::new(2, 0),
        GhostPersonality::Flanker => CellIndex::new(27, 30),
        GhostPersonality::Wary => CellIndex::new(0, 30),
    }
}
