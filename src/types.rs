use serde::Serialize;

use crate::constants::CELL_PX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::None => Self::None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::None => (0, 0),
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostState {
    Normal,
    Frightened,
    Eyes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostMode {
    InHouse,
    Undecided,
    Scatter,
    Chase,
    Frightened,
    GoingToHouse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostPersonality {
    Chaser,
    Ambusher,
    Flanker,
    Wary,
}

impl GhostPersonality {
    pub fn all() -> [Self; 4] {
        [Self::Chaser, Self::Ambusher, Self::Flanker, Self::Wary]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CellIndex {
    pub col: i32,
    pub row: i32,
}

impl CellIndex {
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    pub fn from_px(x: f32, y: f32) -> Self {
        Self {
            col: (x / CELL_PX as f32).floor() as i32,
            row: (y / CELL_PX as f32).floor() as i32,
        }
    }

    pub fn top_left_px(self) -> (f32, f32) {
        ((self.col * CELL_PX) as f32, (self.row * CELL_PX) as f32)
    }

    pub fn center_px(self) -> (f32, f32) {
        let (x, y) = self.top_left_px();
        let half = CELL_PX as f32 / 2.0;
        (x + half, y + half)
    }

    pub fn offset(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            col: self.col + dx,
            row: self.row + dy,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LevelProps {
    pub level: u32,
    pub player_speed_pct: u32,
    pub player_fright_speed_pct: u32,
    pub ghost_speed_pct: u32,
    pub tunnel_speed_pct: u32,
    pub fright_speed_pct: u32,
    pub fright_duration_ms: u64,
    pub elroy_dots_1: i32,
    pub elroy_dots_2: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameConfig {
    #[serde(rename = "tickRate")]
    pub tick_rate: u32,
    #[serde(rename = "cellPx")]
    pub cell_px: i32,
    #[serde(rename = "startingLives")]
    pub starting_lives: i32,
    #[serde(rename = "extraLifeScore")]
    pub extra_life_score: i32,
    #[serde(rename = "startingLevel")]
    pub starting_level: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct WorldInit {
    #[serde(rename = "widthCells")]
    pub width_cells: i32,
    #[serde(rename = "heightCells")]
    pub height_cells: i32,
    #[serde(rename = "cellPx")]
    pub cell_px: i32,
    pub tiles: Vec<String>,
    #[serde(rename = "playerSpawn")]
    pub player_spawn: CellIndex,
    #[serde(rename = "ghostSpawns")]
    pub ghost_spawns: Vec<(GhostPersonality, CellIndex)>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub dir: Direction,
    pub moving: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct GhostView {
    pub id: GhostPersonality,
    pub x: f32,
    pub y: f32,
    pub dir: Direction,
    pub state: GhostState,
    pub mode: GhostMode,
    pub visible: bool,
    #[serde(rename = "targetCol")]
    pub target_col: i32,
    #[serde(rename = "targetRow")]
    pub target_row: i32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    DotEaten {
        x: i32,
        y: i32,
    },
    PowerPelletEaten {
        x: i32,
        y: i32,
    },
    GhostEaten {
        ghost: GhostPersonality,
    },
    PlayerEaten {
        by: GhostPersonality,
    },
    LifeLost {
        #[serde(rename = "livesLeft")]
        lives_left: i32,
    },
    ExtraLife {
        score: i32,
    },
    LevelCleared {
        level: u32,
    },
    GameOver {
        score: i32,
        level: u32,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "nowMs")]
    pub now_ms: u64,
    pub level: u32,
    pub score: i32,
    pub lives: i32,
    #[serde(rename = "dotsRemaining")]
    pub dots_remaining: i32,
    #[serde(rename = "frightMsLeft")]
    pub fright_ms_left: u64,
    pub player: PlayerView,
    pub ghosts: Vec<GhostView>,
    pub events: Vec<GameEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    OutOfLives,
    Aborted,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub reason: GameOverReason,
    pub score: i32,
    #[serde(rename = "levelReached")]
    pub level_reached: u32,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "dotsEaten")]
    pub dots_eaten: i32,
    #[serde(rename = "ghostsEaten")]
    pub ghosts_eaten: i32,
    #[serde(rename = "livesUsed")]
    pub lives_used: i32,
}

#[derive(Clone, Debug)]
pub struct StartPlayer {
    pub id: String,
    pub name: String,
    pub reconnect_token: String,
    pub connected: bool,
}
