use std::collections::BTreeSet;

use crate::types::{CellIndex, GhostPersonality, WorldInit};

pub const LAYOUT: [&str; 31] = [
    "############################",
    "#............##............#",
    "#.####.#####.##.#####.####.#",
    "#o####.#####.##.#####.####o#",
    "#.####.#####.##.#####.####.#",
    "#..........................#",
    "#.####.##.########.##.####.#",
    "#.####.##.########.##.####.#",
    "#......##....##....##......#",
    "######.##### ## #####.######",
    "######.##### ## #####.######",
    "######.##          ##.######",
    "######.## ###--### ##.######",
    "######.## #      # ##.######",
    "tttttt.   #      #   .tttttt",
    "######.## #      # ##.######",
    "######.## ######## ##.######",
    "######.##          ##.######",
    "######.## ######## ##.######",
    "######.## ######## ##.######",
    "#............##............#",
    "#.####.#####.##.#####.####.#",
    "#.####.#####.##.#####.####.#",
    "#o..##.......  .......##..o#",
    "###.##.##.########.##.##.###",
    "###.##.##.########.##.##.###",
    "#......##....##....##......#",
    "#.##########.##.##########.#",
    "#.##########.##.##########.#",
    "#..........................#",
    "############################",
];

const PLAYER_SPAWN: CellIndex = CellIndex { col: 13, row: 23 };
const HOUSE_EXIT: CellIndex = CellIndex { col: 13, row: 11 };
const HOUSE_INSIDE: CellIndex = CellIndex { col: 13, row: 14 };
const HOUSE_COLS: (i32, i32) = (11, 16);
const HOUSE_ROWS: (i32, i32) = (13, 15);

#[derive(Clone, Debug)]
pub struct Maze {
    width_cells: i32,
    height_cells: i32,
    rows: Vec<String>,
}

impl Maze {
    pub fn new() -> Self {
        let rows: Vec<String> = LAYOUT.iter().map(|row| row.to_string()).collect();
        let width_cells = rows.first().map(|row| row.len()).unwrap_or(0) as i32;
        let height_cells = rows.len() as i32;
        Self {
            width_cells,
            height_cells,
            rows,
        }
    }

    pub fn width_cells(&self) -> i32 {
        self.width_cells
    }

    pub fn height_cells(&self) -> i32 {
        self.height_cells
    }

    pub fn wrap_col(&self, col: i32) -> i32 {
        col.rem_euclid(self.width_cells)
    }

    fn char_at(&self, cell: CellIndex) -> Option<u8> {
        if cell.row < 0 || cell.row >= self.height_cells {
            return None;
        }
        let col = self.wrap_col(cell.col);
        self.rows
            .get(cell.row as usize)
            .and_then(|row| row.as_bytes().get(col as usize))
            .copied()
    }

    pub fn is_walkable(&self, cell: CellIndex) -> bool {
        matches!(self.char_at(cell), Some(b'.') | Some(b'o') | Some(b' ') | Some(b't'))
    }

    pub fn is_door(&self, cell: CellIndex) -> bool {
        self.char_at(cell) == Some(b'-')
    }

    pub fn is_tunnel(&self, cell: CellIndex) -> bool {
        self.char_at(cell) == Some(b't')
    }

    pub fn in_house(&self, cell: CellIndex) -> bool {
        (HOUSE_COLS.0..=HOUSE_COLS.1).contains(&cell.col)
            && (HOUSE_ROWS.0..=HOUSE_ROWS.1).contains(&cell.row)
    }

    pub fn player_spawn(&self) -> CellIndex {
        PLAYER_SPAWN
    }

    pub fn house_exit(&self) -> CellIndex {
        HOUSE_EXIT
    }

    pub fn house_inside(&self) -> CellIndex {
        HOUSE_INSIDE
    }

    pub fn ghost_spawn(&self, personality: GhostPersonality) -> CellIndex {
        match personality {
            GhostPersonality::Chaser => CellIndex::new(13, 14),
            GhostPersonality::Ambusher => CellIndex::new(14, 14),
            GhostPersonality::Flanker => CellIndex::new(11, 14),
            GhostPersonality::Wary => CellIndex::new(16, 14),
        }
    }

    pub fn dot_cells(&self) -> BTreeSet<(i32, i32)> {
        self.cells_with(b'.')
    }

    pub fn energizer_cells(&self) -> BTreeSet<(i32, i32)> {
        self.cells_with(b'o')
    }

    fn cells_with(&self, wanted: u8) -> BTreeSet<(i32, i32)> {
        let mut out = BTreeSet::new();
        for (row_idx, row) in self.rows.iter().enumerate() {
            for (col_idx, value) in row.as_bytes().iter().enumerate() {
                if *value == wanted {
                    out.insert((col_idx as i32, row_idx as i32));
                }
            }
        }
        out
    }

    pub fn to_world_init(&self) -> WorldInit {
        WorldInit {
            width_cells: self.width_cells,
            height_cells: self.height_cells,
            cell_px: crate::constants::CELL_PX,
            tiles: self.rows.clone(),
            player_spawn: self.player_spawn(),
            ghost_spawns: GhostPersonality::all()
                .into_iter()
                .map(|personality| (personality, self.ghost_spawn(personality)))
                .collect(),
        }
    }
}

impl Default for Maze {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};

    use crate::types::Direction;

    use super::*;

    fn reachable_from_player_spawn(maze: &Maze) -> HashSet<(i32, i32)> {
        let mut out = HashSet::new();
        let start = maze.player_spawn();
        assert!(maze.is_walkable(start));

        let mut queue = VecDeque::new();
        out.insert((start.col, start.row));
        queue.push_back(start);

        while let Some(cell) = queue.pop_front() {
            for dir in [
                Direction::Up,
                Direction::Down,
                Direction::Left,
                Direction::Right,
            ] {
                let mut next = cell.offset(dir);
                next.col = maze.wrap_col(next.col);
                if !maze.is_walkable(next) {
                    continue;
                }
                if out.insert((next.col, next.row)) {
                    queue.push_back(next);
                }
            }
        }

        out
    }

    #[test]
    fn layout_has_expected_dimensions() {
        let maze = Maze::new();
        assert_eq!(maze.width_cells(), 28);
        assert_eq!(maze.height_cells(), 31);
        for row in LAYOUT {
            assert_eq!(row.len(), 28);
        }
    }

    #[test]
    fn layout_is_left_right_symmetric() {
        for row in LAYOUT {
            let reversed: String = row.chars().rev().collect();
            assert_eq!(row, reversed.as_str());
        }
    }

    #[test]
    fn tunnel_row_wraps_between_both_edges() {
        let maze = Maze::new();
        let left = CellIndex::new(0, 14);
        let right = CellIndex::new(27, 14);
        assert!(maze.is_walkable(left));
        assert!(maze.is_walkable(right));
        assert!(maze.is_tunnel(left));
        assert!(maze.is_tunnel(right));
        assert_eq!(maze.wrap_col(-1), 27);
        assert_eq!(maze.wrap_col(28), 0);
        assert!(maze.is_walkable(CellIndex::new(-1, 14)));
    }

    #[test]
    fn door_cells_are_doors_not_walkable() {
        let maze = Maze::new();
        for col in [13, 14] {
            let cell = CellIndex::new(col, 12);
            assert!(maze.is_door(cell));
            assert!(!maze.is_walkable(cell));
        }
    }

    #[test]
    fn classic_dot_and_energizer_counts() {
        let maze = Maze::new();
        assert_eq!(maze.dot_cells().len(), 240);
        assert_eq!(maze.energizer_cells().len(), 4);
    }

    #[test]
    fn every_dot_and_energizer_is_reachable_from_spawn() {
        let maze = Maze::new();
        let reachable = reachable_from_player_spawn(&maze);
        for (x, y) in maze.dot_cells() {
            assert!(reachable.contains(&(x, y)), "dot is unreachable: ({x},{y})");
        }
        for (x, y) in maze.energizer_cells() {
            assert!(
                reachable.contains(&(x, y)),
                "energizer is unreachable: ({x},{y})"
            );
        }
    }

    #[test]
    fn house_interior_is_sealed_off_from_the_corridors() {
        let maze = Maze::new();
        let reachable = reachable_from_player_spawn(&maze);
        for personality in GhostPersonality::all() {
            let spawn = maze.ghost_spawn(personality);
            assert!(maze.in_house(spawn));
            assert!(maze.is_walkable(spawn));
            assert!(!reachable.contains(&(spawn.col, spawn.row)));
        }
        assert!(reachable.contains(&(maze.house_exit().col, maze.house_exit().row)));
    }

    #[test]
    fn tunnel_cells_hug_the_horizontal_edges() {
        let maze = Maze::new();
        for (x, _) in maze
            .dot_cells()
            .iter()
            .filter(|(x, y)| *y == 14 && (*x < 6 || *x >= 22))
        {
            panic!("tunnel corridor should carry no dots, found one at col {x}");
        }
        assert!(maze.is_tunnel(CellIndex::new(5, 14)));
        assert!(maze.is_tunnel(CellIndex::new(22, 14)));
        assert!(!maze.is_tunnel(CellIndex::new(6, 14)));
        assert!(!maze.is_tunnel(CellIndex::new(21, 14)));
    }
}
