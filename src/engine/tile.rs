use crate::constants::{CELL_PX, CENTER_TOLERANCE_PX};
use crate::types::{CellIndex, Direction};

#[derive(Clone, Debug)]
pub struct Tile {
    x: f32,
    y: f32,
    cell: CellIndex,
    width_cells: i32,
    adjacent: [Option<Box<Tile>>; 5],
}

fn slot_index(dir: Direction) -> usize {
    match dir {
        Direction::Up => 0,
        Direction::Down => 1,
        Direction::Left => 2,
        Direction::Right => 3,
        Direction::None => 4,
    }
}

impl Tile {
    pub fn new(width_cells: i32) -> Self {
        let mut tile = Self {
            x: 0.0,
            y: 0.0,
            cell: CellIndex::new(0, 0),
            width_cells,
            adjacent: [None, None, None, None, None],
        };
        tile.set_position(0.0, 0.0);
        tile
    }

    pub fn at_cell_center(cell: CellIndex, width_cells: i32) -> Self {
        let mut tile = Self::new(width_cells);
        let (x, y) = cell.center_px();
        tile.set_position(x, y);
        tile
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.cell = CellIndex::from_px(x, y);
        let width_px = (self.width_cells * CELL_PX) as f32;
        while self.cell.col < 0 {
            self.x += width_px;
            self.cell = CellIndex::from_px(self.x, self.y);
        }
        while self.cell.col >= self.width_cells {
            self.x -= width_px;
            self.cell = CellIndex::from_px(self.x, self.y);
        }
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn cell(&self) -> CellIndex {
        self.cell
    }

    pub fn top_left_px(&self) -> (f32, f32) {
        self.cell.top_left_px()
    }

    pub fn center_px(&self) -> (f32, f32) {
        self.cell.center_px()
    }

    pub fn is_centered(&self) -> bool {
        let (cx, cy) = self.center_px();
        (self.x - cx).abs() <= CENTER_TOLERANCE_PX && (self.y - cy).abs() <= CENTER_TOLERANCE_PX
    }

    pub fn adjacent(&mut self, dir: Direction) -> &Tile {
        let (cx, cy) = self.cell.center_px();
        let (dx, dy) = dir.delta();
        let target_x = cx + (dx * CELL_PX) as f32;
        let target_y = cy + (dy * CELL_PX) as f32;
        let width_cells = self.width_cells;
        let slot = self.adjacent[slot_index(dir)]
            .get_or_insert_with(|| Box::new(Tile::new(width_cells)));
        slot.set_position(target_x, target_y);
        slot
    }

    pub fn adjacent_cell(&mut self, dir: Direction) -> CellIndex {
        self.adjacent(dir).cell()
    }
}
