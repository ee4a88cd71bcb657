use crate::board::{BoardSnapshot, Piece};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Distance between neighbouring cells in board space.
pub const CELL_SPACING: f32 = 100.0;

/// Where cell `(0, 0)` sits in board space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Reflect, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardLayout {
    pub x: f32,
    pub y: f32,
}

impl BoardLayout {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Board-space position of a cell: columns run along x, rows along y,
    /// and z is always zero.
    pub fn cell_position(&self, row: usize, col: usize) -> Vec3 {
        Vec3::new(
            col as f32 * CELL_SPACING + self.x,
            row as f32 * CELL_SPACING + self.y,
            0.0,
        )
    }
}

/// Whatever can put a piece into the scene and take it out again.
pub trait PlacementService {
    type Handle;

    fn place(&mut self, piece: Piece, position: Vec3) -> Self::Handle;
    fn remove(&mut self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
pub enum PlacementMode {
    /// Place every piece of every snapshot and never remove anything. Clearing
    /// the board is left to whoever calls [`BoardPlacer::clear`].
    #[default]
    Accumulate,
    /// Only place and remove the pieces that changed since the last snapshot.
    Diff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlacementReport {
    pub placed: usize,
    pub removed: usize,
    pub kept: usize,
}

#[derive(Debug)]
pub struct PlacedPiece<H> {
    pub row: usize,
    pub col: usize,
    pub piece: Piece,
    pub handle: H,
}

/// Keeps track of what has been placed so far and turns snapshots into
/// [`PlacementService`] calls.
#[derive(Debug)]
pub struct BoardPlacer<H> {
    mode: PlacementMode,
    cells: HashMap<(usize, usize), PlacedPiece<H>>,
    stacked: Vec<PlacedPiece<H>>,
}

impl<H> Default for BoardPlacer<H> {
    fn default() -> Self {
        Self::new(PlacementMode::default())
    }
}

impl<H> BoardPlacer<H> {
    pub fn new(mode: PlacementMode) -> Self {
        Self {
            mode,
            cells: HashMap::new(),
            stacked: Vec::new(),
        }
    }

    pub fn mode(&self) -> PlacementMode {
        self.mode
    }

    /// Switching modes keeps everything that is already placed; the next
    /// [`BoardPlacer::clear`] removes it.
    pub fn set_mode(&mut self, mode: PlacementMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        match mode {
            PlacementMode::Accumulate => {
                self.stacked.extend(self.cells.drain().map(|(_, placed)| placed));
            }
            PlacementMode::Diff => {
                for placed in std::mem::take(&mut self.stacked) {
                    if let Some(old) = self.cells.insert((placed.row, placed.col), placed) {
                        // an older piece on the same cell stays tracked for clear()
                        self.stacked.push(old);
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len() + self.stacked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&PlacedPiece<H>> {
        self.cells.get(&(row, col))
    }

    pub fn apply<S>(
        &mut self,
        snapshot: &BoardSnapshot,
        layout: &BoardLayout,
        service: &mut S,
    ) -> PlacementReport
    where
        S: PlacementService<Handle = H>,
    {
        let mut report = PlacementReport::default();
        if snapshot.channels() == 0 {
            return report;
        }

        match self.mode {
            PlacementMode::Accumulate => {
                for (row, col, piece) in snapshot.pieces() {
                    let handle = service.place(piece, layout.cell_position(row, col));
                    self.stacked.push(PlacedPiece {
                        row,
                        col,
                        piece,
                        handle,
                    });
                    report.placed += 1;
                }
            }
            PlacementMode::Diff => {
                let wanted: HashMap<(usize, usize), Piece> = snapshot
                    .pieces()
                    .map(|(row, col, piece)| ((row, col), piece))
                    .collect();

                let stale: Vec<(usize, usize)> = self
                    .cells
                    .iter()
                    .filter(|(cell, placed)| wanted.get(cell) != Some(&placed.piece))
                    .map(|(&cell, _)| cell)
                    .collect();
                for cell in stale {
                    if let Some(placed) = self.cells.remove(&cell) {
                        service.remove(placed.handle);
                        report.removed += 1;
                    }
                }

                for ((row, col), piece) in wanted {
                    if self.cells.contains_key(&(row, col)) {
                        report.kept += 1;
                        continue;
                    }
                    let handle = service.place(piece, layout.cell_position(row, col));
                    self.cells.insert(
                        (row, col),
                        PlacedPiece {
                            row,
                            col,
                            piece,
                            handle,
                        },
                    );
                    report.placed += 1;
                }
            }
        }

        report
    }

    /// Removes every piece this placer has placed.
    pub fn clear<S>(&mut self, service: &mut S) -> usize
    where
        S: PlacementService<Handle = H>,
    {
        let removed = self.len();
        for (_, placed) in self.cells.drain() {
            service.remove(placed.handle);
        }
        for placed in self.stacked.drain(..) {
            service.remove(placed.handle);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{PieceCode, PieceColor, PieceKind};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Scene {
        next: u32,
        live: HashMap<u32, (Piece, Vec3)>,
        placed: Vec<(Piece, Vec3)>,
        removed: Vec<u32>,
    }

    impl PlacementService for Scene {
        type Handle = u32;

        fn place(&mut self, piece: Piece, position: Vec3) -> u32 {
            self.next += 1;
            self.live.insert(self.next, (piece, position));
            self.placed.push((piece, position));
            self.next
        }

        fn remove(&mut self, handle: u32) {
            assert!(self.live.remove(&handle).is_some(), "double remove");
            self.removed.push(handle);
        }
    }

    fn board(rows: &[&[i32]]) -> BoardSnapshot {
        BoardSnapshot::new(vec![rows.iter().map(|row| row.to_vec()).collect()])
    }

    #[test]
    fn cell_position() {
        let layout = BoardLayout::default();
        assert_eq!(layout.cell_position(2, 3), Vec3::new(300.0, 200.0, 0.0));

        let layout = BoardLayout::new(-350.0, 25.0);
        assert_eq!(layout.cell_position(0, 0), Vec3::new(-350.0, 25.0, 0.0));
        assert_eq!(layout.cell_position(7, 1), Vec3::new(-250.0, 725.0, 0.0));
    }

    #[test]
    fn places_each_piece_once() {
        let mut scene = Scene::default();
        let mut placer = BoardPlacer::new(PlacementMode::Diff);
        let snapshot = board(&[&[0, 0, 0], &[0, 0, 0], &[0, 0, 0, 11]]);

        let report = placer.apply(&snapshot, &BoardLayout::default(), &mut scene);

        assert_eq!(
            report,
            PlacementReport {
                placed: 1,
                removed: 0,
                kept: 0
            }
        );
        assert_eq!(
            scene.placed,
            vec![(
                Piece::new(PieceKind::Queen, PieceColor::Black),
                Vec3::new(300.0, 200.0, 0.0)
            )]
        );
        assert_eq!(placer.get(2, 3).map(|p| p.piece.code()), Some(PieceCode(11)));
    }

    #[test]
    fn diff_only_touches_changes() {
        let mut scene = Scene::default();
        let mut placer = BoardPlacer::new(PlacementMode::Diff);
        let layout = BoardLayout::default();

        placer.apply(&board(&[&[4, 0, 6], &[1, 1, 0]]), &layout, &mut scene);
        assert_eq!(scene.live.len(), 4);

        // pawn (1, 1) moves to (0, 1), king is captured by a black queen
        let report = placer.apply(&board(&[&[4, 1, 11], &[1, 0, 0]]), &layout, &mut scene);

        assert_eq!(
            report,
            PlacementReport {
                placed: 2,
                removed: 2,
                kept: 2
            }
        );
        assert_eq!(scene.live.len(), 4);
        let live: HashSet<_> = scene
            .live
            .values()
            .map(|(piece, position)| (piece.code().0, position.x as i32, position.y as i32))
            .collect();
        assert_eq!(
            live,
            HashSet::from([(4, 0, 0), (1, 100, 0), (11, 200, 0), (1, 0, 100)])
        );
    }

    #[test]
    fn same_snapshot_twice_is_a_no_op() {
        let mut scene = Scene::default();
        let mut placer = BoardPlacer::new(PlacementMode::Diff);
        let layout = BoardLayout::default();
        let snapshot = board(&[&[10, 8, 9], &[7, 7, 7]]);

        placer.apply(&snapshot, &layout, &mut scene);
        let report = placer.apply(&snapshot, &layout, &mut scene);

        assert_eq!(report.placed, 0);
        assert_eq!(report.removed, 0);
        assert_eq!(report.kept, 6);
        assert_eq!(scene.placed.len(), 6);
    }

    #[test]
    fn accumulates_unless_asked_to_diff() {
        assert_eq!(PlacementMode::default(), PlacementMode::Accumulate);
        assert_eq!(BoardPlacer::<u32>::default().mode(), PlacementMode::Accumulate);
    }

    #[test]
    fn accumulate_never_removes() {
        let mut scene = Scene::default();
        let mut placer = BoardPlacer::new(PlacementMode::Accumulate);
        let layout = BoardLayout::default();
        let snapshot = board(&[&[1, 0], &[0, 7]]);

        placer.apply(&snapshot, &layout, &mut scene);
        let report = placer.apply(&snapshot, &layout, &mut scene);

        assert_eq!(report.placed, 2);
        assert_eq!(scene.live.len(), 4);
        assert!(scene.removed.is_empty());
        assert_eq!(placer.len(), 4);
    }

    #[test]
    fn clear_removes_everything() {
        let mut scene = Scene::default();
        let mut placer = BoardPlacer::new(PlacementMode::Accumulate);
        let layout = BoardLayout::default();

        placer.apply(&board(&[&[1, 2, 3]]), &layout, &mut scene);
        placer.apply(&board(&[&[1, 2, 3]]), &layout, &mut scene);
        assert_eq!(scene.live.len(), 6);

        assert_eq!(placer.clear(&mut scene), 6);
        assert!(scene.live.is_empty());
        assert!(placer.is_empty());
    }

    #[test]
    fn switching_to_diff_adopts_stacked_pieces() {
        let mut scene = Scene::default();
        let mut placer = BoardPlacer::new(PlacementMode::Accumulate);
        let layout = BoardLayout::default();

        placer.apply(&board(&[&[1, 2]]), &layout, &mut scene);
        placer.apply(&board(&[&[1, 0]]), &layout, &mut scene);
        placer.set_mode(PlacementMode::Diff);

        // one of the two pawns on (0, 0) is adopted, the knight gets removed
        let report = placer.apply(&board(&[&[1, 0]]), &layout, &mut scene);
        assert_eq!(report.kept, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.placed, 0);
        assert_eq!(scene.live.len(), 2);

        assert_eq!(placer.clear(&mut scene), 2);
        assert!(scene.live.is_empty());
    }

    #[test]
    fn snapshot_without_channels_changes_nothing() {
        let mut scene = Scene::default();
        let mut placer = BoardPlacer::new(PlacementMode::Diff);
        let layout = BoardLayout::default();

        placer.apply(&board(&[&[5]]), &layout, &mut scene);
        let report = placer.apply(&BoardSnapshot::default(), &layout, &mut scene);

        assert_eq!(report, PlacementReport::default());
        assert_eq!(scene.live.len(), 1);
    }

    #[test]
    fn malformed_payload_places_nothing() {
        let mut scene = Scene::default();
        let mut placer = BoardPlacer::default();

        for body in ["", "not json", "{}", "[[[1, 2]", "null"] {
            if let Ok(snapshot) = BoardSnapshot::from_json(body) {
                placer.apply(&snapshot, &BoardLayout::default(), &mut scene);
            }
        }

        assert!(scene.placed.is_empty());
    }

    proptest! {
        #[test]
        fn placement_follows_code_table(
            cells in proptest::collection::vec(proptest::collection::vec(-3..16i32, 0..8), 0..8)
        ) {
            let mut scene = Scene::default();
            let mut placer = BoardPlacer::new(PlacementMode::Accumulate);
            let layout = BoardLayout::new(10.0, -20.0);
            let snapshot = BoardSnapshot::new(vec![cells.clone()]);

            placer.apply(&snapshot, &layout, &mut scene);

            let mut expected = Vec::new();
            for (row, codes) in cells.iter().enumerate() {
                for (col, &code) in codes.iter().enumerate() {
                    if (1..=12).contains(&code) {
                        let kind = PieceKind::ALL[((code - 1) % 6) as usize];
                        let color = if code <= 6 { PieceColor::White } else { PieceColor::Black };
                        expected.push((Piece::new(kind, color), layout.cell_position(row, col)));
                    }
                }
            }
            prop_assert_eq!(scene.placed, expected);
        }
    }
}
