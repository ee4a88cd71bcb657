use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("board payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("board payload is not an array")]
    NotArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub const ALL: [PieceKind; 6] = [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceColor {
    White,
    Black,
}

impl PieceColor {
    pub fn opposite(self) -> Self {
        match self {
            PieceColor::White => PieceColor::Black,
            PieceColor::Black => PieceColor::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: PieceColor,
}

impl Piece {
    pub fn new(kind: PieceKind, color: PieceColor) -> Self {
        Self { kind, color }
    }

    /// Inverse of [`PieceCode::piece`].
    pub fn code(self) -> PieceCode {
        let offset = match self.color {
            PieceColor::White => 1,
            PieceColor::Black => 7,
        };
        PieceCode(offset + self.kind.index() as i32)
    }
}

/// Integer cell value of channel 0. `0` is empty, `1..=6` are the white
/// pieces and `7..=12` the black ones, both in [`PieceKind::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PieceCode(pub i32);

impl PieceCode {
    pub const EMPTY: PieceCode = PieceCode(0);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `None` for empty cells and for anything outside `0..=12`.
    pub fn piece(self) -> Option<Piece> {
        let (color, base) = match self.0 {
            1..=6 => (PieceColor::White, 1),
            7..=12 => (PieceColor::Black, 7),
            _ => return None,
        };
        let kind = PieceKind::ALL[(self.0 - base) as usize];
        Some(Piece { kind, color })
    }
}

/// Decoded `[channel][row][col]` board array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    channels: Vec<Vec<Vec<i32>>>,
}

impl BoardSnapshot {
    pub const PIECE_CHANNEL: usize = 0;

    pub fn new(channels: Vec<Vec<Vec<i32>>>) -> Self {
        Self { channels }
    }

    /// Decodes a `/move` response body.
    ///
    /// Only the outer value has to be an array. Channels or rows that are not
    /// arrays are skipped and rows may have different lengths. Numeric
    /// strings and booleans count as numbers, other cells decode as empty.
    /// Numbers are truncated toward zero.
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Array(outer) = value else {
            return Err(DecodeError::NotArray);
        };

        let channels = outer
            .iter()
            .filter_map(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_array)
                    .map(|cols| cols.iter().map(cell_value).collect())
                    .collect()
            })
            .collect();

        Ok(Self { channels })
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[Vec<i32>]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn code(&self, row: usize, col: usize) -> PieceCode {
        self.channel(Self::PIECE_CHANNEL)
            .and_then(|layer| layer.get(row))
            .and_then(|cells| cells.get(col))
            .map_or(PieceCode::EMPTY, |&code| PieceCode(code))
    }

    /// Every placeable piece of channel 0 as `(row, col, piece)`.
    pub fn pieces(&self) -> impl Iterator<Item = (usize, usize, Piece)> + '_ {
        self.channel(Self::PIECE_CHANNEL)
            .unwrap_or_default()
            .iter()
            .enumerate()
            .flat_map(|(row, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .filter_map(move |(col, &code)| Some((row, col, PieceCode(code).piece()?)))
            })
    }
}

/// Numbers, numeric strings and booleans count; anything else is empty.
fn cell_value(value: &Value) -> i32 {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };
    // `as` saturates and truncates toward zero, NaN becomes 0
    number.map_or(0, |number| number as i32)
}

impl fmt::Display for BoardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(layer) = self.channel(Self::PIECE_CHANNEL) else {
            return writeln!(f, "(no board)");
        };

        for cells in layer.iter() {
            for &code in cells.iter() {
                let glyph = match PieceCode(code).piece() {
                    Some(Piece {
                        kind,
                        color: PieceColor::White,
                    }) => kind.letter().to_ascii_uppercase().to_string().bright_white().bold(),
                    Some(Piece {
                        kind,
                        color: PieceColor::Black,
                    }) => kind.letter().to_string().red().bold(),
                    None if code == 0 => ".".dimmed(),
                    None => "?".yellow(),
                };
                write!(f, "{} ", glyph)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
