//! Core chess types: colors, pieces and squares.

use serde::{Deserialize, Serialize};

/// Chess piece color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// White pieces.
    White,
    /// Black pieces.
    Black,
}

impl Color {
    /// Get the opposite color.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Returns true if this is white.
    #[must_use]
    pub const fn is_white(self) -> bool {
        matches!(self, Self::White)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::White => write!(f, "White"),
            Self::Black => write!(f, "Black"),
        }
    }
}

/// Chess piece kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Index into the per-kind movement tables. Index 0 is reserved for the
    /// empty square, so kinds start at 1.
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Pawn => 1,
            Self::Knight => 2,
            Self::Bishop => 3,
            Self::Rook => 4,
            Self::Queen => 5,
            Self::King => 6,
        }
    }

    /// The English piece letter, empty for pawns (as used in SAN).
    #[must_use]
    pub(crate) const fn san_letter(self) -> &'static str {
        match self {
            Self::Pawn => "",
            Self::Knight => "N",
            Self::Bishop => "B",
            Self::Rook => "R",
            Self::Queen => "Q",
            Self::King => "K",
        }
    }
}

/// A chess piece with color and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    /// Piece kind.
    pub kind: PieceKind,
    /// Piece color.
    pub color: Color,
}

impl Piece {
    /// Create a new piece.
    #[must_use]
    pub const fn new(kind: PieceKind, color: Color) -> Self {
        Self { kind, color }
    }

    /// The FEN letter for this piece: uppercase for white, lowercase for
    /// black.
    #[must_use]
    pub(crate) fn fen_letter(self) -> char {
        let letter = match self.kind {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        if self.color.is_white() {
            letter.to_ascii_uppercase()
        } else {
            letter
        }
    }
}

/// A square on the chess board (a1-h8).
///
/// Squares are numbered 0..64 with a1 = 0, h1 = 7 and h8 = 63, so the file is
/// the low three bits and the rank the high three. Rank 0 is White's back
/// rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    pub(crate) const A1: Self = Self(0);
    pub(crate) const C1: Self = Self(2);
    pub(crate) const E1: Self = Self(4);
    pub(crate) const G1: Self = Self(6);
    pub(crate) const H1: Self = Self(7);
    pub(crate) const A8: Self = Self(56);
    pub(crate) const C8: Self = Self(58);
    pub(crate) const E8: Self = Self(60);
    pub(crate) const G8: Self = Self(62);
    pub(crate) const H8: Self = Self(63);

    /// Create a square from file (0-7) and rank (0-7).
    #[must_use]
    pub const fn new(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Self(rank * 8 + file))
        } else {
            None
        }
    }

    /// Create a square from its 0..64 index.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 64 {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Iterate over all 64 squares, a1 first.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..64).map(Self)
    }

    /// Get the file (0-7, a-h).
    #[must_use]
    pub const fn file(self) -> u8 {
        self.0 & 7
    }

    /// Get the rank (0-7, 1-8).
    #[must_use]
    pub const fn rank(self) -> u8 {
        self.0 >> 3
    }

    /// Get the 0..64 index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The single-square bit mask for occupancy bitboards.
    #[must_use]
    pub(crate) const fn bit(self) -> u64 {
        1u64 << self.0
    }

    /// The square `delta` steps away in index order, if still on the board.
    /// Note that index arithmetic wraps around files; callers stepping
    /// horizontally must check files themselves.
    #[must_use]
    pub(crate) fn offset(self, delta: i8) -> Option<Self> {
        let index = self.0 as i8 + delta;
        if (0..64).contains(&index) {
            Some(Self(index as u8))
        } else {
            None
        }
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let file = (b'a' + self.file()) as char;
        let rank = (b'1' + self.rank()) as char;
        write!(f, "{file}{rank}")
    }
}

impl std::str::FromStr for Square {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [file, rank] = s.as_bytes() else {
            return Err("square must be 2 characters");
        };
        if !(b'a'..=b'h').contains(file) {
            return Err("file must be a-h");
        }
        if !(b'1'..=b'8').contains(rank) {
            return Err("rank must be 1-8");
        }
        Self::new(file - b'a', rank - b'1').ok_or("invalid square")
    }
}
