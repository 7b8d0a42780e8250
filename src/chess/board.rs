//! Authoritative board state and move legality.
//!
//! The board keeps a square-centric piece array together with an occupancy
//! bitboard and a `moved` bitboard (castling rights are derived from the
//! latter, never stored). Movement patterns are validated against a small
//! lookup table keyed by piece kind and 0x88 square difference which yields
//! the set of squares that must be empty for the move to be possible; a move
//! is legal when it matches a pattern and does not leave the mover's own king
//! in check.

use once_cell::sync::Lazy;

use super::types::{Color, Piece, PieceKind, Square};

/// Errors returned by [`Board::move_san`].
#[derive(Debug, thiserror::Error)]
pub enum SanError {
    /// The text does not parse as a SAN half-move.
    #[error("invalid move text {0:?}, expected SAN")]
    Invalid(String),

    /// More than one piece of the named kind can reach the destination.
    #[error("the move {0:?} is ambiguous")]
    Ambiguous(String),

    /// No piece can legally perform the move.
    #[error("the move {0:?} is not legal")]
    Illegal(String),

    /// Castling is not possible in the current position.
    #[error("castling is not possible")]
    CannotCastle,

    /// A capture was written against a square holding nothing to capture.
    #[error("nothing to capture on {0}")]
    NothingToCapture(Square),
}

/// A full chess position: piece placement, side to move, derived castling
/// rights, a possible en passant target and the SAN history of applied
/// half-moves.
///
/// The board is only ever mutated by successful moves; rejected moves leave
/// it untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Square-centric placement; `None` is an empty square.
    squares: [Option<Piece>; 64],
    /// Bit i set iff `squares[i]` holds a piece.
    occupied: u64,
    /// Squares a piece has ever moved away from. Only the king and rook home
    /// squares matter; they decide castling rights.
    moved: u64,
    /// Side to move.
    side: Color,
    /// Capture square for an en passant reply, open for one half-move after a
    /// double pawn push.
    ep_target: Option<Square>,
    /// Is the side to move in check?
    check: bool,
    /// Does the side to move have no legal move? Checkmate when combined
    /// with `check`.
    stalemate: bool,
    /// SAN notations of the applied half-moves, in order.
    history: Vec<String>,
}

impl Board {
    /// A new board with all pieces on their initial squares, White to move.
    #[must_use]
    pub fn new() -> Self {
        use PieceKind::{Bishop, King, Knight, Pawn, Queen, Rook};
        const BACK_RANK: [PieceKind; 8] =
            [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];

        let mut squares = [None; 64];
        for (file, &kind) in BACK_RANK.iter().enumerate() {
            squares[file] = Some(Piece::new(kind, Color::White));
            squares[8 + file] = Some(Piece::new(Pawn, Color::White));
            squares[48 + file] = Some(Piece::new(Pawn, Color::Black));
            squares[56 + file] = Some(Piece::new(kind, Color::Black));
        }
        Self {
            squares,
            occupied: 0xffff_0000_0000_ffff,
            moved: 0,
            side: Color::White,
            ep_target: None,
            check: false,
            stalemate: false,
            history: Vec::new(),
        }
    }

    /// The color of the side to move.
    #[must_use]
    pub const fn side_to_move(&self) -> Color {
        self.side
    }

    /// Is the side to move in check? Also true when checkmated.
    #[must_use]
    pub const fn is_check(&self) -> bool {
        self.check
    }

    /// Is the side to move checkmated?
    #[must_use]
    pub const fn is_checkmate(&self) -> bool {
        self.check && self.stalemate
    }

    /// Is the game drawn because the side to move has no legal move while
    /// not in check?
    #[must_use]
    pub const fn is_stalemate(&self) -> bool {
        !self.check && self.stalemate
    }

    /// The 1-based half-move number to be played next.
    #[must_use]
    pub fn turn(&self) -> u32 {
        self.history.len() as u32 + 1
    }

    /// The SAN notation of the most recent half-move, empty before the first.
    #[must_use]
    pub fn last_move(&self) -> &str {
        self.history.last().map_or("", String::as_str)
    }

    /// All applied half-moves in SAN, in order.
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// The piece on a square, if any.
    #[must_use]
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares[square.index()]
    }

    /// Attempt the half-move `src` to `dst` for the side to move and report
    /// whether it was applied. A king stepping two squares from its home
    /// square is castling. On success the move is applied atomically: capture
    /// (including en passant), promotion to queen, castling rook relocation,
    /// side-to-move toggle, en passant window, check/stalemate flags and the
    /// SAN history entry. On failure the board is unchanged.
    pub fn make_move(&mut self, src: Square, dst: Square) -> bool {
        let Some(piece) = self.squares[src.index()] else {
            return false;
        };
        if piece.color != self.side {
            return false;
        }

        if piece.kind == PieceKind::King {
            match (src, dst) {
                (Square::E1, Square::G1) => return self.do_castle(Square::E1, Square::H1),
                (Square::E1, Square::C1) => return self.do_castle(Square::E1, Square::A1),
                (Square::E8, Square::G8) => return self.do_castle(Square::E8, Square::H8),
                (Square::E8, Square::C8) => return self.do_castle(Square::E8, Square::A8),
                _ => {}
            }
        }

        if !self.can_move(src, dst) {
            return false;
        }

        // SAN must be rendered before the move is applied: captures and
        // disambiguation depend on the pre-move position.
        let san = self.format_move(src, dst);

        self.squares[dst.index()] = Some(piece);
        self.squares[src.index()] = None;
        self.occupied &= !src.bit();
        self.occupied |= dst.bit();

        // en passant removes the pawn behind the destination square
        if piece.kind == PieceKind::Pawn && self.ep_target == Some(dst) {
            let behind = if piece.color.is_white() {
                dst.offset(-8)
            } else {
                dst.offset(8)
            };
            if let Some(victim) = behind {
                self.squares[victim.index()] = None;
                self.occupied &= !victim.bit();
            }
        }

        // a double pawn push opens the en passant window for one half-move
        self.ep_target = None;
        if piece.kind == PieceKind::Pawn {
            if piece.color.is_white() && dst.index() == src.index() + 16 {
                self.ep_target = src.offset(8);
            } else if !piece.color.is_white() && src.index() == dst.index() + 16 {
                self.ep_target = src.offset(-8);
            }
        }

        // promotion is always to a queen
        if piece.kind == PieceKind::Pawn && (dst.rank() == 0 || dst.rank() == 7) {
            self.squares[dst.index()] = Some(Piece::new(PieceKind::Queen, piece.color));
        }

        self.moved |= src.bit();
        self.side = self.side.opposite();
        self.check = self.in_check(self.side);
        self.stalemate = self.has_no_moves();
        self.history.push(format!("{san}{}", self.status_suffix()));
        true
    }

    /// Apply a half-move given in SAN, e.g. `Nf3`, `exd5`, `O-O` or `Qh5#`.
    /// Trailing `+`, `#`, `!` and `?` decorations are ignored; `0-0` is
    /// accepted for `O-O`. Disambiguating file and/or rank characters narrow
    /// the source square; if the move stays ambiguous it is rejected.
    pub fn move_san(&mut self, text: &str) -> Result<(), SanError> {
        let san = text.trim_end_matches(['?', '!', '+', '#']);

        let castle = san.replace('O', "0");
        if castle == "0-0" || castle == "0-0-0" {
            let (king, rook) = match (castle == "0-0", self.side) {
                (true, Color::White) => (Square::E1, Square::H1),
                (true, Color::Black) => (Square::E8, Square::H8),
                (false, Color::White) => (Square::E1, Square::A1),
                (false, Color::Black) => (Square::E8, Square::A8),
            };
            if self.do_castle(king, rook) {
                return Ok(());
            }
            return Err(SanError::CannotCastle);
        }

        let bytes = san.as_bytes();
        if bytes.len() < 2 {
            return Err(SanError::Invalid(text.to_string()));
        }
        let (mut body, coords) = bytes.split_at(bytes.len() - 2);
        let dst = match coords {
            [file @ b'a'..=b'h', rank @ b'1'..=b'8'] => Square::new(file - b'a', rank - b'1'),
            _ => None,
        };
        let Some(dst) = dst else {
            return Err(SanError::Invalid(text.to_string()));
        };

        let mut capture = false;
        if let Some((&sep, rest)) = body.split_last() {
            if sep == b'x' {
                capture = true;
                body = rest;
            } else if sep == b'-' {
                body = rest;
            }
        }

        let mut kind = PieceKind::Pawn;
        if let Some((&letter, rest)) = body.split_first() {
            if letter.is_ascii_uppercase() {
                kind = match letter {
                    b'P' => PieceKind::Pawn,
                    b'N' => PieceKind::Knight,
                    b'B' => PieceKind::Bishop,
                    b'R' => PieceKind::Rook,
                    b'Q' => PieceKind::Queen,
                    b'K' => PieceKind::King,
                    _ => return Err(SanError::Invalid(text.to_string())),
                };
                body = rest;
            }
        }

        let mut src_file = None;
        let mut src_rank = None;
        for &ch in body {
            match ch {
                b'a'..=b'h' if src_file.is_none() && src_rank.is_none() => {
                    src_file = Some(ch - b'a');
                }
                b'1'..=b'8' if src_rank.is_none() => src_rank = Some(ch - b'1'),
                _ => return Err(SanError::Invalid(text.to_string())),
            }
        }

        if capture {
            let enemy_on_dst = self.squares[dst.index()]
                .is_some_and(|victim| victim.color != self.side);
            let en_passant = kind == PieceKind::Pawn && self.ep_target == Some(dst);
            if !enemy_on_dst && !en_passant {
                return Err(SanError::NothingToCapture(dst));
            }
        }

        let wanted = Piece::new(kind, self.side);
        let src = if let (Some(file), Some(rank)) = (src_file, src_rank) {
            Square::new(file, rank)
        } else {
            let mut found = None;
            for sq in Square::all() {
                if self.squares[sq.index()] == Some(wanted)
                    && src_file.is_none_or(|file| file == sq.file())
                    && src_rank.is_none_or(|rank| rank == sq.rank())
                    && self.may_move(sq, dst)
                {
                    if found.is_some() {
                        return Err(SanError::Ambiguous(text.to_string()));
                    }
                    found = Some(sq);
                }
            }
            found
        };
        let Some(src) = src else {
            return Err(SanError::Illegal(text.to_string()));
        };
        if !self.make_move(src, dst) {
            return Err(SanError::Illegal(text.to_string()));
        }
        Ok(())
    }

    /// All legal destinations for the piece on `src`, castling included.
    /// Empty when the square does not hold a piece of the side to move.
    #[must_use]
    pub fn candidate_moves(&self, src: Square) -> Vec<Square> {
        let Some(piece) = self.squares[src.index()] else {
            return Vec::new();
        };
        if piece.color != self.side {
            return Vec::new();
        }

        let mut scratch = self.scratch();
        let mut moves: Vec<Square> = Square::all()
            .filter(|&dst| scratch.can_move(src, dst))
            .collect();

        if piece.kind == PieceKind::King {
            let home = match piece.color {
                Color::White => Square::E1,
                Color::Black => Square::E8,
            };
            if src == home {
                let (kingside, queenside) = match piece.color {
                    Color::White => ((Square::H1, Square::G1), (Square::A1, Square::C1)),
                    Color::Black => ((Square::H8, Square::G8), (Square::A8, Square::C8)),
                };
                if scratch.can_castle(home, kingside.0) {
                    moves.push(kingside.1);
                }
                if scratch.can_castle(home, queenside.0) {
                    moves.push(queenside.1);
                }
            }
        }
        moves
    }

    /// A FEN-like snapshot: placement, side to move, castling rights, en
    /// passant target, applied half-moves and the half-move number to play.
    #[must_use]
    pub fn to_fen(&self) -> String {
        use std::fmt::Write as _;

        let mut fen = String::new();
        for rank in (0u8..8).rev() {
            let mut empty = 0u8;
            for file in 0u8..8 {
                match self.squares[(rank * 8 + file) as usize] {
                    Some(piece) => {
                        if empty > 0 {
                            fen.push((b'0' + empty) as char);
                            empty = 0;
                        }
                        fen.push(piece.fen_letter());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push((b'0' + empty) as char);
            }
            if rank != 0 {
                fen.push('/');
            }
        }

        fen.push_str(if self.side.is_white() { " w " } else { " b " });

        let mut rights = String::new();
        if self.moved & (Square::E1.bit() | Square::H1.bit()) == 0 {
            rights.push('K');
        }
        if self.moved & (Square::E1.bit() | Square::A1.bit()) == 0 {
            rights.push('Q');
        }
        if self.moved & (Square::E8.bit() | Square::H8.bit()) == 0 {
            rights.push('k');
        }
        if self.moved & (Square::E8.bit() | Square::A8.bit()) == 0 {
            rights.push('q');
        }
        if rights.is_empty() {
            rights.push('-');
        }
        fen.push_str(&rights);

        match self.ep_target {
            Some(sq) => {
                let _ = write!(fen, " {sq}");
            }
            None => fen.push_str(" -"),
        }
        let _ = write!(fen, " {} {}", self.history.len(), self.turn());
        fen
    }

    // --- legality internals ---

    /// Pseudo-legal pattern test: the piece on `src` could reach `dst` going
    /// by its movement pattern and the occupancy in between, ignoring king
    /// safety and castling.
    fn may_move(&self, src: Square, dst: Square) -> bool {
        let Some(piece) = self.squares[src.index()] else {
            return false;
        };
        if self.squares[dst.index()].is_some_and(|victim| victim.color == piece.color) {
            return false;
        }

        // Index the blocker table by the 0x88 difference; rotate the
        // occupancy so bit 0 is the source square. Unreachable differences
        // map to all-ones and always collide with the source bit.
        let diff = (dst.index() as isize - src.index() as isize)
            + ((dst.index() | 7) as isize - (src.index() | 7) as isize)
            + 120;
        let occupancy = self.occupied.rotate_right(src.index() as u32);
        if BLOCKERS[piece.kind.index()][diff as usize] & occupancy != 0 {
            return false;
        }

        if piece.kind == PieceKind::Pawn {
            let diagonal = src.file() != dst.file();
            if self.squares[dst.index()].is_none() && diagonal && self.ep_target != Some(dst) {
                return false;
            }
            match piece.color {
                Color::White if src > dst || (diff == 152 && src.rank() != 1) => return false,
                Color::Black if src < dst || (diff == 88 && src.rank() != 6) => return false,
                _ => {}
            }
        }
        true
    }

    /// Full legality test: pseudo-legal and the mover's king is not left in
    /// check. Probes by tentatively applying the move (including lifting an
    /// en passant victim) and restoring everything afterwards.
    fn can_move(&mut self, src: Square, dst: Square) -> bool {
        if !self.may_move(src, dst) {
            return false;
        }
        let Some(piece) = self.squares[src.index()] else {
            return false;
        };
        let victim = self.squares[dst.index()];

        let ep_victim = if piece.kind == PieceKind::Pawn
            && victim.is_none()
            && self.ep_target == Some(dst)
        {
            let behind = if piece.color.is_white() {
                dst.offset(-8)
            } else {
                dst.offset(8)
            };
            behind.and_then(|sq| self.squares[sq.index()].map(|pawn| (sq, pawn)))
        } else {
            None
        };

        if let Some((sq, _)) = ep_victim {
            self.squares[sq.index()] = None;
            self.occupied &= !sq.bit();
        }
        self.squares[dst.index()] = Some(piece);
        self.squares[src.index()] = None;
        self.occupied &= !src.bit();
        self.occupied |= dst.bit();

        let legal = !self.in_check(piece.color);

        self.squares[src.index()] = Some(piece);
        self.squares[dst.index()] = victim;
        self.occupied |= src.bit();
        if victim.is_none() {
            self.occupied &= !dst.bit();
        }
        if let Some((sq, pawn)) = ep_victim {
            self.squares[sq.index()] = Some(pawn);
            self.occupied |= sq.bit();
        }
        legal
    }

    /// Castling with the king and rook on the given home squares: permitted
    /// iff neither has ever moved, the squares between them are empty, the
    /// king is not in check and does not pass through or land on an attacked
    /// square.
    fn can_castle(&mut self, king: Square, rook: Square) -> bool {
        if self.moved & (king.bit() | rook.bit()) != 0 || self.check {
            return false;
        }
        let (Some(king_piece), Some(rook_piece)) =
            (self.squares[king.index()], self.squares[rook.index()])
        else {
            return false;
        };
        if king_piece.kind != PieceKind::King
            || rook_piece.kind != PieceKind::Rook
            || king_piece.color != rook_piece.color
        {
            return false;
        }

        let (low, high) = if king < rook { (king, rook) } else { (rook, king) };
        for index in low.index() + 1..high.index() {
            if self.occupied & (1u64 << index) != 0 {
                return false;
            }
        }

        let step: i8 = if rook > king { 1 } else { -1 };
        let (Some(mid), Some(target)) = (king.offset(step), king.offset(2 * step)) else {
            return false;
        };
        if !self.can_move(king, mid) {
            return false;
        }
        // advance the king one square to probe the second step, then restore
        self.squares[mid.index()] = Some(king_piece);
        self.squares[king.index()] = None;
        self.occupied &= !king.bit();
        self.occupied |= mid.bit();
        let legal = self.can_move(mid, target);
        self.squares[king.index()] = Some(king_piece);
        self.squares[mid.index()] = None;
        self.occupied |= king.bit();
        self.occupied &= !mid.bit();
        legal
    }

    /// Apply a castling move if possible.
    fn do_castle(&mut self, king: Square, rook: Square) -> bool {
        if !self.can_castle(king, rook) {
            return false;
        }
        let (new_king, new_rook, san) = if rook > king {
            (king.offset(2), rook.offset(-2), "O-O")
        } else {
            (king.offset(-2), rook.offset(3), "O-O-O")
        };
        let (Some(new_king), Some(new_rook)) = (new_king, new_rook) else {
            return false;
        };

        self.squares[new_king.index()] = self.squares[king.index()].take();
        self.squares[new_rook.index()] = self.squares[rook.index()].take();
        self.occupied &= !(king.bit() | rook.bit());
        self.occupied |= new_king.bit() | new_rook.bit();
        self.moved |= king.bit() | rook.bit();
        self.ep_target = None;
        self.side = self.side.opposite();
        self.check = self.in_check(self.side);
        self.stalemate = self.has_no_moves();
        self.history.push(format!("{san}{}", self.status_suffix()));
        true
    }

    /// Is `color`'s king attacked by any enemy piece?
    fn in_check(&self, color: Color) -> bool {
        let king = Piece::new(PieceKind::King, color);
        let Some(king_square) =
            Square::all().find(|&sq| self.squares[sq.index()] == Some(king))
        else {
            return false;
        };
        Square::all().any(|sq| {
            self.squares[sq.index()].is_some_and(|piece| piece.color != color)
                && self.may_move(sq, king_square)
        })
    }

    /// Does the side to move have no legal move at all? A king move always
    /// exists alongside a legal castling, so castling needs no extra scan.
    fn has_no_moves(&mut self) -> bool {
        for src in Square::all() {
            if !self.squares[src.index()].is_some_and(|piece| piece.color == self.side) {
                continue;
            }
            for dst in Square::all() {
                if self.can_move(src, dst) {
                    return false;
                }
            }
        }
        true
    }

    /// Format the half-move `src` to `dst` in SAN, without the check suffix.
    /// Must be called before the move is applied.
    fn format_move(&self, src: Square, dst: Square) -> String {
        let Some(piece) = self.squares[src.index()] else {
            return String::new();
        };
        let mut san = String::from(piece.kind.san_letter());

        // another same-kind piece that could reach dst makes the move
        // ambiguous; prefer the file letter, fall back to the rank digit
        let (mut by_file, mut by_rank) = (false, false);
        for sq in Square::all() {
            if sq != src && self.squares[sq.index()] == Some(piece) && self.may_move(sq, dst) {
                if sq.file() != src.file() {
                    by_file = true;
                } else {
                    by_rank = true;
                }
            }
        }

        let capture = self.squares[dst.index()].is_some()
            || (piece.kind == PieceKind::Pawn && self.ep_target == Some(dst));
        if by_file || (piece.kind == PieceKind::Pawn && capture) {
            san.push((b'a' + src.file()) as char);
        }
        if by_rank {
            san.push((b'1' + src.rank()) as char);
        }
        if capture {
            san.push('x');
        }
        san.push((b'a' + dst.file()) as char);
        san.push((b'1' + dst.rank()) as char);
        san
    }

    /// The SAN suffix for the position after a move: `#` for checkmate, `+`
    /// for check.
    const fn status_suffix(&self) -> &'static str {
        match (self.check, self.stalemate) {
            (true, true) => "#",
            (true, false) => "+",
            _ => "",
        }
    }

    /// A mutable probe copy sharing the position but not the history, for
    /// answering queries without touching `self`.
    fn scratch(&self) -> Self {
        Self {
            squares: self.squares,
            occupied: self.occupied,
            moved: self.moved,
            side: self.side,
            ep_target: self.ep_target,
            check: self.check,
            stalemate: self.stalemate,
            history: Vec::new(),
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_fen())
    }
}

/// Per-piece blocker sets, keyed by 0x88 square difference (plus 120). Each
/// entry is the set of squares, relative to the source and rotated so the
/// source is bit 0, that must be empty for the pattern to apply. Impossible
/// differences hold all-ones, which always intersects the occupancy because
/// the source square itself is occupied. The table is 13 KB and built once.
static BLOCKERS: Lazy<[[u64; 240]; 7]> = Lazy::new(build_blockers);

fn build_blockers() -> [[u64; 240]; 7] {
    let mut table = [[u64::MAX; 240]; 7];
    let pawn = PieceKind::Pawn.index();
    let knight = PieceKind::Knight.index();
    let bishop = PieceKind::Bishop.index();
    let rook = PieceKind::Rook.index();
    let queen = PieceKind::Queen.index();
    let king = PieceKind::King.index();

    // pawn pushes must find the crossed squares empty; captures have no
    // blockers of their own (the destination check handles them)
    table[pawn][136] = 1 << 8;
    table[pawn][152] = 1 << 8 | 1 << 16;
    table[pawn][135] = 0;
    table[pawn][137] = 0;
    table[pawn][104] = 1 << 56;
    table[pawn][88] = 1 << 56 | 1 << 48;
    table[pawn][103] = 0;
    table[pawn][105] = 0;

    // knights jump, kings step: nothing blocks
    for diff in [87, 89, 102, 106, 134, 138, 151, 153] {
        table[knight][diff] = 0;
    }
    for diff in [103, 104, 105, 119, 121, 135, 136, 137] {
        table[king][diff] = 0;
    }

    // single sliding steps seed the rays below
    for diff in [103, 105, 135, 137] {
        table[bishop][diff] = 0;
        table[queen][diff] = 0;
    }
    for diff in [104, 119, 121, 136] {
        table[rook][diff] = 0;
        table[queen][diff] = 0;
    }

    // extend each ray one square at a time, accumulating the crossed squares;
    // directions a piece cannot take stay all-ones under the or
    for kind in [bishop, rook, queen] {
        for i in 1..7usize {
            table[kind][120 + (i + 1)] = table[kind][120 + i] | 1u64 << i;
            table[kind][120 - (i + 1)] = table[kind][120 - i] | 1u64 << (64 - i);
            table[kind][120 + (i + 1) * 15] = table[kind][120 + i * 15] | 1u64 << (i * 7);
            table[kind][120 - (i + 1) * 15] = table[kind][120 - i * 15] | 1u64 << (64 - i * 7);
            table[kind][120 + (i + 1) * 16] = table[kind][120 + i * 16] | 1u64 << (i * 8);
            table[kind][120 - (i + 1) * 16] = table[kind][120 - i * 16] | 1u64 << (64 - i * 8);
            table[kind][120 + (i + 1) * 17] = table[kind][120 + i * 17] | 1u64 << (i * 9);
            table[kind][120 - (i + 1) * 17] = table[kind][120 - i * 17] | 1u64 << (64 - i * 9);
        }
    }
    table
}
