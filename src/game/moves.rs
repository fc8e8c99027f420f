//! Coordinate move notation and the ordered move history of a game.

use std::fmt::{Display, Formatter};
use std::ops::Index;
use std::str::FromStr;

use serde::Serialize;

use crate::HarnessError;

/// A move in coordinate notation: `e2e4`, or `e7e8q` with a promotion piece.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CoordinateMove(String);

impl CoordinateMove {
    /// The move text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Origin square, e.g. `e2`.
    #[must_use]
    pub fn from_square(&self) -> &str {
        &self.0[..2]
    }

    /// Destination square, e.g. `e4`.
    #[must_use]
    pub fn to_square(&self) -> &str {
        &self.0[2..4]
    }

    /// Promotion piece letter, if any.
    #[must_use]
    pub fn promotion(&self) -> Option<char> {
        self.0.chars().nth(4)
    }
}

impl FromStr for CoordinateMove {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let square_ok = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);

        let well_formed = matches!(bytes.len(), 4 | 5)
            && square_ok(bytes[0], bytes[1])
            && square_ok(bytes[2], bytes[3])
            && bytes[..2] != bytes[2..4]
            && bytes.get(4).map_or(true, |p| matches!(p, b'q' | b'r' | b'b' | b'n'));

        if well_formed {
            Ok(Self(s.to_owned()))
        } else {
            Err(HarnessError::IllegalMove(format!(
                "'{s}' is not coordinate notation"
            )))
        }
    }
}

impl Display for CoordinateMove {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only, ordered sequence of the moves played in one game.
///
/// Index `i` was produced by seat A when `i` is even and seat B when odd.
/// Displays as the space-separated list used by `position startpos moves`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MoveHistory(Vec<CoordinateMove>);

impl MoveHistory {
    /// An empty history (the start position).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next move.
    pub fn push(&mut self, mv: CoordinateMove) {
        self.0.push(mv);
    }

    /// Number of half-moves played.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no move has been played.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Move at `index`, if played.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CoordinateMove> {
        self.0.get(index)
    }

    /// Most recent move.
    #[must_use]
    pub fn last(&self) -> Option<&CoordinateMove> {
        self.0.last()
    }

    /// Iterate the moves in play order.
    pub fn iter(&self) -> std::slice::Iter<'_, CoordinateMove> {
        self.0.iter()
    }
}

impl Index<usize> for MoveHistory {
    type Output = CoordinateMove;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a MoveHistory {
    type Item = &'a CoordinateMove;
    type IntoIter = std::slice::Iter<'a, CoordinateMove>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for MoveHistory {
    type Item = CoordinateMove;
    type IntoIter = std::vec::IntoIter<CoordinateMove>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<CoordinateMove> for MoveHistory {
    fn from_iter<I: IntoIterator<Item = CoordinateMove>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for MoveHistory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, mv) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(mv.as_str())?;
        }
        Ok(())
    }
}
