//! Pairing Pattern Codec
//!
//! Converts between the 5-character name a sensor device advertises over the
//! wireless link and the 5x5 lit/unlit pattern shown on its display.
//!
//! # Pattern layout
//!
//! ```text
//!          col 0  col 1  col 2  col 3  col 4
//! row 0      t      a      t      a      t
//! row 1      p      e      p      e      p
//! row 2      g      i      g      i      g
//! row 3      v      o      v      o      v
//! row 4      z      u      z      u      z
//! ```
//!
//! Each column is drawn as a bar growing from the bottom row. The topmost lit
//! cell of a column picks that column's letter, so "tatat" lights the whole
//! grid and "zuzuz" lights only the bottom row.

/// Number of characters in a device name, and columns in the pattern
pub const NAME_LENGTH: usize = 5;

/// Number of rows in the pattern
pub const PATTERN_ROWS: usize = 5;

const PATTERN_CODEBOOK: [[char; NAME_LENGTH]; PATTERN_ROWS] = [
    ['t', 'a', 't', 'a', 't'],
    ['p', 'e', 'p', 'e', 'p'],
    ['g', 'i', 'g', 'i', 'g'],
    ['v', 'o', 'v', 'o', 'v'],
    ['z', 'u', 'z', 'u', 'z'],
];

/// Letters the device firmware uses when deriving its name from the serial
/// number. Row `i` is used for the `i`-th base-5 digit, written from the right.
const ID_CODEBOOK: [[char; 5]; NAME_LENGTH] = [
    ['z', 'v', 'g', 'p', 't'],
    ['u', 'o', 'i', 'e', 'a'],
    ['z', 'v', 'g', 'p', 't'],
    ['u', 'o', 'i', 'e', 'a'],
    ['z', 'v', 'g', 'p', 't'],
];

/// Number of distinct names (5^5)
pub const NAME_SPACE: u32 = 3125;

/// 5x5 grid of lit cells, stored row-major
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingPattern([bool; NAME_LENGTH * PATTERN_ROWS]);

impl PairingPattern {
    /// Pattern with no lit cells
    pub fn empty() -> Self {
        Self([false; NAME_LENGTH * PATTERN_ROWS])
    }

    pub fn cell(&self, row: usize, col: usize) -> bool {
        self.0[row * NAME_LENGTH + col]
    }

    /// Grid editor gesture: light `(row, col)` and everything below it in the
    /// column, clear everything above. Out of range coordinates are ignored.
    pub fn select_cell(&mut self, row: usize, col: usize) {
        if row >= PATTERN_ROWS || col >= NAME_LENGTH {
            return;
        }
        for r in 0..PATTERN_ROWS {
            self.0[r * NAME_LENGTH + col] = r >= row;
        }
    }

    /// Every column needs at least one lit cell, otherwise a letter is missing
    pub fn is_valid(&self) -> bool {
        (0..NAME_LENGTH).all(|col| (0..PATTERN_ROWS).any(|row| self.cell(row, col)))
    }
}

impl Default for PairingPattern {
    fn default() -> Self {
        Self::empty()
    }
}

/// Encode a device name as a pairing pattern.
///
/// Returns the empty pattern when `name` is not exactly five characters. A
/// character outside its column's alphabet leaves that column dark.
pub fn encode_pattern(name: &str) -> PairingPattern {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() != NAME_LENGTH {
        return PairingPattern::empty();
    }

    let mut cells = [true; NAME_LENGTH * PATTERN_ROWS];
    for (col, &ch) in chars.iter().enumerate() {
        for row in 0..PATTERN_ROWS {
            if PATTERN_CODEBOOK[row][col] == ch {
                break;
            }
            cells[row * NAME_LENGTH + col] = false;
        }
    }
    PairingPattern(cells)
}

/// Decode a pairing pattern into a device name.
///
/// A column with no lit cell decodes to a space; callers must treat such a
/// name as unusable.
pub fn decode_pattern(pattern: &PairingPattern) -> String {
    (0..NAME_LENGTH)
        .map(|col| {
            (0..PATTERN_ROWS)
                .find(|&row| pattern.cell(row, col))
                .map(|row| PATTERN_CODEBOOK[row][col])
                .unwrap_or(' ')
        })
        .collect()
}

/// Name the device firmware advertises for a given hardware id.
///
/// Only the lowest five base-5 digits take part, so ids wrap at [`NAME_SPACE`].
pub fn name_from_device_id(id: u32) -> String {
    let mut remaining = id;
    let mut name = [' '; NAME_LENGTH];
    for (i, letters) in ID_CODEBOOK.iter().enumerate() {
        let digit = (remaining % 5) as usize;
        remaining /= 5;
        name[NAME_LENGTH - i - 1] = letters[digit];
    }
    name.iter().collect()
}

/// Whether `name` can be shown as a pattern and read back unchanged
pub fn is_valid_name(name: &str) -> bool {
    let chars: Vec<char> = name.chars().collect();
    chars.len() == NAME_LENGTH
        && chars
            .iter()
            .enumerate()
            .all(|(col, ch)| (0..PATTERN_ROWS).any(|row| PATTERN_CODEBOOK[row][col] == *ch))
}
