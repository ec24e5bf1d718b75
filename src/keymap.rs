//! Keyboard-to-fretboard mapping.
//!
//! Each keyboard column is one fret across all strings and each row is one
//! string, so sliding a finger along a row walks up the neck and pressing a
//! column across rows frets a chord shape. The mapping is bidirectional:
//! key to position for the engine, position to key for display.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::tuning::Tuning;

/// A position on the fretboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub string: usize,
    pub fret: usize,
}

/// The reference QWERTY layout: `COLUMNS[fret][string]`.
/// Rows top to bottom: number row, QWERTY row, home row, bottom row.
const COLUMNS: [[char; 4]; 10] = [
    ['1', 'q', 'a', 'z'],
    ['2', 'w', 's', 'x'],
    ['3', 'e', 'd', 'c'],
    ['4', 'r', 'f', 'v'],
    ['5', 't', 'g', 'b'],
    ['6', 'y', 'h', 'n'],
    ['7', 'u', 'j', 'm'],
    ['8', 'i', 'k', ','],
    ['9', 'o', 'l', '.'],
    ['0', 'p', ';', '/'],
];

#[derive(Debug, Clone)]
pub struct KeyMap {
    by_key: HashMap<char, Coord>,
    by_coord: HashMap<Coord, char>,
}

impl KeyMap {
    /// The reference layout, validated against `tuning`'s ranges.
    pub fn qwerty(tuning: &Tuning) -> Result<Self, ConfigError> {
        let triples = COLUMNS.iter().enumerate().flat_map(|(fret, column)| {
            column
                .iter()
                .enumerate()
                .map(move |(string, &key)| (key, string, fret))
        });
        Self::from_triples(triples, tuning)
    }

    /// Build a map from `(key, string, fret)` triples. Fails if a key or a
    /// position is assigned twice, or a position lies outside the tuning's
    /// string/fret ranges. All failures are configuration errors surfaced
    /// at construction, never at lookup.
    pub fn from_triples(
        triples: impl IntoIterator<Item = (char, usize, usize)>,
        tuning: &Tuning,
    ) -> Result<Self, ConfigError> {
        let mut by_key = HashMap::new();
        let mut by_coord = HashMap::new();

        for (key, string, fret) in triples {
            if string >= tuning.string_count() {
                return Err(ConfigError::StringOutOfRange {
                    string,
                    strings: tuning.string_count(),
                });
            }
            if fret >= tuning.fret_count() {
                return Err(ConfigError::FretOutOfRange {
                    fret,
                    frets: tuning.fret_count(),
                });
            }
            let coord = Coord { string, fret };
            if by_key.insert(key, coord).is_some() {
                return Err(ConfigError::DuplicateKey { key });
            }
            if by_coord.insert(coord, key).is_some() {
                return Err(ConfigError::DuplicateCoord { string, fret });
            }
        }

        Ok(Self { by_key, by_coord })
    }

    /// Fretboard position for a key, or `None` for unmapped keys
    /// (modifiers, unassigned letters).
    pub fn coord_for(&self, key: char) -> Option<Coord> {
        self.by_key.get(&key).copied()
    }

    /// Reverse lookup, used only for display.
    pub fn key_for(&self, coord: Coord) -> Option<char> {
        self.by_coord.get(&coord).copied()
    }
}
