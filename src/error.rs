use thiserror::Error;

/// Startup configuration failures. These are fatal: no engine is ever
/// constructed from an invalid layout or tuning.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("key '{key}' is assigned to more than one fretboard position")]
    DuplicateKey { key: char },

    #[error("string {string} fret {fret} has more than one key assigned")]
    DuplicateCoord { string: usize, fret: usize },

    #[error("layout uses string {string} but the tuning only has {strings} strings")]
    StringOutOfRange { string: usize, strings: usize },

    #[error("layout uses fret {fret} but the tuning only has {frets} frets")]
    FretOutOfRange { fret: usize, frets: usize },

    #[error("tuning needs at least one string and one fret")]
    EmptyTuning,
}

/// Rejected program-change request. Unlike derived note pitches, instrument
/// numbers are a deliberate user choice, so out-of-range values are reported
/// rather than clamped. The current program is left unchanged.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("MIDI program {0} is out of range (0-127)")]
pub struct InvalidProgram(pub u8);
