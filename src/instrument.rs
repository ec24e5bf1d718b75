//! General MIDI instrument table.
//!
//! A curated subset of the GM melodic programs, used by the `instruments`
//! subcommand and the live-mode instrument cycling. Programs outside the
//! table are still accepted by the engine; they just display as a number.

/// (display name, program number), ordered by program.
pub const GM_INSTRUMENTS: &[(&str, u8)] = &[
    ("Piano", 0),
    ("Electric Piano", 4),
    ("Acoustic Guitar (nylon)", 24),
    ("Acoustic Guitar (steel)", 25),
    ("Electric Guitar (clean)", 26),
    ("Electric Guitar (jazz)", 27),
    ("Electric Guitar (muted)", 28),
    ("Overdriven Guitar", 29),
    ("Distortion Guitar", 30),
    ("Guitar Harmonics", 31),
    ("Acoustic Bass", 32),
    ("Electric Bass (finger)", 33),
    ("Electric Bass (pick)", 34),
    ("Violin", 40),
    ("Trumpet", 56),
    ("Saxophone", 65),
    ("Flute", 73),
    ("Synth Lead", 80),
    ("Synth Pad", 88),
];

/// Display name for a program, falling back to the raw number for programs
/// outside the table.
pub fn name_for(program: u8) -> String {
    GM_INSTRUMENTS
        .iter()
        .find(|&&(_, p)| p == program)
        .map(|&(name, _)| name.to_string())
        .unwrap_or_else(|| format!("Program {:03}", program))
}

/// Next table entry after `program`, wrapping to the first.
pub fn next_after(program: u8) -> u8 {
    GM_INSTRUMENTS
        .iter()
        .map(|&(_, p)| p)
        .find(|&p| p > program)
        .unwrap_or(GM_INSTRUMENTS[0].1)
}

/// Previous table entry before `program`, wrapping to the last.
pub fn previous_before(program: u8) -> u8 {
    GM_INSTRUMENTS
        .iter()
        .rev()
        .map(|&(_, p)| p)
        .find(|&p| p < program)
        .unwrap_or(GM_INSTRUMENTS[GM_INSTRUMENTS.len() - 1].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names() {
        assert_eq!(name_for(0), "Piano");
        assert_eq!(name_for(30), "Distortion Guitar");
    }

    #[test]
    fn test_unknown_program_shows_number() {
        assert_eq!(name_for(3), "Program 003");
        assert_eq!(name_for(127), "Program 127");
    }

    #[test]
    fn test_cycling_wraps() {
        assert_eq!(next_after(0), 4);
        assert_eq!(next_after(88), 0);
        assert_eq!(previous_before(4), 0);
        assert_eq!(previous_before(0), 88);
    }

    #[test]
    fn test_cycling_from_untabled_program() {
        assert_eq!(next_after(35), 40);
        assert_eq!(previous_before(35), 34);
    }
}
