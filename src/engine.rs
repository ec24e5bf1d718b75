//! The key-event to MIDI-command state machine.
//!
//! Each string is an independent monophonic voice. The engine tracks which
//! frets are held per string, picks the sounding fret (highest held wins,
//! like fretting a real neck), and emits the minimal command sequence to
//! keep the backend consistent: a note-off for the old pitch always comes
//! before the note-on for the new one on the same string. Chords need no
//! special handling; keys on different strings transition independently.

use crate::error::InvalidProgram;
use crate::fretboard::{Fretboard, Sounding};
use crate::keymap::KeyMap;
use crate::midi::{DEFAULT_VELOCITY, MidiCommand};
use crate::tuning::{OCTAVE_MAX, OCTAVE_MIN, Tuning};

/// A raw key event from the input source. Key identifiers are the
/// characters the terminal reports; unmapped ones are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(char),
    KeyUp(char),
}

pub struct NoteEngine {
    keymap: KeyMap,
    tuning: Tuning,
    fretboard: Fretboard,
    program: u8,
    octave: i8,
}

impl NoteEngine {
    pub fn new(keymap: KeyMap, tuning: Tuning) -> Self {
        let fretboard = Fretboard::new(tuning.string_count());
        Self {
            keymap,
            tuning,
            fretboard,
            program: 0,
            octave: 0,
        }
    }

    /// Process one key event and return the MIDI commands it produced, in
    /// the order they must reach the backend. Unmapped keys, repeats of an
    /// already-held key, and releases of an unheld key all produce nothing.
    pub fn process(&mut self, event: InputEvent) -> Vec<MidiCommand> {
        match event {
            InputEvent::KeyDown(key) => self.key_down(key),
            InputEvent::KeyUp(key) => self.key_up(key),
        }
    }

    fn key_down(&mut self, key: char) -> Vec<MidiCommand> {
        let Some(coord) = self.keymap.coord_for(key) else {
            return Vec::new();
        };
        if !self.fretboard.string_mut(coord.string).held.insert(coord.fret) {
            // key-repeat: this fret is already held
            return Vec::new();
        }
        self.rearbitrate(coord.string)
    }

    fn key_up(&mut self, key: char) -> Vec<MidiCommand> {
        let Some(coord) = self.keymap.coord_for(key) else {
            return Vec::new();
        };
        if !self.fretboard.string_mut(coord.string).held.remove(&coord.fret) {
            // release without a matching press
            return Vec::new();
        }
        if self.fretboard.sounding(coord.string).is_none() {
            // A program change silenced this string while its keys stayed
            // down. Releasing them must not start a note the player did not
            // just press; the next key-down re-arbitrates normally.
            return Vec::new();
        }
        self.rearbitrate(coord.string)
    }

    /// Re-evaluate which fret should sound on `string` and emit the
    /// transition if it changed. Note-off strictly precedes note-on.
    fn rearbitrate(&mut self, string: usize) -> Vec<MidiCommand> {
        let target = self.fretboard.top_fret(string);
        let current = self.fretboard.sounding(string);
        if target == current.map(|s| s.fret) {
            return Vec::new();
        }

        let mut commands = Vec::new();
        if let Some(Sounding { note, .. }) = current {
            commands.push(MidiCommand::NoteOff { note });
        }
        let sounding = target.map(|fret| {
            let note = self.tuning.note_for(string, fret, self.octave);
            commands.push(MidiCommand::NoteOn {
                note,
                velocity: DEFAULT_VELOCITY,
            });
            Sounding { fret, note }
        });
        self.fretboard.string_mut(string).sounding = sounding;
        commands
    }

    /// Change the MIDI program. Every sounding string is silenced first so
    /// the old timbre cannot bleed into the new one; held keys are left
    /// untouched. Out-of-range programs are rejected with no state change.
    pub fn set_program(&mut self, program: u8) -> Result<Vec<MidiCommand>, InvalidProgram> {
        if program > 127 {
            return Err(InvalidProgram(program));
        }
        let mut commands = self.silence();
        self.program = program;
        commands.push(MidiCommand::ProgramChange { program });
        log::debug!("program change to {} ({})", program, crate::instrument::name_for(program));
        Ok(commands)
    }

    /// Emit a note-off for everything sounding and clear the sounding
    /// state. Held keys are untouched.
    pub fn silence(&mut self) -> Vec<MidiCommand> {
        let mut commands = Vec::new();
        for string in 0..self.fretboard.string_count() {
            if let Some(Sounding { note, .. }) = self.fretboard.sounding(string) {
                commands.push(MidiCommand::NoteOff { note });
                self.fretboard.string_mut(string).sounding = None;
            }
        }
        commands
    }

    /// Shift the octave, clamped to the supported range. Only notes started
    /// after the change are affected; anything already ringing keeps its
    /// pitch until released.
    pub fn change_octave(&mut self, delta: i8) -> i8 {
        self.octave = self.octave.saturating_add(delta).clamp(OCTAVE_MIN, OCTAVE_MAX);
        self.octave
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    pub fn octave(&self) -> i8 {
        self.octave
    }

    pub fn fretboard(&self) -> &Fretboard {
        &self.fretboard
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InputEvent::{KeyDown, KeyUp};
    use MidiCommand::{NoteOff, NoteOn, ProgramChange};

    /// Standard tuning + QWERTY layout. Bottom row (z x c v b n m , . /)
    /// is the E string, open note 40.
    fn engine() -> NoteEngine {
        let tuning = Tuning::standard();
        let keymap = KeyMap::qwerty(&tuning).unwrap();
        NoteEngine::new(keymap, tuning)
    }

    fn on(note: u8) -> MidiCommand {
        NoteOn {
            note,
            velocity: DEFAULT_VELOCITY,
        }
    }

    #[test]
    fn test_single_note_lifecycle() {
        let mut engine = engine();
        assert_eq!(engine.process(KeyDown('z')), vec![on(40)]);
        assert_eq!(engine.process(KeyUp('z')), vec![NoteOff { note: 40 }]);
        assert_eq!(engine.fretboard().sounding(3), None);
        assert_eq!(engine.fretboard().held(3).count(), 0);
    }

    #[test]
    fn test_off_before_on_when_sounding_fret_changes() {
        // Spec scenario on the E string: fret 0 then fret 1 while held.
        let mut engine = engine();
        assert_eq!(engine.process(KeyDown('z')), vec![on(40)]);
        assert_eq!(
            engine.process(KeyDown('x')),
            vec![NoteOff { note: 40 }, on(41)]
        );
        assert_eq!(
            engine.process(KeyUp('x')),
            vec![NoteOff { note: 41 }, on(40)]
        );
        assert_eq!(engine.process(KeyUp('z')), vec![NoteOff { note: 40 }]);
    }

    #[test]
    fn test_highest_held_fret_wins() {
        // Frets 2, 5, 3 on the E string: c, n, v.
        let mut engine = engine();
        assert_eq!(engine.process(KeyDown('c')), vec![on(42)]);
        assert_eq!(
            engine.process(KeyDown('n')),
            vec![NoteOff { note: 42 }, on(45)]
        );
        // Fret 3 is below the sounding fret 5: held set updates, no sound change
        assert_eq!(engine.process(KeyDown('v')), Vec::new());
        assert_eq!(engine.fretboard().sounding(3).map(|s| s.fret), Some(5));

        assert_eq!(
            engine.process(KeyUp('n')),
            vec![NoteOff { note: 45 }, on(43)]
        );
        assert_eq!(
            engine.process(KeyUp('v')),
            vec![NoteOff { note: 43 }, on(42)]
        );
        assert_eq!(engine.process(KeyUp('c')), vec![NoteOff { note: 42 }]);
        assert_eq!(engine.fretboard().sounding(3), None);
    }

    #[test]
    fn test_releasing_non_sounding_fret_is_silent() {
        let mut engine = engine();
        engine.process(KeyDown('n')); // fret 5
        engine.process(KeyDown('c')); // fret 2, below - no commands
        assert_eq!(engine.process(KeyUp('c')), Vec::new());
        assert_eq!(engine.fretboard().sounding(3).map(|s| s.fret), Some(5));
        assert!(!engine.fretboard().held(3).any(|f| f == 2));
    }

    #[test]
    fn test_chord_across_strings_is_independent() {
        // Same column, two strings: v = E string fret 3, f = A string fret 3.
        let mut engine = engine();
        let first = engine.process(KeyDown('v'));
        let second = engine.process(KeyDown('f'));
        assert_eq!(first, vec![on(43)]);
        assert_eq!(second, vec![on(48)]);

        // Both ring at once, one per string
        assert_eq!(engine.fretboard().sounding(3).map(|s| s.note), Some(43));
        assert_eq!(engine.fretboard().sounding(2).map(|s| s.note), Some(48));

        // Releasing one leaves the other untouched
        assert_eq!(engine.process(KeyUp('v')), vec![NoteOff { note: 43 }]);
        assert_eq!(engine.fretboard().sounding(2).map(|s| s.note), Some(48));
    }

    #[test]
    fn test_duplicate_events_are_noops() {
        let mut engine = engine();
        assert_eq!(engine.process(KeyDown('z')), vec![on(40)]);
        // key-repeat delivers a second press with no release in between
        assert_eq!(engine.process(KeyDown('z')), Vec::new());
        assert_eq!(engine.process(KeyUp('z')), vec![NoteOff { note: 40 }]);
        // release of a key that is no longer held
        assert_eq!(engine.process(KeyUp('z')), Vec::new());
    }

    #[test]
    fn test_unmapped_keys_are_ignored() {
        let mut engine = engine();
        assert_eq!(engine.process(KeyDown('!')), Vec::new());
        assert_eq!(engine.process(KeyUp('#')), Vec::new());
    }

    #[test]
    fn test_at_most_one_note_per_string() {
        // Walk a press/release sequence on the E string and track active
        // notes from the emitted commands alone.
        let mut engine = engine();
        let events = [
            KeyDown('z'),
            KeyDown('c'),
            KeyDown('n'),
            KeyUp('c'),
            KeyDown('v'),
            KeyUp('n'),
            KeyUp('z'),
            KeyUp('v'),
        ];

        let mut active: Vec<u8> = Vec::new();
        for event in events {
            for command in engine.process(event) {
                match command {
                    NoteOn { note, .. } => active.push(note),
                    NoteOff { note } => active.retain(|&n| n != note),
                    ProgramChange { .. } => {}
                }
            }
            assert!(active.len() <= 1, "polyphony on a single string: {:?}", active);
            assert_eq!(
                engine.fretboard().sounding(3).map(|s| s.note),
                active.first().copied()
            );
        }
        assert!(active.is_empty());
    }

    #[test]
    fn test_program_change_silences_sounding_strings() {
        let mut engine = engine();
        engine.process(KeyDown('z')); // E string, note 40
        engine.process(KeyDown('a')); // A string, note 45

        let commands = engine.set_program(30).unwrap();
        assert_eq!(
            commands,
            vec![
                NoteOff { note: 45 },
                NoteOff { note: 40 },
                ProgramChange { program: 30 },
            ]
        );
        assert_eq!(engine.program(), 30);

        // Sounding cleared, held keys untouched
        assert_eq!(engine.fretboard().sounding(2), None);
        assert_eq!(engine.fretboard().sounding(3), None);
        assert_eq!(engine.fretboard().held(2).collect::<Vec<_>>(), vec![0]);
        assert_eq!(engine.fretboard().held(3).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_release_after_program_change_stays_silent() {
        let mut engine = engine();
        engine.process(KeyDown('c')); // fret 2
        engine.process(KeyDown('n')); // fret 5, sounding
        engine.set_program(24).unwrap();

        // Releasing the old sounding fret must not resurrect fret 2
        assert_eq!(engine.process(KeyUp('n')), Vec::new());
        assert_eq!(engine.process(KeyUp('c')), Vec::new());
        assert_eq!(engine.fretboard().held(3).count(), 0);
        assert_eq!(engine.fretboard().sounding(3), None);
    }

    #[test]
    fn test_key_down_after_program_change_rearbitrates() {
        let mut engine = engine();
        engine.process(KeyDown('c')); // fret 2
        engine.set_program(24).unwrap();

        // A fresh press starts sound again from the full held set
        assert_eq!(engine.process(KeyDown('x')), vec![on(42)]);
        assert_eq!(engine.fretboard().sounding(3).map(|s| s.fret), Some(2));
    }

    #[test]
    fn test_invalid_program_rejected_without_side_effects() {
        let mut engine = engine();
        engine.process(KeyDown('z'));

        assert_eq!(engine.set_program(128), Err(InvalidProgram(128)));
        assert_eq!(engine.program(), 0);
        // Still sounding: the rejected request must not panic-silence
        assert_eq!(engine.fretboard().sounding(3).map(|s| s.note), Some(40));
    }

    #[test]
    fn test_octave_shift_applies_to_new_notes_only() {
        let mut engine = engine();
        assert_eq!(engine.process(KeyDown('z')), vec![on(40)]);
        assert_eq!(engine.change_octave(1), 1);

        // The ringing note keeps its original pitch until released
        assert_eq!(engine.process(KeyUp('z')), vec![NoteOff { note: 40 }]);
        assert_eq!(engine.process(KeyDown('z')), vec![on(52)]);
    }

    #[test]
    fn test_octave_shift_clamped() {
        let mut engine = engine();
        assert_eq!(engine.change_octave(3), 3);
        assert_eq!(engine.change_octave(1), 3);
        assert_eq!(engine.change_octave(-7), -3);
        assert_eq!(engine.change_octave(-1), -3);
    }

    #[test]
    fn test_minimal_two_key_map() {
        // Key map {a -> (0, 0), s -> (0, 1)} over a single string tuned
        // to open note 40.
        let tuning = Tuning::custom(vec![40]).unwrap();
        let keymap = KeyMap::from_triples([('a', 0, 0), ('s', 0, 1)], &tuning).unwrap();
        let mut engine = NoteEngine::new(keymap, tuning);

        assert_eq!(engine.process(KeyDown('a')), vec![on(40)]);
        assert_eq!(
            engine.process(KeyDown('s')),
            vec![NoteOff { note: 40 }, on(41)]
        );
        assert_eq!(
            engine.process(KeyUp('s')),
            vec![NoteOff { note: 41 }, on(40)]
        );
        assert_eq!(engine.process(KeyUp('a')), vec![NoteOff { note: 40 }]);
    }
}
