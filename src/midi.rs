//! MIDI command types and the external output port.
//!
//! The note engine emits `MidiCommand` values; everything downstream (the
//! built-in synthesizer, the hardware MIDI port) consumes them in emission
//! order. The port side is a small `MidiOut` abstraction over a midir
//! connection with a null backend for machines without one.

/// Fixed note-on velocity for every key press.
pub const DEFAULT_VELOCITY: u8 = 100;

/// A command for the synthesis/output backends. All traffic is on channel 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiCommand {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ProgramChange { program: u8 },
}

/// Note name with octave for status display, e.g. "E2" or "F#3".
/// Octave numbering follows the MIDI convention (C4 = 60).
pub fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let name = NAMES[(note % 12) as usize];
    let octave = (note / 12) as i8 - 1;
    format!("{}{}", name, octave)
}

/// An outgoing MIDI sink.
pub trait MidiOut: Send {
    fn send(&mut self, command: MidiCommand);
}

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl MidiOut for MidirOut {
    fn send(&mut self, command: MidiCommand) {
        // Raw channel-0 messages: 0x90 note-on, 0x80 note-off, 0xC0 program
        let result = match command {
            MidiCommand::NoteOn { note, velocity } => self.conn.send(&[0x90, note, velocity]),
            MidiCommand::NoteOff { note } => self.conn.send(&[0x80, note, 0]),
            MidiCommand::ProgramChange { program } => self.conn.send(&[0xC0, program]),
        };
        if let Err(e) = result {
            log::warn!("MIDI send failed: {}", e);
        }
    }
}

/// Used when no MIDI port is available; the built-in synth still plays.
struct NullOut;

impl MidiOut for NullOut {
    fn send(&mut self, _command: MidiCommand) {}
}

/// Open the first available MIDI output port, falling back to a null
/// output when there is none.
pub fn open_output() -> Box<dyn MidiOut> {
    let midi_out = match midir::MidiOutput::new("keyfret") {
        Ok(m) => m,
        Err(e) => {
            log::warn!("MIDI init error: {} - using null output", e);
            return Box::new(NullOut);
        }
    };

    let ports = midi_out.ports();
    let Some(port) = ports.first() else {
        log::info!("no MIDI output ports found - using null output");
        return Box::new(NullOut);
    };

    match midi_out.connect(port, "keyfret-out") {
        Ok(conn) => {
            log::info!("MIDI output connected");
            Box::new(MidirOut { conn })
        }
        Err(e) => {
            log::warn!("MIDI connect error: {} - using null output", e);
            Box::new(NullOut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(40), "E2");
        assert_eq!(note_name(45), "A2");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(66), "F#4");
    }

    #[test]
    fn test_note_name_extremes() {
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
    }
}
