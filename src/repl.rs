//! Interactive live mode: the terminal keyboard becomes the fretboard.
//!
//! Key events feed the note engine; every command it emits is forwarded to
//! both the built-in synthesizer and the external MIDI port.

use std::io::{self, Write};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use crate::engine::{InputEvent, NoteEngine};
use crate::instrument;
use crate::midi::{self, MidiCommand, MidiOut};
use crate::synth::AudioEngine;

/// Run the interactive live mode until Esc.
pub fn run(mut engine: NoteEngine) -> Result<(), String> {
    let audio = AudioEngine::new()?;
    let mut port = midi::open_output();

    // Tell both backends about the initial instrument
    forward(
        &audio,
        &mut port,
        &[MidiCommand::ProgramChange {
            program: engine.program(),
        }],
    )?;

    let mut stdout = io::stdout();

    // Enter raw mode
    terminal::enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {}", e))?;
    execute!(stdout, EnterAlternateScreen).map_err(|e| format!("alternate screen: {}", e))?;

    // Enable keyboard enhancement for key release detection.
    // On macOS, the terminal may accept the enhancement flag but not actually
    // send release events, so we disable it and use the fallback timer.
    let has_key_release = if cfg!(target_os = "macos") {
        false
    } else {
        queue!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok()
            && stdout.flush().is_ok()
    };

    print_banner(&mut stdout, &engine);

    let result = event_loop(&mut engine, &audio, &mut port, &mut stdout, has_key_release);

    // Silence anything still ringing before tearing the terminal down
    let _ = forward_silence(&mut engine, &audio, &mut port);
    std::thread::sleep(Duration::from_millis(20));

    if has_key_release {
        let _ = execute!(
            stdout,
            crossterm::event::PopKeyboardEnhancementFlags,
            LeaveAlternateScreen
        );
    } else {
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
    let _ = terminal::disable_raw_mode();

    result
}

fn event_loop(
    engine: &mut NoteEngine,
    audio: &AudioEngine,
    port: &mut Box<dyn MidiOut>,
    stdout: &mut io::Stdout,
    has_key_release: bool,
) -> Result<(), String> {
    // For the fallback path: timer threads send back the key to release.
    let (fallback_tx, fallback_rx) = std_mpsc::channel::<char>();

    loop {
        // Drain any fallback key-ups from timer threads
        if !has_key_release {
            while let Ok(key) = fallback_rx.try_recv() {
                let commands = engine.process(InputEvent::KeyUp(key));
                forward(audio, port, &commands)?;
                if !commands.is_empty() {
                    update_status(stdout, engine);
                }
            }
        }

        if !event::poll(Duration::from_millis(50))
            .map_err(|e| format!("event poll error: {}", e))?
        {
            continue;
        }

        let ev = event::read().map_err(|e| format!("event read error: {}", e))?;

        match ev {
            Event::Key(KeyEvent {
                code: KeyCode::Esc,
                kind: KeyEventKind::Press,
                ..
            }) => {
                return Ok(());
            }

            Event::Key(KeyEvent {
                code: KeyCode::Up,
                kind: KeyEventKind::Press,
                ..
            }) => {
                let next = instrument::next_after(engine.program());
                let commands = engine.set_program(next).map_err(|e| e.to_string())?;
                forward(audio, port, &commands)?;
                update_status(stdout, engine);
            }

            Event::Key(KeyEvent {
                code: KeyCode::Down,
                kind: KeyEventKind::Press,
                ..
            }) => {
                let previous = instrument::previous_before(engine.program());
                let commands = engine.set_program(previous).map_err(|e| e.to_string())?;
                forward(audio, port, &commands)?;
                update_status(stdout, engine);
            }

            Event::Key(KeyEvent {
                code: KeyCode::Left,
                kind: KeyEventKind::Press,
                ..
            }) => {
                engine.change_octave(-1);
                update_status(stdout, engine);
            }

            Event::Key(KeyEvent {
                code: KeyCode::Right,
                kind: KeyEventKind::Press,
                ..
            }) => {
                engine.change_octave(1);
                update_status(stdout, engine);
            }

            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: KeyEventKind::Press,
                ..
            }) => {
                let key = c.to_ascii_lowercase();

                // Fallback: no key release support - restart the note so a
                // held key keeps sounding through the auto-release
                if !has_key_release {
                    let commands = engine.process(InputEvent::KeyUp(key));
                    forward(audio, port, &commands)?;
                }

                let commands = engine.process(InputEvent::KeyDown(key));
                forward(audio, port, &commands)?;
                update_status(stdout, engine);

                // Fallback: auto-release after 300ms
                if !has_key_release && engine.keymap().coord_for(key).is_some() {
                    let tx = fallback_tx.clone();
                    std::thread::spawn(move || {
                        std::thread::sleep(Duration::from_millis(300));
                        let _ = tx.send(key);
                    });
                }
            }

            Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                kind: KeyEventKind::Release,
                ..
            }) => {
                let commands = engine.process(InputEvent::KeyUp(c.to_ascii_lowercase()));
                forward(audio, port, &commands)?;
                update_status(stdout, engine);
            }

            _ => {}
        }
    }
}

/// Send a command batch to both backends, preserving order.
fn forward(
    audio: &AudioEngine,
    port: &mut Box<dyn MidiOut>,
    commands: &[MidiCommand],
) -> Result<(), String> {
    for &command in commands {
        audio.send(command)?;
        port.send(command);
    }
    Ok(())
}

fn forward_silence(
    engine: &mut NoteEngine,
    audio: &AudioEngine,
    port: &mut Box<dyn MidiOut>,
) -> Result<(), String> {
    let commands = engine.silence();
    forward(audio, port, &commands)
}

fn print_banner(stdout: &mut io::Stdout, engine: &NoteEngine) {
    let tuning = engine.tuning();
    let keymap = engine.keymap();

    let mut banner = String::from("\x1b[2J\x1b[H");
    banner.push_str("keyfret live - virtual guitar mode\r\n");
    banner.push_str("─────────────────────────────────────────\r\n\r\n");

    banner.push_str("  Fret:    ");
    for fret in 0..tuning.fret_count() {
        banner.push_str(&format!("{:<3}", fret));
    }
    banner.push_str("\r\n");

    for string in 0..tuning.string_count() {
        banner.push_str(&format!(
            "  {:<2}({:>3}): ",
            tuning.string_name(string),
            tuning.open_note(string)
        ));
        for fret in 0..tuning.fret_count() {
            let key = keymap
                .key_for(crate::keymap::Coord { string, fret })
                .unwrap_or(' ');
            banner.push_str(&format!("{:<3}", key));
        }
        banner.push_str("\r\n");
    }

    banner.push_str("\r\n  Instrument: Up/Down   Octave: Left/Right   Quit: Esc\r\n");
    let _ = write!(stdout, "{}", banner);
    update_status(stdout, engine);
}

fn update_status(stdout: &mut io::Stdout, engine: &NoteEngine) {
    // Status line sits two rows under the help line
    let row = 7 + engine.tuning().string_count();

    // One entry per active string: held frets in brackets, sounding note
    // after them (a string can be held but silent right after an
    // instrument change).
    let mut parts = Vec::new();
    for string in 0..engine.fretboard().string_count() {
        let held: Vec<String> = engine
            .fretboard()
            .held(string)
            .map(|fret| fret.to_string())
            .collect();
        if held.is_empty() {
            continue;
        }
        let name = engine.tuning().string_name(string);
        match engine.fretboard().sounding(string) {
            Some(sounding) => parts.push(format!(
                "{}[{}]={}",
                name,
                held.join(","),
                midi::note_name(sounding.note)
            )),
            None => parts.push(format!("{}[{}]", name, held.join(","))),
        }
    }
    let notes_display = if parts.is_empty() {
        "---".to_string()
    } else {
        parts.join("  ")
    };

    let _ = write!(
        stdout,
        "\x1b[{};1H\x1b[2K  {} | Octave {:+} | {}\r",
        row,
        instrument::name_for(engine.program()),
        engine.octave(),
        notes_display
    );
    let _ = stdout.flush();
}
