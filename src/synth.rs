//! Built-in synthesizer: a cpal output stream driven by MIDI commands.
//!
//! The audio callback owns all voice state. Commands arrive over an mpsc
//! channel and are drained non-blockingly at the top of each buffer, so a
//! chord's note-ons all land in the same buffer.

use std::collections::HashMap;
use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::midi::MidiCommand;

/// Oscillator shape, selected by the current MIDI program family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waveform {
    Sine,
    Triangle,
    Saw,
    Square,
}

impl Waveform {
    /// Rough General MIDI family mapping: keyboards stay sine, guitars get
    /// triangle, basses and orchestral programs saw, synth programs square.
    fn for_program(program: u8) -> Self {
        match program {
            0..=23 => Waveform::Sine,
            24..=31 => Waveform::Triangle,
            32..=79 => Waveform::Saw,
            _ => Waveform::Square,
        }
    }

    /// One sample at `phase` cycles, in [-1, 1].
    fn sample(self, phase: f64) -> f64 {
        let t = phase.fract();
        match self {
            Waveform::Sine => (t * 2.0 * std::f64::consts::PI).sin(),
            Waveform::Triangle => 4.0 * (t - 0.5).abs() - 1.0,
            Waveform::Saw => 2.0 * t - 1.0,
            Waveform::Square => {
                if t < 0.5 { 1.0 } else { -1.0 }
            }
        }
    }
}

/// One ringing note inside the audio callback.
struct Voice {
    freq: f64,
    phase: f64,
    amp: f64,
}

/// Frequency in Hz for a MIDI note (A4 = 69 = 440 Hz).
fn midi_to_freq(note: u8) -> f64 {
    440.0 * 2.0_f64.powf((note as f64 - 69.0) / 12.0)
}

/// Handle to the audio thread. Dropping it stops the stream.
pub struct AudioEngine {
    tx: mpsc::Sender<MidiCommand>,
    _stream: cpal::Stream,
}

impl AudioEngine {
    pub fn new() -> Result<Self, String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("no output audio device available")?;

        let config = device
            .default_output_config()
            .map_err(|e| format!("failed to get default output config: {}", e))?;

        let sample_rate = config.sample_rate() as f64;
        let channels = config.channels() as usize;

        let (tx, rx) = mpsc::channel::<MidiCommand>();

        let mut voices: HashMap<u8, Voice> = HashMap::new();
        let mut waveform = Waveform::Sine;

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while let Ok(command) = rx.try_recv() {
                        match command {
                            MidiCommand::NoteOn { note, velocity } => {
                                voices.insert(
                                    note,
                                    Voice {
                                        freq: midi_to_freq(note),
                                        phase: 0.0,
                                        amp: velocity as f64 / 127.0,
                                    },
                                );
                            }
                            MidiCommand::NoteOff { note } => {
                                voices.remove(&note);
                            }
                            MidiCommand::ProgramChange { program } => {
                                waveform = Waveform::for_program(program);
                            }
                        }
                    }

                    for frame in data.chunks_mut(channels) {
                        let mut value = 0.0_f64;
                        for voice in voices.values_mut() {
                            value += waveform.sample(voice.phase) * voice.amp;
                            voice.phase += voice.freq / sample_rate;
                        }
                        if !voices.is_empty() {
                            // Normalize by voice count and apply a gentle volume
                            value = value / voices.len() as f64 * 0.3;
                        }
                        for sample in frame.iter_mut() {
                            *sample = value as f32;
                        }
                    }
                },
                move |err| {
                    log::error!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| format!("failed to build output stream: {}", e))?;

        stream
            .play()
            .map_err(|e| format!("failed to play stream: {}", e))?;

        Ok(Self {
            tx,
            _stream: stream,
        })
    }

    pub fn send(&self, command: MidiCommand) -> Result<(), String> {
        self.tx
            .send(command)
            .map_err(|_| "audio thread disconnected".to_string())
    }
}
