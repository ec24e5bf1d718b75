mod engine;
mod error;
mod fretboard;
mod instrument;
mod keymap;
mod midi;
mod repl;
mod synth;
mod tuning;

use clap::{Parser, Subcommand, ValueEnum};

use engine::NoteEngine;
use keymap::KeyMap;
use tuning::Tuning;

#[derive(Parser)]
#[command(name = "keyfret", about = "Play your keyboard like a guitar")]
#[command(version)]
struct Cli {
    /// Write debug output to the log file
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive mode - play the fretboard with your keyboard
    Live {
        /// Tuning preset
        #[arg(long, value_enum, default_value_t = TuningPreset::Standard)]
        tuning: TuningPreset,

        /// Comma-separated open-string MIDI notes, overriding the preset
        #[arg(long, value_delimiter = ',')]
        open_notes: Option<Vec<u8>>,

        /// Initial MIDI program (see `keyfret instruments`)
        #[arg(long, default_value_t = 0)]
        program: u8,
    },

    /// Print the keyboard-to-fretboard layout
    Layout {
        /// Tuning preset
        #[arg(long, value_enum, default_value_t = TuningPreset::Standard)]
        tuning: TuningPreset,
    },

    /// List the selectable instruments
    Instruments,
}

#[derive(Clone, Copy, ValueEnum)]
enum TuningPreset {
    Standard,
    DropD,
}

impl TuningPreset {
    fn table(self) -> Tuning {
        match self {
            TuningPreset::Standard => Tuning::standard(),
            TuningPreset::DropD => Tuning::drop_d(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Live {
            tuning,
            open_notes,
            program,
        } => {
            let tuning = match open_notes {
                Some(notes) => Tuning::custom(notes).unwrap_or_else(|e| {
                    eprintln!("Configuration error: {}", e);
                    std::process::exit(1);
                }),
                None => tuning.table(),
            };
            let mut engine = build_engine(tuning);
            if let Err(e) = engine.set_program(program) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }

            if let Err(e) = repl::run(engine) {
                eprintln!("Live mode error: {}", e);
                std::process::exit(1);
            }
        }
        Command::Layout { tuning } => {
            print_layout(&build_engine(tuning.table()));
        }
        Command::Instruments => {
            for &(name, program) in instrument::GM_INSTRUMENTS {
                println!("{:>3}  {}", program, name);
            }
        }
    }
}

fn build_engine(tuning: Tuning) -> NoteEngine {
    let keymap = KeyMap::qwerty(&tuning).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });
    NoteEngine::new(keymap, tuning)
}

fn print_layout(engine: &NoteEngine) {
    let tuning = engine.tuning();
    let keymap = engine.keymap();

    print!("Fret:     ");
    for fret in 0..tuning.fret_count() {
        print!("{:<4}", fret);
    }
    println!();

    for string in 0..tuning.string_count() {
        print!(
            "{:<2}({:>3}):  ",
            tuning.string_name(string),
            tuning.open_note(string)
        );
        for fret in 0..tuning.fret_count() {
            let key = keymap
                .key_for(keymap::Coord { string, fret })
                .unwrap_or(' ');
            print!("{:<4}", key);
        }
        println!();
    }

    println!();
    println!("Notes:");
    for string in 0..tuning.string_count() {
        print!("{:<2}:      ", tuning.string_name(string));
        for fret in 0..tuning.fret_count() {
            print!("{:<4}", midi::note_name(tuning.note_for(string, fret, 0)));
        }
        println!();
    }
}

fn init_logging(verbose: bool) {
    use simplelog::{Config, LevelFilter, WriteLogger};

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    // stderr is unusable under raw mode, so log to a file
    let log_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("keyfret")
        .join("keyfret.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::File::create(&log_path)
        .or_else(|_| std::fs::File::create("/tmp/keyfret.log"));

    if let Ok(file) = file {
        let _ = WriteLogger::init(level, Config::default(), file);
        log::info!("keyfret starting (log level: {:?})", level);
    }
}
