use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, Command};

use rhythm_weaver::audio::{AudioClock, DeviceClock, HeadlessClock};
use rhythm_weaver::config::EngineConfig;
use rhythm_weaver::model::{Document, Tempo};
use rhythm_weaver::sequencer::StartPolicy;
use rhythm_weaver::storage::document as document_io;
use rhythm_weaver::storage::{preset::PresetStore, state};
use rhythm_weaver::{console, engine, repl};

fn cli() -> Command {
    Command::new("rhythm-weaver")
        .about("Step-sequencer metronome REPL")
        .arg(
            Arg::new("open")
                .short('o')
                .long("open")
                .value_name("FILE")
                .help("Open a JSON document on start instead of the last session"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Reduce startup banner output"),
        )
        .arg(
            Arg::new("no-audio")
                .long("no-audio")
                .action(ArgAction::SetTrue)
                .help("Run without an output device; clicks are only logged"),
        )
        .arg(
            Arg::new("start-at")
                .long("start-at")
                .value_name("first|last")
                .value_parser(["first", "last"])
                .help("Measure playback starts from after a stop"),
        )
        .arg(
            Arg::new("tempo")
                .short('t')
                .long("tempo")
                .value_name("BPM")
                .value_parser(value_parser!(i64).range(1..=300))
                .help("Initial tempo, overriding the opened document"),
        )
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let mut config = EngineConfig::from_env();
    if let Some(policy) = matches.get_one::<String>("start-at") {
        config.start_policy = policy.parse::<StartPolicy>().map_err(|e| anyhow!(e))?;
    }

    let mut document = match matches.get_one::<String>("open") {
        Some(path) => match document_io::open(path) {
            Ok(doc) => doc,
            Err(e) => {
                eprintln!("Failed to open {}: {:#}\nStarting new document.", path, e);
                Document::starter()
            }
        },
        None => match &config.state_path {
            Some(path) => state::restore(path),
            None => Document::starter(),
        },
    };
    if let Some(bpm) = matches.get_one::<i64>("tempo") {
        document.tempo = Tempo::new(*bpm)?;
    }

    if !matches.get_flag("quiet") {
        println!(
            "RHYTHM WEAVER: tempo {}, {} measures, starts at {} (type :help)",
            document.tempo,
            document.measures.len(),
            config.start_policy.as_str()
        );
    }

    let headless = matches.get_flag("no-audio");
    let presets = PresetStore::new(config.preset_dir.clone());
    let handle = engine::spawn(config, document, move || open_clock(headless))?;
    repl::run_repl(&handle.client(), &presets)?;
    handle.shutdown();
    Ok(())
}

fn open_clock(headless: bool) -> Box<dyn AudioClock> {
    if headless {
        return Box::new(HeadlessClock::new());
    }
    match DeviceClock::open() {
        Ok(clock) => Box::new(clock),
        Err(e) => {
            console::warn(format!("audio unavailable ({:#}); running without sound", e));
            Box::new(HeadlessClock::new())
        }
    }
}
