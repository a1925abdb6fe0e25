use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use rustyline::{error::ReadlineError, history::DefaultHistory, Editor, ExternalPrinter};

use crate::console::{self, Level};
use crate::engine::{EngineClient, Snapshot};
use crate::model::Measure;
use crate::sequencer::{Playhead, TransportStatus};
use crate::storage::document as document_io;
use crate::storage::preset::PresetStore;

mod completer;
use completer::WeaverHelper;

pub fn run_repl(engine: &EngineClient, presets: &PresetStore) -> Result<()> {
    let mut rl = Editor::<WeaverHelper, DefaultHistory>::new()?;
    rl.set_helper(Some(WeaverHelper::new()));

    // Background output goes through the external printer so it does not break the input line.
    if let Ok(pr) = rl.create_external_printer() {
        let lock = StdMutex::new(pr);
        set_external_printer(Some(Box::new(move |s: String| {
            if let Ok(mut g) = lock.lock() {
                let _ = g.print(s);
            }
        })));
    }
    forward_console();

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                rl.add_history_entry(line.as_str())?;
                match handle_line(engine, presets, &line) {
                    Ok(Output::None) => {}
                    Ok(Output::Text(t)) => println!("{}", t),
                    Ok(Output::Quit) => {
                        println!("bye");
                        break;
                    }
                    Err(e) => eprintln!("error: {}", e),
                }
                if line.trim_start().starts_with("save") {
                    if let Some(h) = rl.helper_mut() {
                        h.refresh_documents();
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("bye");
                break;
            }
            Err(err) => {
                eprintln!("repl error: {}", err);
                break;
            }
        }
    }
    set_live_view(false);
    set_external_printer(None);
    Ok(())
}

#[derive(Debug)]
enum Output {
    None,
    Text(String),
    Quit,
}

fn handle_line(engine: &EngineClient, presets: &PresetStore, line: &str) -> Result<Output> {
    let l = line.trim();
    if let Some(rest) = l.strip_prefix(':') {
        return handle_meta(engine, rest);
    }

    // `a; b; c` runs each command in order and stops at the first error.
    if l.contains(';') {
        let mut texts = Vec::new();
        for cmd in l.split(';').map(str::trim).filter(|c| !c.is_empty()) {
            match handle_line(engine, presets, cmd)? {
                Output::None => {}
                Output::Text(t) => texts.push(t),
                Output::Quit => return Ok(Output::Quit),
            }
        }
        return Ok(if texts.is_empty() { Output::None } else { Output::Text(texts.join("\n")) });
    }

    let args = shlex::split(l).ok_or_else(|| anyhow!("unbalanced quotes"))?;
    let mut parts = args.into_iter();
    let cmd: String = parts.next().unwrap_or_default();
    match cmd.as_str() {
        "play" => Ok(Output::Text(
            if engine.play()? { "playing" } else { "already playing" }.into(),
        )),
        "pause" => Ok(Output::Text(if engine.pause()? { "paused" } else { "not playing" }.into())),
        "toggle" => Ok(Output::Text(engine.toggle()?.as_str().into())),
        "stop" => {
            engine.stop()?;
            Ok(Output::Text("stopped".into()))
        }
        "tempo" | "bpm" => match parts.next() {
            Some(v) => {
                let requested: i64 = v.parse().map_err(|_| anyhow!("usage: tempo <bpm>"))?;
                let tempo = engine.set_tempo(requested)?;
                if i64::from(tempo.bpm()) == requested {
                    Ok(Output::Text(format!("tempo set to {}", tempo)))
                } else {
                    Ok(Output::Text(format!("tempo clamped to {}", tempo)))
                }
            }
            None => Ok(Output::Text(format!("tempo {}", engine.document()?.tempo))),
        },
        "add" => {
            let index = engine.add_measure()?;
            Ok(Output::Text(format!("added measure {}", index + 1)))
        }
        "remove" => {
            let index = parse_index("measure", parts.next(), "usage: remove <measure>")?;
            engine.remove_measure(index)?;
            Ok(Output::Text(format!("removed measure {}", index + 1)))
        }
        "subdiv" => {
            const USAGE: &str = "usage: subdiv <measure> <1-16>";
            let index = parse_index("measure", parts.next(), USAGE)?;
            let n: i64 = parts
                .next()
                .ok_or_else(|| anyhow!(USAGE))?
                .parse()
                .map_err(|_| anyhow!(USAGE))?;
            let measure = engine.set_subdivisions(index, n)?;
            Ok(Output::Text(describe_measure(index, &measure)))
        }
        "rotate" => {
            const USAGE: &str = "usage: rotate <measure> <pulse>";
            let index = parse_index("measure", parts.next(), USAGE)?;
            let pulse = parse_index("pulse", parts.next(), USAGE)?;
            let state = engine.rotate_pulse(index, pulse)?;
            Ok(Output::Text(format!(
                "measure {} pulse {}: {}",
                index + 1,
                pulse + 1,
                state.as_str()
            )))
        }
        "edit" => {
            let index = parse_index("measure", parts.next(), "usage: edit <measure>")?;
            let measure = engine.open_editor(index)?;
            Ok(Output::Text(format!("editing {}", describe_measure(index, &measure))))
        }
        "close" => {
            engine.close_editor()?;
            Ok(Output::Text("editor closed".into()))
        }
        "list" => Ok(Output::Text(list(&engine.snapshot()?))),
        "status" => Ok(Output::Text(status_line(&engine.snapshot()?))),
        "save" => {
            let path = parts.next().ok_or_else(|| anyhow!("usage: save \"file.json\""))?;
            document_io::save(&engine.document()?, &path)?;
            Ok(Output::Text(format!("saved {}", path)))
        }
        "open" => {
            let path = parts.next().ok_or_else(|| anyhow!("usage: open \"file.json\""))?;
            let document = document_io::open(&path)?;
            let count = document.measures.len();
            engine.load(document)?;
            Ok(Output::Text(format!("opened {} ({} measures)", path, count)))
        }
        "preset" => {
            const USAGE: &str = "usage: preset save|list|load|delete [name]";
            let action = parts.next().ok_or_else(|| anyhow!(USAGE))?;
            if action == "list" {
                let names = presets.list()?;
                return Ok(Output::Text(if names.is_empty() {
                    "no presets saved yet".into()
                } else {
                    names.join("\n")
                }));
            }
            let name = parts.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                bail!(USAGE);
            }
            match action.as_str() {
                "save" => {
                    presets.save(&name, &engine.document()?)?;
                    Ok(Output::Text(format!("saved preset {}", name)))
                }
                "load" => {
                    let document = presets.load(&name)?;
                    let count = document.measures.len();
                    engine.load(document)?;
                    Ok(Output::Text(format!("loaded preset {} ({} measures)", name, count)))
                }
                "delete" => {
                    presets.delete(&name)?;
                    Ok(Output::Text(format!("deleted preset {}", name)))
                }
                _ => bail!(USAGE),
            }
        }
        _ => bail!("unknown command. Try :help"),
    }
}

fn handle_meta(engine: &EngineClient, meta: &str) -> Result<Output> {
    match meta.trim() {
        "help" => Ok(Output::Text(HELP.to_string())),
        "q" | "quit" | "exit" => Ok(Output::Quit),
        "live" => Ok(Output::Text(format!(
            "live view: {}",
            if live_view_enabled() { "on" } else { "off" }
        ))),
        "live on" => {
            set_live_view(true);
            ensure_live_ticker(engine.clone());
            Ok(Output::Text("live view on".into()))
        }
        "live off" => {
            set_live_view(false);
            clear_live_region();
            Ok(Output::Text("live view off".into()))
        }
        _ => Ok(Output::Text("unknown meta command".into())),
    }
}

const HELP: &str = r#"Commands:
  :help                 Show this help
  :q / :quit            Exit
  :live                 Show whether the live playhead view is on
  :live on | off        Turn the live playhead view on or off

Transport:
  play | pause | stop   Start, pause or stop playback
  toggle                Play when stopped or paused, pause when playing
  tempo <bpm>           Set tempo (1-300; alias: bpm)
  status                Show transport state

Measures:
  add                   Append a 4-pulse measure
  remove <m>            Remove measure m
  subdiv <m> <n>        Set subdivisions of measure m (1-16)
  rotate <m> <p>        Cycle pulse p of measure m: silent > accent > strong
  edit <m>              Open measure m (highlights its pulses while playing)
  close                 Close the editor
  list                  List measures

Files:
  save "file.json"      Save tempo and measures
  open "file.json"      Load tempo and measures (stops playback)

Presets:
  preset list           List saved presets
  preset save <name>    Save tempo and measures as a preset
  preset load <name>    Load a preset (stops playback)
  preset delete <name>  Delete a preset

Pulses: ● strong  ○ accent  · silent
Chain commands with ';', e.g.  add; subdiv 2 3; play
"#;

fn parse_index(label: &str, raw: Option<String>, usage: &str) -> Result<usize> {
    let raw = raw.ok_or_else(|| anyhow!("{}", usage))?;
    let idx: usize = raw.parse().map_err(|_| anyhow!("{}", usage))?;
    if idx == 0 {
        bail!("{} numbers start at 1", label);
    }
    Ok(idx - 1)
}

fn describe_measure(index: usize, measure: &Measure) -> String {
    format!(
        "measure {} ({})  {}",
        index + 1,
        measure.subdivisions(),
        measure.pattern_glyphs()
    )
}

fn list(snap: &Snapshot) -> String {
    let listing = snap.document.list();
    match snap.editing {
        Some(e) => format!("{}\nediting measure {}", listing.trim_end(), e + 1),
        None => listing.trim_end().to_string(),
    }
}

fn status_line(snap: &Snapshot) -> String {
    let mut line = format!("{} | {}", snap.status.as_str(), snap.document.tempo);
    if snap.status != TransportStatus::Stopped {
        line.push_str(&format!(
            " | measure {} pulse {}",
            snap.position.measure + 1,
            snap.position.pulse + 1
        ));
    }
    line.push_str(&format!(" | {} measures", snap.document.measures.len()));
    if let Some(e) = snap.editing {
        line.push_str(&format!(" | editing {}", e + 1));
    }
    line
}

// --- Live playhead view ---
static LIVE_VIEW: AtomicBool = AtomicBool::new(false);

fn set_live_view(on: bool) {
    LIVE_VIEW.store(on, Ordering::SeqCst);
}

pub(crate) fn live_view_enabled() -> bool {
    LIVE_VIEW.load(Ordering::SeqCst)
}

const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

fn render_live(snap: &Snapshot, playhead: Playhead) -> Vec<String> {
    let mut lines = vec![format!("[live] {} {}", snap.status.as_str(), snap.document.tempo)];
    for (i, m) in snap.document.measures.iter().enumerate() {
        let active = playhead.measure == Some(i);
        let glyphs: Vec<String> = m
            .pattern()
            .iter()
            .enumerate()
            .map(|(p, state)| {
                if active && playhead.pulse == Some(p) {
                    format!("{}{}{}", GREEN, state.glyph(), RESET)
                } else {
                    state.glyph().to_string()
                }
            })
            .collect();
        let marker = if active { format!("{}>{}", GREEN, RESET) } else { " ".to_string() };
        lines.push(format!("{}{:>2} | {}", marker, i + 1, glyphs.join(" ")));
    }
    lines
}

static TICKER_STARTED: AtomicBool = AtomicBool::new(false);
static LAST_FRAME: once_cell::sync::Lazy<StdMutex<Option<(Playhead, TransportStatus)>>> =
    once_cell::sync::Lazy::new(|| StdMutex::new(None));
static LAST_HEIGHT: once_cell::sync::Lazy<StdMutex<usize>> =
    once_cell::sync::Lazy::new(|| StdMutex::new(0));

type PrinterFn = Box<dyn Fn(String) + Send + Sync + 'static>;
static EXTERNAL_PRINTER: once_cell::sync::Lazy<StdMutex<Option<PrinterFn>>> =
    once_cell::sync::Lazy::new(|| StdMutex::new(None));

fn set_external_printer(p: Option<PrinterFn>) {
    if let Ok(mut guard) = EXTERNAL_PRINTER.lock() {
        *guard = p;
    }
}

fn print_external(s: String) {
    match EXTERNAL_PRINTER.lock() {
        Ok(guard) => match guard.as_ref() {
            Some(f) => f(s),
            None => println!("{}", s),
        },
        Err(_) => println!("{}", s),
    }
}

/// Prints engine-thread log messages above the prompt. Info lines only show
/// with the live view on.
fn forward_console() {
    let sub = console::subscribe();
    thread::spawn(move || {
        while let Some(msg) = sub.recv() {
            if msg.level == Level::Info && !live_view_enabled() {
                continue;
            }
            print_log_line(msg.render());
        }
    });
}

/// Prints a log line above the prompt. The live region below it is left
/// behind, so the next frame is drawn fresh instead of erasing the log line.
fn print_log_line(line: String) {
    print_external(line);
    if let Ok(mut h) = LAST_HEIGHT.lock() {
        *h = 0;
    }
    if let Ok(mut last) = LAST_FRAME.lock() {
        *last = None;
    }
}

fn ensure_live_ticker(engine: EngineClient) {
    if TICKER_STARTED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return;
    }
    if let Ok(mut g) = LAST_FRAME.lock() {
        *g = None;
    }
    thread::spawn(move || {
        while live_view_enabled() {
            let playhead = engine.playhead();
            let Ok(snap) = engine.snapshot() else { break };
            let frame = (playhead, snap.status);
            let changed = match LAST_FRAME.lock() {
                Ok(mut last) => {
                    let changed = last.as_ref() != Some(&frame);
                    *last = Some(frame);
                    changed
                }
                Err(_) => false,
            };
            if changed {
                print_live_region(render_live(&snap, playhead));
            }
            thread::sleep(Duration::from_millis(50));
        }
        TICKER_STARTED.store(false, Ordering::SeqCst);
    });
}

fn print_live_region(lines: Vec<String>) {
    let mut msg = String::new();
    let Ok(mut last_h) = LAST_HEIGHT.lock() else { return };
    if *last_h > 0 {
        for _ in 0..*last_h {
            msg.push_str("\x1b[1F\x1b[2K\r");
        }
    } else {
        msg.push('\n');
    }
    msg.push_str(&lines.join("\n"));
    *last_h = lines.len();
    drop(last_h);
    print_external(msg);
}

fn clear_live_region() {
    if let Ok(mut g) = LAST_FRAME.lock() {
        *g = None;
    }
    let Ok(mut h) = LAST_HEIGHT.lock() else { return };
    if *h > 0 {
        let clear = "\x1b[1F\x1b[2K\r".repeat(*h);
        *h = 0;
        drop(h);
        print_external(clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ManualClock;
    use crate::config::EngineConfig;
    use crate::engine::{self, EngineHandle};
    use crate::model::Document;
    use crate::sequencer::Position;

    fn engine() -> EngineHandle {
        engine::spawn(EngineConfig::default(), Document::starter(), ManualClock::new).unwrap()
    }

    fn run(e: &EngineClient, line: &str) -> Result<Output> {
        handle_line(e, &PresetStore::new("unused-presets"), line)
    }

    fn text(out: Output) -> String {
        match out {
            Output::Text(t) => t,
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn measure_commands_use_one_based_indexes() {
        let e = engine();
        assert_eq!(text(run(&e, "add").unwrap()), "added measure 2");
        assert_eq!(
            text(run(&e, "subdiv 2 6").unwrap()),
            "measure 2 (6)  ●○○○○○"
        );
        assert_eq!(text(run(&e, "rotate 2 6").unwrap()), "measure 2 pulse 6: strong");
        assert_eq!(text(run(&e, "rotate 2 6").unwrap()), "measure 2 pulse 6: silent");

        let listing = text(run(&e, "list").unwrap());
        assert!(listing.contains(" 1 Measure 1 (4)  ●○○○"));
        assert!(listing.contains(" 2 Measure 2 (6)  ●○○○○·"));

        assert_eq!(text(run(&e, "remove 1").unwrap()), "removed measure 1");
        assert_eq!(e.document().unwrap().measures.len(), 1);
    }

    #[test]
    fn bad_arguments_report_usage_and_change_nothing() {
        let e = engine();
        let before = e.document().unwrap();
        let err = run(&e, "subdiv 1").unwrap_err();
        assert!(err.to_string().contains("usage: subdiv"));
        let err = run(&e, "subdiv 1 17").unwrap_err();
        assert!(err.to_string().contains("outside 1..=16"));
        let err = run(&e, "remove 0").unwrap_err();
        assert!(err.to_string().contains("start at 1"));
        let err = run(&e, "rotate 3 1").unwrap_err();
        assert_eq!(err.to_string(), "no measure 3 (sequence has 1)");
        assert!(run(&e, "frobnicate").is_err());
        assert_eq!(e.document().unwrap(), before);
    }

    #[test]
    fn tempo_reports_clamping() {
        let e = engine();
        assert_eq!(text(run(&e, "tempo 90").unwrap()), "tempo set to 90 bpm");
        assert_eq!(text(run(&e, "bpm 999").unwrap()), "tempo clamped to 300 bpm");
        assert_eq!(text(run(&e, "tempo").unwrap()), "tempo 300 bpm");
        assert!(run(&e, "tempo fast").is_err());
    }

    #[test]
    fn transport_commands_drive_the_engine() {
        let e = engine();
        assert_eq!(text(run(&e, "play").unwrap()), "playing");
        assert_eq!(text(run(&e, "play").unwrap()), "already playing");
        assert!(text(run(&e, "status").unwrap()).starts_with("playing | 120 bpm"));
        assert_eq!(text(run(&e, "toggle").unwrap()), "paused");
        assert_eq!(text(run(&e, "stop").unwrap()), "stopped");
        let snap = e.snapshot().unwrap();
        assert_eq!(snap.status, TransportStatus::Stopped);
        assert_eq!(snap.position, Position::new(0, 0));
    }

    #[test]
    fn play_without_measures_is_an_error() {
        let e = engine();
        run(&e, "remove 1").unwrap();
        let err = run(&e, "play").unwrap_err();
        assert!(err.to_string().contains("add at least one measure"));
    }

    #[test]
    fn chained_commands_run_in_order() {
        let e = engine();
        let out = text(run(&e, "add; subdiv 2 3; edit 2").unwrap());
        assert!(out.contains("added measure 2"));
        assert!(out.contains("editing measure 2 (3)"));
        assert_eq!(e.snapshot().unwrap().editing, Some(1));
        assert_eq!(text(run(&e, "close").unwrap()), "editor closed");
    }

    #[test]
    fn save_and_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beat.json");
        let path = path.to_string_lossy();

        let e = engine();
        run(&e, "tempo 75; add; subdiv 2 5").unwrap();
        let saved = e.document().unwrap();
        assert!(text(run(&e, &format!("save \"{}\"", path)).unwrap()).starts_with("saved"));

        let other = engine();
        let out = text(run(&other, &format!("open \"{}\"", path)).unwrap());
        assert!(out.ends_with("(2 measures)"));
        assert_eq!(other.document().unwrap(), saved);
    }

    #[test]
    fn presets_save_list_load_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let presets = PresetStore::new(dir.path().join("presets"));
        let e = engine();
        let preset = |line: &str| text(handle_line(&e, &presets, line).unwrap());

        assert_eq!(preset("preset list"), "no presets saved yet");
        run(&e, "tempo 100; add; subdiv 2 3").unwrap();
        assert_eq!(preset("preset save \"slow waltz\""), "saved preset slow waltz");
        let saved = e.document().unwrap();

        run(&e, "remove 2; tempo 140; play").unwrap();
        assert_eq!(preset("preset load slow waltz"), "loaded preset slow waltz (2 measures)");
        assert_eq!(e.document().unwrap(), saved);
        assert_eq!(e.snapshot().unwrap().status, TransportStatus::Stopped);

        assert_eq!(preset("preset list"), "slow waltz");
        assert_eq!(preset("preset delete slow waltz"), "deleted preset slow waltz");
        assert!(handle_line(&e, &presets, "preset load slow waltz").is_err());
        assert!(handle_line(&e, &presets, "preset save").is_err());
        assert!(handle_line(&e, &presets, "preset rename x").is_err());
    }

    #[test]
    fn quit_and_help_meta_commands() {
        let e = engine();
        assert!(matches!(run(&e, ":q").unwrap(), Output::Quit));
        assert!(text(run(&e, ":help").unwrap()).contains("subdiv <m> <n>"));
        let help = text(run(&e, ":help").unwrap());
        assert!(help.contains(":live on | off"));
        assert!(help.contains("preset save <name>"));
        assert_eq!(text(run(&e, ":live").unwrap()), "live view: off");
        assert_eq!(text(run(&e, ":nope").unwrap()), "unknown meta command");
    }

    #[test]
    fn log_lines_detach_the_live_region() {
        *LAST_HEIGHT.lock().unwrap() = 3;
        *LAST_FRAME.lock().unwrap() = Some((Playhead::default(), TransportStatus::Playing));
        print_log_line("click 440Hz at 0.100s".into());
        assert_eq!(*LAST_HEIGHT.lock().unwrap(), 0);
        assert!(LAST_FRAME.lock().unwrap().is_none());
    }

    #[test]
    fn live_view_highlights_the_playhead() {
        let snap = Snapshot {
            document: Document::starter(),
            status: TransportStatus::Playing,
            position: Position::new(0, 1),
            editing: Some(0),
        };
        let lines = render_live(&snap, Playhead { measure: Some(0), pulse: Some(1) });
        assert_eq!(lines[0], "[live] playing 120 bpm");
        assert!(lines[1].contains("\x1b[32m○\x1b[0m"));
        assert!(lines[1].starts_with("\x1b[32m>"));

        let idle = render_live(&snap, Playhead::default());
        assert_eq!(idle[1], "  1 | ● ○ ○ ○");
    }
}
