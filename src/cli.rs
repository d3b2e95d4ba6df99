use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use pico_args::Arguments;
use std::{
    path::PathBuf,
    sync::{Arc, atomic::AtomicBool},
};

use crate::actions::{Launcher, PrintLauncher, ShellLauncher};
use crate::config::Settings;
use crate::input::{EvdevSource, PointerSource, ReplaySource};
use crate::library::{JsonFileStore, LibraryStore};
use crate::pipeline::{LoopTiming, Outcome, Pipeline};
use crate::session::{LEARN_REPETITIONS, Session};

pub fn run() -> Result<()> {
    let inv = parse(Arguments::from_env())?;
    let library = inv.library;

    match inv.command {
        Command::Run => {
            let settings = Settings::load_or_install_default()?;
            let mut store = open_store(&settings, library)?;
            let lib = store.load()?;
            if lib.is_empty() {
                warn!("no gestures registered; use `sigilctl learn <command>` first");
            }
            info!("loaded {} gesture(s) from {}", lib.len(), store.path().display());
            let mut session = Session::run(lib);
            drive(&settings, &inv.session, &mut store, &mut session)
        }

        Command::Learn(command) => {
            let settings = Settings::load_or_install_default()?;
            let mut store = open_store(&settings, library)?;
            // fail on a malformed library before any drawing happens
            let lib = store.load()?;
            if let Some(existing) = lib.get(&command) {
                warn!(
                    "'{command}' already has a gesture ({} templates); it will be replaced",
                    existing.templates.len()
                );
            }
            let mut session = Session::learn(command.as_str())?;
            info!("learn mode: draw the gesture {LEARN_REPETITIONS} times for command '{command}'");
            drive(&settings, &inv.session, &mut store, &mut session)
        }

        Command::List => {
            let settings = Settings::load_or_install_default()?;
            let store = open_store(&settings, library)?;
            let lib = store.load()?;
            if inv.json {
                let v: Vec<_> = lib
                    .iter()
                    .map(|g| serde_json::json!({"command": g.command, "templates": g.templates.len()}))
                    .collect();
                print_response(&serde_json::Value::from(v));
            } else if lib.is_empty() {
                println!("No gestures registered");
            } else {
                println!("Registered gestures:");
                for g in lib.iter() {
                    println!("   {}", g.command);
                }
            }
            Ok(())
        }

        Command::Remove(command) => {
            let settings = Settings::load_or_install_default()?;
            let mut store = open_store(&settings, library)?;
            let mut lib = store.load()?;
            lib.remove(&command)?;
            store.save(&lib)?;
            println!("Removed gesture: {command}");
            Ok(())
        }

        Command::Doctor => {
            let settings = Settings::load_or_install_default()?;
            print_response(&settings.doctor_report());
            Ok(())
        }

        Command::Help(Some(topic)) => {
            print_subcmd_help(&topic);
            Ok(())
        }
        Command::Help(None) => {
            print_help();
            Ok(())
        }
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Run,
    Learn(String),
    List,
    Remove(String),
    Doctor,
    Help(Option<String>),
}

#[derive(Debug, PartialEq)]
struct Invocation {
    command: Command,
    library: Option<PathBuf>,
    session: SessionOpts,
    json: bool,
}

/// Options are pulled off before the subcommand so that flags may come first.
fn parse(mut pargs: Arguments) -> Result<Invocation> {
    let help = pargs.contains("-h") || pargs.contains("--help");
    let library: Option<PathBuf> = pargs.opt_value_from_str("--library")?;
    let session = SessionOpts::from_args(&mut pargs)?;
    let json = pargs.contains("--json");
    if help {
        return Ok(Invocation {
            command: Command::Help(None),
            library,
            session,
            json,
        });
    }

    // First free arg is the subcommand; none means `run`
    let subcmd: Option<String> = pargs.opt_free_from_str()?;
    let command = match subcmd.as_deref() {
        None | Some("run") => Command::Run,
        Some("learn") => Command::Learn(
            pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: sigilctl learn <command>"))?,
        ),
        Some("list") => Command::List,
        Some("remove") => Command::Remove(
            pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: sigilctl remove <command>"))?,
        ),
        Some("doctor") => Command::Doctor,
        Some("help") => Command::Help(pargs.opt_free_from_str()?),
        Some(other) => {
            return Err(anyhow!(
                "unknown subcommand: {other} (see `sigilctl help`)"
            ));
        }
    };
    finish(pargs)?;

    let takes_session = matches!(command, Command::Run | Command::Learn(_));
    if !takes_session && (session.replay.is_some() || session.dry_run) {
        return Err(anyhow!("--replay and --dry-run only apply to run and learn"));
    }
    if json && command != Command::List {
        return Err(anyhow!("--json only applies to list"));
    }

    Ok(Invocation {
        command,
        library,
        session,
        json,
    })
}

#[derive(Debug, Default, PartialEq)]
struct SessionOpts {
    replay: Option<PathBuf>,
    dry_run: bool,
}

impl SessionOpts {
    fn from_args(pargs: &mut Arguments) -> Result<Self> {
        Ok(Self {
            replay: pargs.opt_value_from_str("--replay")?,
            dry_run: pargs.contains("--dry-run"),
        })
    }
}

fn finish(pargs: Arguments) -> Result<()> {
    let rest = pargs.finish();
    if !rest.is_empty() {
        return Err(anyhow!("unknown arguments: {rest:?}"));
    }
    Ok(())
}

fn open_store(settings: &Settings, override_path: Option<PathBuf>) -> Result<JsonFileStore> {
    let path = match override_path {
        Some(p) => p,
        None => settings.library_path()?,
    };
    Ok(JsonFileStore::new(path))
}

fn drive(
    settings: &Settings,
    opts: &SessionOpts,
    store: &mut JsonFileStore,
    session: &mut Session,
) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(&cancel))
            .context("failed to install signal handler")?;
    }

    let mut source: Box<dyn PointerSource> = match &opts.replay {
        Some(path) => {
            let replay = ReplaySource::open(path)?;
            info!("replaying {} frame(s) from {}", replay.len(), path.display());
            Box::new(replay)
        }
        None => Box::new(EvdevSource::open(&settings.input)?),
    };
    let mut launcher: Box<dyn Launcher> = if opts.dry_run {
        Box::new(PrintLauncher)
    } else {
        Box::new(ShellLauncher)
    };

    let outcome = Pipeline {
        source: source.as_mut(),
        store,
        launcher: launcher.as_mut(),
        cancel: &cancel,
        timing: LoopTiming {
            poll_interval: settings.poll_interval(),
            exit_grace: settings.exit_grace(),
        },
    }
    .run(session)?;

    match outcome {
        Outcome::Matched(command) => info!("done: ran '{command}'"),
        Outcome::Learned(command) => {
            println!("Gesture saved for command: {command}");
        }
        Outcome::Cancelled => info!("cancelled"),
        Outcome::InputClosed => {
            if let Some((captured, required)) = session.learn_progress() {
                return Err(anyhow!(
                    "input ended after {captured}/{required} repetitions; nothing saved"
                ));
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"sigilctl: draw a gesture, run a command

USAGE:
  sigilctl [run] [--replay FILE] [--dry-run]      Recognize one gesture and run its command
  sigilctl learn <command> [--replay FILE]        Draw a gesture 3 times to bind it to <command>
  sigilctl list [--json]                          List registered gestures
  sigilctl remove <command>                       Remove the gesture bound to <command>
  sigilctl doctor                                 Diagnose input permissions and paths
  sigilctl help [command]                         Show general or command-specific help

GLOBAL OPTIONS:
  --library FILE                                  Use FILE instead of the configured gesture library

TIPS:
  - Settings: ~/.config/sigilctl/config.toml
  - Gestures: ~/.config/sigilctl/gestures.json
  - Press Escape or Ctrl+C to cancel a session
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: sigilctl [run] [--replay FILE] [--dry-run]\nWaits for one stroke, runs the best matching command and exits.\nStrokes that match nothing are ignored."
        ),
        "learn" => println!(
            "usage: sigilctl learn <command> [--replay FILE]\nCaptures the gesture three times, then saves it, replacing any gesture already bound to <command>."
        ),
        "list" => println!("usage: sigilctl list [--json]\nLists the commands that have a gesture."),
        "remove" => println!("usage: sigilctl remove <command>\nDeletes the gesture bound to <command>."),
        "doctor" => println!(
            "usage: sigilctl doctor\nReports detected pointer devices, input group membership and file locations."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
