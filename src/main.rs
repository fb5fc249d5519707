//! Gate-keeper demo: an interactive prompt driving a two-state turnstile.
//!
//! # Usage
//!
//! ```text
//! statewire [key=value ...] [config.toml]
//! ```
//!
//! Type `coin` or `pass` at the prompt. `help` prints the table. Anything the
//! gate does not react to, an empty line or end of input ends the session.
//!
//! # Configuration
//!
//! `key=value` arguments are parsed by [`Config::from_map`]; a trailing
//! argument ending in `.toml` is read with [`Config::from_file`] first and the
//! pairs override it.
//!
//! ```text
//! statewire debug=1 trace_level=info
//! ```

#![allow(clippy::multiple_crate_versions)]

use statewire::{Binder, BoxError, Config, Dispatcher, Handler, Rule, State};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

const LOCKED: &str = "Locked";
const UNLOCKED: &str = "Unlocked";

type Gate = Dispatcher<(), String>;

fn say(message: &'static str) -> Handler<(), String> {
    Handler::new(move |_: &()| Ok(message.to_string())).named(message)
}

fn gate_table() -> Vec<(&'static str, Vec<(&'static str, Rule<(), String>)>)> {
    vec![
        (
            LOCKED,
            vec![
                ("coin", Rule::to(UNLOCKED, say("Gate is unlocked"))),
                ("pass", Rule::to(LOCKED, say("Wait! Insert a coin first"))),
            ],
        ),
        (
            UNLOCKED,
            vec![
                ("coin", Rule::to(UNLOCKED, say("Thanks!"))),
                ("pass", Rule::to(LOCKED, say("Gate is locked"))),
            ],
        ),
    ]
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Config, BoxError> {
    let mut file = None;
    let mut pairs = BTreeMap::new();

    for arg in args {
        if let Some((key, value)) = arg.split_once('=') {
            pairs.insert(key.to_string(), value.to_string());
        } else if arg.ends_with(".toml") {
            file = Some(arg);
        } else {
            return Err(format!("unexpected argument {arg:?}, expected key=value or a .toml file").into());
        }
    }

    let mut config = match file {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let overrides = Config::from_map(&pairs)?;
    for key in pairs.keys() {
        match key.as_str() {
            "default_state" => config.default_state.clone_from(&overrides.default_state),
            "debug" => config.debug = overrides.debug,
            "fallback_to_default" => config.fallback_to_default = overrides.fallback_to_default,
            "dump_file" => config.dump_file.clone_from(&overrides.dump_file),
            "trace_level" => config.trace_level.clone_from(&overrides.trace_level),
            _ => {}
        }
    }
    if config.default_state.is_none() {
        config.default_state = Some(LOCKED.to_string());
    }
    Ok(config)
}

fn run() -> Result<(), BoxError> {
    let config = parse_args(std::env::args().skip(1))?;
    let gate: Gate = statewire::initialize(gate_table(), &config)?;

    gate.bind_any(
        "help",
        Rule::stay(Handler::with_dispatcher(|gate: &Gate, _: &()| Ok(gate.to_string())).named("help")),
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut lines = stdin.lock().lines();

    loop {
        let state = gate.current_state().map_or_else(|| "?".to_string(), |s: State| s.to_string());
        write!(stdout, "[{state}] > ")?;
        stdout.flush()?;

        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let event = line.trim();
        if event.is_empty() {
            break;
        }

        match gate.fire(event)? {
            Some(message) => println!("\t{message}"),
            None => break,
        }
    }

    println!("Au revoir!");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "gate keeper stopped");
            eprintln!("statewire: {e}");
            ExitCode::FAILURE
        }
    }
}
