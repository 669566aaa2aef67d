//! TetherDrive console - drive a Create 2 from the terminal
//!
//! Each stdin line is one event:
//!
//! - `<key>` or `+<key>`: key down
//! - `-<key>`: key up (motion keys return their axis to neutral)
//! - `show`, `status`, `help`
//! - `connect [port]`, `disconnect`
//!
//! Ctrl-C or the quit key tears the session down.

use std::env;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tether_drive::{AppConfig, Error, KeyOutcome, LogicalKey, Result, TeleopSession};

/// Config file picked up from the working directory when none is given
const DEFAULT_CONFIG: &str = "tether.toml";

/// How often the input loop checks the shutdown flag
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<String>,
    port: Option<String>,
}

/// Parse `--config|-c <path>` and `--port|-p <port>`
fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let slot = match arg.as_str() {
            "--config" | "-c" => &mut parsed.config,
            "--port" | "-p" => &mut parsed.port,
            other => return Err(Error::Config(format!("Unknown argument: {}", other))),
        };
        match args.next() {
            Some(value) => *slot = Some(value),
            None => return Err(Error::Config(format!("{} needs a value", arg))),
        }
    }

    Ok(parsed)
}

/// One line of console input
#[derive(Debug, PartialEq)]
enum ConsoleCommand {
    Press(LogicalKey),
    Release(LogicalKey),
    Show,
    Status,
    Help,
    Connect(Option<String>),
    Disconnect,
}

fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(None);
    };

    let command = match first {
        "show" => ConsoleCommand::Show,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "connect" => ConsoleCommand::Connect(words.next().map(str::to_string)),
        "disconnect" => ConsoleCommand::Disconnect,
        _ => {
            if let Some(key) = first.strip_prefix('-') {
                ConsoleCommand::Release(key.parse()?)
            } else {
                ConsoleCommand::Press(first.trim_start_matches('+').parse()?)
            }
        }
    };

    Ok(Some(command))
}

fn help_text() -> String {
    let mut text = String::from("Keys (prefix '+' for down, '-' for up):\n");
    for key in LogicalKey::ALL {
        text.push_str(&format!("  {:<8} {}\n", key.binding(), key.description()));
    }
    text.push_str(
        "Commands:\n  show     latest telemetry\n  status   session state\n  connect [port]\n  disconnect\n  help",
    );
    text
}

fn load_config(path: Option<&str>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path),
        None if Path::new(DEFAULT_CONFIG).exists() => AppConfig::from_file(DEFAULT_CONFIG),
        None => Ok(AppConfig::default()),
    }
}

/// Execute one console command; returns `false` once the session has quit
fn dispatch(session: &TeleopSession, config: &AppConfig, command: ConsoleCommand) -> Result<bool> {
    match command {
        ConsoleCommand::Press(key) => return Ok(report(session.on_key_down(key)?)),
        ConsoleCommand::Release(key) => return Ok(report(session.on_key_up(key)?)),
        ConsoleCommand::Show => match session.latest_telemetry() {
            Some(snapshot) => println!(
                "#{} ({} ms ago)\n{}",
                snapshot.sequence,
                snapshot.captured_at.elapsed().as_millis(),
                snapshot.rendered
            ),
            None => println!("no telemetry yet"),
        },
        ConsoleCommand::Status => println!(
            "{} (poll failures: {})",
            session.status(),
            session.poll_failures()
        ),
        ConsoleCommand::Help => println!("{}", help_text()),
        ConsoleCommand::Connect(port) => {
            let port = port.as_deref().unwrap_or(config.serial.port.as_str());
            session.connect(port)?;
            println!("connected to {}", port);
        }
        ConsoleCommand::Disconnect => {
            session.disconnect()?;
            println!("disconnected");
        }
    }
    Ok(true)
}

/// Print a key outcome; `Quit` is reported through the return value
fn report(outcome: KeyOutcome) -> bool {
    match outcome {
        KeyOutcome::Sent => println!("ok"),
        KeyOutcome::Drive(cmd) => println!("drive left={} right={}", cmd.left, cmd.right),
        KeyOutcome::Telemetry(snapshot) => println!("{}", snapshot.rendered),
        KeyOutcome::Polling(on) => println!("polling {}", if on { "on" } else { "off" }),
        KeyOutcome::Quit => return false,
        KeyOutcome::Ignored => {}
    }
    true
}

fn main() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let config = load_config(args.config.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("TetherDrive v{} starting...", env!("CARGO_PKG_VERSION"));

    let session = TeleopSession::new(&config)?;

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let port = args.port.as_deref().unwrap_or(config.serial.port.as_str());
    if let Err(e) = session.connect(port) {
        eprintln!("error: couldn't connect to {}: {}", port, e);
        eprintln!("use 'connect <port>' to retry");
    }
    println!("{}", help_text());

    // stdin blocks, so read it on its own thread and poll the channel
    let (tx, rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| Error::Other(format!("Failed to spawn input thread: {}", e)))?;

    while running.load(Ordering::Relaxed) {
        let line = match rx.recv_timeout(INPUT_POLL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("error: {}", e);
                continue;
            }
        };

        match dispatch(&session, &config, command) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                eprintln!("error: {}", e);
                if e.is_io() {
                    eprintln!("link error; try 'disconnect' then 'connect'");
                }
            }
        }
    }

    session.shutdown();
    log::info!("TetherDrive stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(args(&[]).unwrap(), Args::default());

        let parsed = args(&["-c", "robot.toml", "--port", "/dev/ttyACM0"]).unwrap();
        assert_eq!(parsed.config.as_deref(), Some("robot.toml"));
        assert_eq!(parsed.port.as_deref(), Some("/dev/ttyACM0"));

        assert!(args(&["--port"]).is_err());
        assert!(args(&["--verbose"]).is_err());
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(
            parse_line("up").unwrap(),
            Some(ConsoleCommand::Press(LogicalKey::Forward))
        );
        assert_eq!(
            parse_line("+left").unwrap(),
            Some(ConsoleCommand::Press(LogicalKey::Left))
        );
        assert_eq!(
            parse_line("-left").unwrap(),
            Some(ConsoleCommand::Release(LogicalKey::Left))
        );
        assert_eq!(parse_line(" show ").unwrap(), Some(ConsoleCommand::Show));
        assert_eq!(
            parse_line("connect COM3").unwrap(),
            Some(ConsoleCommand::Connect(Some("COM3".to_string())))
        );
        assert_eq!(
            parse_line("connect").unwrap(),
            Some(ConsoleCommand::Connect(None))
        );
        assert!(parse_line("+nope").is_err());
    }

    #[test]
    fn test_help_lists_every_key() {
        let text = help_text();
        for key in LogicalKey::ALL {
            assert!(text.contains(key.description()));
        }
    }
}
