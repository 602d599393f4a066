//! User actions typed on stdin
//!
//! | Input | Action |
//! |-------|--------|
//! | `connect <N>` / `c <N>` | send host N's label as a connect command |
//! | `send <TEXT>` | send raw command text |
//! | `launch` | (re)start the worker |
//! | `stop` | close the worker |
//! | `console on\|off` | toggle worker console and relaunch |
//! | `hosts` | list discovered hosts |
//! | `status` | show indicators |
//! | `help` | list commands |
//! | `quit` / `q` | exit |

use std::io::BufRead;
use std::str::FromStr;
use std::thread;

use crossbeam_channel::{bounded, Receiver};

/// Capacity of the stdin action queue
const ACTION_QUEUE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Connect(usize),
    Send(String),
    Launch,
    Stop,
    Console(bool),
    Hosts,
    Status,
    Help,
    Quit,
}

pub const HELP: &[&str] = &[
    "connect <N>     connect to host N",
    "send <TEXT>     write raw command text",
    "launch          (re)start the worker",
    "stop            close the worker",
    "console on|off  toggle worker console and relaunch",
    "hosts           list discovered hosts",
    "status          show indicators",
    "help            show this list",
    "quit            exit",
];

impl FromStr for Action {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match (word.to_lowercase().as_str(), rest) {
            ("connect" | "c", index) => index
                .parse()
                .map(Action::Connect)
                .map_err(|_| format!("expected a host number, got {:?}", index)),
            ("send", "") => Err("send needs command text".to_string()),
            ("send", text) => Ok(Action::Send(text.to_string())),
            ("launch" | "relaunch", "") => Ok(Action::Launch),
            ("stop", "") => Ok(Action::Stop),
            ("console", "on") => Ok(Action::Console(true)),
            ("console", "off") => Ok(Action::Console(false)),
            ("console", other) => Err(format!("expected on or off, got {:?}", other)),
            ("hosts", "") => Ok(Action::Hosts),
            ("status", "") => Ok(Action::Status),
            ("help" | "?", "") => Ok(Action::Help),
            ("quit" | "q" | "exit", "") => Ok(Action::Quit),
            _ => Err(format!("unknown command {:?} (try `help`)", line)),
        }
    }
}

/// Read actions from stdin on a background thread.
///
/// The thread ends at end of input or once the receiver is dropped.
pub fn spawn_stdin_reader() -> Receiver<Action> {
    let (tx, rx) = bounded(ACTION_QUEUE);

    let spawned = thread::Builder::new()
        .name("relay-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!("stdin read failed: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Action>() {
                    Ok(action) => {
                        if tx.send(action).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("{}", e),
                }
            }
            log::debug!("stdin closed");
        });

    if let Err(e) = spawned {
        log::error!("Failed to start stdin reader: {}", e);
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_actions() {
        assert_eq!("connect 2".parse::<Action>(), Ok(Action::Connect(2)));
        assert_eq!("  c   0 ".parse::<Action>(), Ok(Action::Connect(0)));
        assert_eq!(
            "send g1:box Running... game".parse::<Action>(),
            Ok(Action::Send("g1:box Running... game".into()))
        );
        assert_eq!("LAUNCH".parse::<Action>(), Ok(Action::Launch));
        assert_eq!("console off".parse::<Action>(), Ok(Action::Console(false)));
        assert_eq!("q".parse::<Action>(), Ok(Action::Quit));
    }

    #[test]
    fn help_lists_every_command() {
        let words = [
            "connect", "send", "launch", "stop", "console", "hosts", "status", "help", "quit",
        ];
        for word in words {
            assert!(
                HELP.iter().any(|line| line.starts_with(word)),
                "{word} missing from help"
            );
        }
        assert_eq!(HELP.len(), words.len());
    }

    #[test]
    fn rejects_bad_input() {
        for line in ["connect", "connect x", "send", "console maybe", "dance", "stop now"] {
            assert!(line.parse::<Action>().is_err(), "accepted {line:?}");
        }
    }
}
