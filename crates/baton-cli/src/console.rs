//! Operator console
//!
//! One line-oriented reader on stdin for the life of the process. It
//! relays commands to the supervisor instead of touching cycle state
//! itself; cycles and their channels come and go across restarts while
//! stdin does not.
//!
//! - `l` opens a trigger-learn session
//! - `r` restarts the current cycle (tear down, reconnect everything)
//! - `s` stops the program
//!
//! EOF behaves like `s`: with stdin closed there is no operator left.

use std::io::{self, BufRead, Write};
use std::thread;

use flume::{Receiver, Sender};

/// Operator commands, one per input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Learn,
    Restart,
    Stop,
}

/// Map one input line to a command.
pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_lowercase().as_str() {
        "l" | "learn" => Some(Command::Learn),
        "r" | "restart" => Some(Command::Restart),
        "s" | "stop" | "q" | "quit" => Some(Command::Stop),
        _ => None,
    }
}

/// Spawn the console reader. Returns the supervisor's ends: commands out,
/// reply lines in. The thread exits on stop, EOF, or when the supervisor
/// drops its ends; it is never joined.
pub fn spawn_console() -> (Receiver<Command>, Sender<String>) {
    let (command_tx, command_rx) = flume::bounded(4);
    let (reply_tx, reply_rx) = flume::bounded(1);

    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || run(&command_tx, &reply_rx))
        .expect("Failed to spawn console thread");

    (command_rx, reply_tx)
}

fn run(commands: &Sender<Command>, replies: &Receiver<String>) {
    println!("Commands: [l]earn trigger, [r]estart, [s]top");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        prompt();
        let Some(line) = lines.next() else {
            log::info!("Console input closed, stopping");
            let _ = commands.send(Command::Stop);
            return;
        };
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("Console read failed: {}", e);
                let _ = commands.send(Command::Stop);
                return;
            }
        };

        match parse_command(&line) {
            Some(command) => {
                if commands.send(command).is_err() {
                    return;
                }
                match command {
                    Command::Learn => {
                        // The supervisor runs the session; block here so
                        // the prompt comes back only when it is done.
                        match replies.recv() {
                            Ok(reply) => println!("{}", reply),
                            Err(_) => return,
                        }
                    }
                    Command::Restart => println!("Restarting."),
                    Command::Stop => {
                        println!("Stopping.");
                        return;
                    }
                }
            }
            None => {
                if !line.trim().is_empty() {
                    println!(
                        "Unknown command '{}'. Commands: [l]earn, [r]estart, [s]top",
                        line.trim()
                    );
                }
            }
        }
    }
}

fn prompt() {
    print!("baton> ");
    let _ = io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_letters_and_words_parse() {
        assert_eq!(parse_command("l"), Some(Command::Learn));
        assert_eq!(parse_command("learn"), Some(Command::Learn));
        assert_eq!(parse_command("r"), Some(Command::Restart));
        assert_eq!(parse_command("s"), Some(Command::Stop));
        assert_eq!(parse_command("quit"), Some(Command::Stop));
    }

    #[test]
    fn test_case_and_whitespace_are_forgiven() {
        assert_eq!(parse_command("  L  "), Some(Command::Learn));
        assert_eq!(parse_command("STOP"), Some(Command::Stop));
    }

    #[test]
    fn test_unknown_input_is_not_a_command() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("x"), None);
        assert_eq!(parse_command("lr"), None);
    }
}
