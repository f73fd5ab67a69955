// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Console front end. One thread owns stdin: an `exit` line is forwarded as
// an exit request, every other line is an answer for the prompter.

use std::io::{BufRead, Write};
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, Sender, channel};

use postwerk_core::RunChoice;
use postwerk_watch::Prompter;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

const EXIT_COMMAND: &str = "exit";

/// Start reading stdin. The receiver yields once when `exit` is typed.
pub fn attach() -> (ConsolePrompter, UnboundedReceiver<()>) {
    let (answers_tx, answers_rx) = channel();
    let (exit_tx, exit_rx) = unbounded_channel();
    std::thread::spawn(move || read_lines(std::io::stdin().lock(), answers_tx, exit_tx));
    (ConsolePrompter::new(answers_rx), exit_rx)
}

fn read_lines(input: impl BufRead, answers: Sender<String>, exit: UnboundedSender<()>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "Console input failed");
                break;
            }
        };
        if is_exit(&line) {
            let _ = exit.send(());
            break;
        }
        if answers.send(line).is_err() {
            break;
        }
    }
    debug!("Console input closed");
}

pub fn is_exit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(EXIT_COMMAND)
}

/// `1` ignore, `2` create, `3` create & print (only when offered).
pub fn parse_choice(line: &str, print_available: bool) -> Option<RunChoice> {
    match line.trim() {
        "1" => Some(RunChoice::Ignore),
        "2" => Some(RunChoice::Create),
        "3" if print_available => Some(RunChoice::CreateAndPrint),
        _ => None,
    }
}

pub fn menu(file_name: &str, print_available: bool) -> String {
    let mut menu = format!("Found {file_name}\n1. Ignore\n2. Create\n");
    if print_available {
        menu.push_str("3. Create & Print\n");
    }
    menu
}

/// Asks on stdout and waits for an answer line from the stdin thread.
pub struct ConsolePrompter {
    answers: Mutex<Receiver<String>>,
}

impl ConsolePrompter {
    pub fn new(answers: Receiver<String>) -> Self {
        Self {
            answers: Mutex::new(answers),
        }
    }
}

impl Prompter for ConsolePrompter {
    fn ask(&self, file_name: &str, print_available: bool) -> RunChoice {
        let Ok(answers) = self.answers.lock() else {
            return RunChoice::Ignore;
        };
        loop {
            print!("{}> ", menu(file_name, print_available));
            let _ = std::io::stdout().flush();
            match answers.recv() {
                Ok(line) => match parse_choice(&line, print_available) {
                    Some(choice) => return choice,
                    None => println!("Please answer with one of the numbers shown."),
                },
                // Input closed: nobody can answer any more.
                Err(_) => return RunChoice::Ignore,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_by_number() {
        assert_eq!(parse_choice(" 1 ", true), Some(RunChoice::Ignore));
        assert_eq!(parse_choice("2", false), Some(RunChoice::Create));
        assert_eq!(parse_choice("3", true), Some(RunChoice::CreateAndPrint));
        assert_eq!(parse_choice("3", false), None);
        assert_eq!(parse_choice("yes", true), None);
    }

    #[test]
    fn print_entry_only_when_offered() {
        assert!(menu("order-1.pdf", true).contains("3. Create & Print"));
        assert!(!menu("order-1.pdf", false).contains("3."));
    }

    #[test]
    fn exit_is_case_insensitive() {
        assert!(is_exit("exit"));
        assert!(is_exit("  EXIT\r"));
        assert!(!is_exit("exit now"));
    }

    #[test]
    fn lines_before_exit_become_answers() {
        let (answers_tx, answers_rx) = channel();
        let (exit_tx, mut exit_rx) = unbounded_channel();
        let input = std::io::Cursor::new("x\n2\nExit\n1\n");
        read_lines(input, answers_tx, exit_tx);

        assert_eq!(answers_rx.try_iter().collect::<Vec<_>>(), vec!["x", "2"]);
        assert_eq!(exit_rx.try_recv(), Ok(()));
    }

    #[test]
    fn prompter_skips_invalid_answers() {
        let (tx, rx) = channel();
        tx.send("9".to_string()).expect("send");
        tx.send("2".to_string()).expect("send");
        let prompter = ConsolePrompter::new(rx);
        assert_eq!(prompter.ask("order-1.pdf", false), RunChoice::Create);
        drop(tx);
        assert_eq!(prompter.ask("order-2.pdf", false), RunChoice::Ignore);
    }
}
