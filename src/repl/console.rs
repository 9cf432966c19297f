//! Raw-mode line editor and the REPL's dispatch loop: reads one line,
//! hands it to the statement parser, and drives the table accordingly.
use std::io::{stdout, Write};
use std::path::Path;

use crossterm::event::{read, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use super::history;
use super::statement::{self, Statement};
use crate::errors::Error;
use crate::storage::table::Table;

const PROMPT: &str = "db> ";
const HISTORY_FILE: &str = ".bplustore_history";

pub fn start(db_path: &Path) -> Result<(), Error> {
    let mut table = Table::open(db_path)?;
    let history_path = history::get_home_file(HISTORY_FILE.to_string());
    history::ensure_history_file(&history_path)?;
    let mut lines = history::load_history(&history_path);

    println!("bplustore shell. Type .help for commands, .exit to quit.");

    loop {
        let line = match read_line(PROMPT, &lines)? {
            Some(line) => line,
            None => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        lines.push(line.clone());
        history::append_history(&line, &history_path)?;

        match statement::parse(&line) {
            Ok(Statement::Exit) => break,
            Ok(Statement::Help) => print_help(),
            Ok(Statement::Tree) => match table.describe_tree() {
                Ok(dump) => print!("{dump}"),
                Err(e) => println!("Error: {e}"),
            },
            Ok(Statement::Select) => match table.scan() {
                Ok(rows) => {
                    for row in rows {
                        println!("({}, {}, {})", row.id, row.username, row.email);
                    }
                }
                Err(e) => println!("Error: {e}"),
            },
            Ok(Statement::Insert { id, username, email }) => {
                let outcome = statement::record_for(id, &username, &email).and_then(|record| table.insert(id, &record));
                match outcome {
                    Ok(()) => println!("Executed."),
                    Err(e) => println!("Error: {e}"),
                }
            }
            Err(e) => println!("Error: {e}"),
        }
    }

    table.close()
}

fn print_help() {
    println!(
        "Commands:\n  insert <id> <username> <email>\n  select\n  .help\n  .tree\n  .exit / .quit"
    );
}

/// Reads one line in raw mode: printable characters echo immediately,
/// backspace erases the last character, up/down walk history, Ctrl-C and
/// Ctrl-D both signal end-of-input (`Ok(None)`).
fn read_line(prompt: &str, history: &[String]) -> Result<Option<String>, Error> {
    enable_raw_mode()?;
    let outcome = read_line_inner(prompt, history);
    disable_raw_mode()?;
    outcome
}

fn read_line_inner(prompt: &str, history: &[String]) -> Result<Option<String>, Error> {
    let mut buf = String::new();
    let mut history_cursor = history.len();

    print!("{prompt}");
    stdout().flush()?;

    loop {
        let Event::Key(key) = read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Enter => {
                print!("\r\n");
                stdout().flush()?;
                return Ok(Some(buf));
            }
            KeyCode::Char('c') | KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                print!("\r\n");
                stdout().flush()?;
                return Ok(None);
            }
            KeyCode::Char(c) => {
                buf.push(c);
                print!("{c}");
                stdout().flush()?;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    print!("\u{8} \u{8}");
                    stdout().flush()?;
                }
            }
            KeyCode::Up => {
                if history_cursor > 0 {
                    history_cursor -= 1;
                    redraw(prompt, &mut buf, &history[history_cursor])?;
                }
            }
            KeyCode::Down => {
                if history_cursor < history.len() {
                    history_cursor += 1;
                    let replacement = history.get(history_cursor).cloned().unwrap_or_default();
                    redraw(prompt, &mut buf, &replacement)?;
                }
            }
            _ => {}
        }
    }
}

fn redraw(prompt: &str, buf: &mut String, replacement: &str) -> Result<(), Error> {
    print!("\r{}\r", " ".repeat(prompt.len() + buf.len()));
    print!("{prompt}{replacement}");
    stdout().flush()?;
    *buf = replacement.to_string();
    Ok(())
}
