//! Masked terminal input for secrets.
//!
//! Input is read in raw mode so nothing the operator types is echoed; each
//! character is shown as `*`. Ctrl+C, Esc and Ctrl+D abort with
//! `io::ErrorKind::Interrupted`. Prompts go to stderr so stdout stays usable
//! for machine-readable output.

use std::io::{self, IsTerminal, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{execute, style::Print, terminal};
use zeroize::Zeroizing;

/// Source of operator-entered secrets
pub trait SecretPrompt {
    /// Whether an operator can be asked at all
    fn is_available(&self) -> bool;

    /// Read one masked line. Returns `ErrorKind::Interrupted` on abort.
    fn read_secret(&mut self, prompt: &str) -> io::Result<Zeroizing<String>>;

    /// Show a non-secret message (rejection reasons, mismatches)
    fn notice(&mut self, message: &str);
}

/// Restores cooked mode even when reading fails
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Prompts on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }
}

impl SecretPrompt for TerminalPrompt {
    fn is_available(&self) -> bool {
        io::stdin().is_terminal() && io::stderr().is_terminal()
    }

    fn read_secret(&mut self, prompt: &str) -> io::Result<Zeroizing<String>> {
        let mut stderr = io::stderr();
        write!(stderr, "{}: ", prompt)?;
        stderr.flush()?;

        let result = {
            let _raw = RawModeGuard::enable()?;
            read_masked_line()
        };

        writeln!(stderr)?;
        result
    }

    fn notice(&mut self, message: &str) {
        eprintln!("  {}", message);
    }
}

fn read_masked_line() -> io::Result<Zeroizing<String>> {
    // Preallocated so typical input never reallocates and strands a copy
    let mut input = Zeroizing::new(String::with_capacity(256));
    let mut stderr = io::stderr();

    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }

        match code {
            KeyCode::Enter => break,
            KeyCode::Esc => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "Esc"));
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "Ctrl-C"));
            }
            KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) && input.is_empty() => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "Ctrl-D"));
            }
            KeyCode::Backspace => {
                if input.pop().is_some() {
                    execute!(stderr, Print("\x08 \x08"))?;
                }
            }
            KeyCode::Char(c) => {
                input.push(c);
                execute!(stderr, Print('*'))?;
            }
            _ => {}
        }
    }

    Ok(input)
}
