use crate::messages::UserCommand;
use crate::session::{ControlSurface, PlayLabel, RecordLabel};
use anyhow::{Context, Result};
use std::io::BufRead;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Button<L> {
    label: L,
    enabled: bool,
}

impl<L: std::fmt::Display> Button<L> {
    fn render(&self, key: char) -> String {
        if self.enabled {
            format!("[{}] {}", key, self.label)
        } else {
            format!("[{}] {} (disabled)", key, self.label)
        }
    }
}

/// Draws the Record and Play buttons as one line on stdout
pub struct TerminalSurface {
    record: Button<RecordLabel>,
    play: Button<PlayLabel>,
    last_rendered: Option<String>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self {
            record: Button {
                label: RecordLabel::TapToRecord,
                enabled: false,
            },
            play: Button {
                label: PlayLabel::TapToPlay,
                enabled: false,
            },
            last_rendered: None,
        }
    }

    fn render_line(&self) -> String {
        format!("{}    {}", self.record.render('r'), self.play.render('p'))
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlSurface for TerminalSurface {
    fn set_record_label(&mut self, label: RecordLabel) {
        self.record.label = label;
    }

    fn set_record_enabled(&mut self, enabled: bool) {
        self.record.enabled = enabled;
    }

    fn set_play_label(&mut self, label: PlayLabel) {
        self.play.label = label;
    }

    fn set_play_enabled(&mut self, enabled: bool) {
        self.play.enabled = enabled;
    }

    fn present(&mut self) {
        let line = self.render_line();
        if self.last_rendered.as_deref() != Some(line.as_str()) {
            println!("{}", line);
            self.last_rendered = Some(line);
        }
    }
}

/// Start the stdin reader on its own thread.
///
/// A blocking read parks an OS thread rather than a runtime worker, so Ctrl+C
/// and `q` exit without waiting for another line of input.
pub fn spawn_stdin_reader(tx: mpsc::Sender<UserCommand>) -> Result<()> {
    std::thread::Builder::new()
        .name("taprec-stdin".to_string())
        .spawn(move || read_commands(std::io::stdin().lock(), tx))
        .context("Failed to spawn stdin reader thread")?;
    Ok(())
}

/// Read button presses, one per line, until EOF or quit
pub fn read_commands<R: BufRead>(reader: R, tx: mpsc::Sender<UserCommand>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                return;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<UserCommand>() {
            Ok(command) => {
                let quit = command == UserCommand::Quit;
                if tx.blocking_send(command).is_err() || quit {
                    return;
                }
            }
            Err(e) => tracing::warn!("{} (use r = record, p = play, q = quit)", e),
        }
    }
    tracing::debug!("stdin closed");
}
