//! Line-oriented tap event source.
//!
//! Each line is one event:
//!
//! ```text
//! connect <id> <name> <firmware>
//! disconnect <id>
//! tap <id> <code>
//! <code>
//! ```
//!
//! A bare code is a tap from the device called [`ANONYMOUS`]. Blank lines and
//! lines starting with `#` are ignored.

use crate::tapcode::TapCode;
use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::Sender;
use log::{info, warn};
use std::io::BufRead;
use std::thread::{self, JoinHandle};

pub const ANONYMOUS: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapEvent {
    Connected {
        id: String,
        name: String,
        firmware: String,
    },
    Disconnected {
        id: String,
    },
    Tap {
        id: String,
        code: TapCode,
    },
}

/// Parses one line. `Ok(None)` for lines that carry no event.
pub fn parse_line(line: &str) -> Result<Option<TapEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let mut next = |what: &str| {
        words
            .next()
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("`{head}` needs a {what}"))
    };

    let event = match head {
        "connect" => TapEvent::Connected {
            id: next("device id")?,
            name: next("device name")?,
            firmware: next("firmware version")?,
        },
        "disconnect" => TapEvent::Disconnected {
            id: next("device id")?,
        },
        "tap" => {
            let id = next("device id")?;
            let code = next("tap code")?;
            TapEvent::Tap {
                id,
                code: code.parse().with_context(|| format!("Bad tap code `{code}`"))?,
            }
        }
        code => TapEvent::Tap {
            id: ANONYMOUS.to_owned(),
            code: code.parse().with_context(|| format!("Unknown event `{line}`"))?,
        },
    };

    if words.next().is_some() {
        bail!("Trailing input in `{line}`");
    }

    Ok(Some(event))
}

/// Reads events from `reader` on a background thread until it runs dry or
/// the receiving side goes away. Bad lines are logged and skipped.
pub fn spawn_reader(
    reader: impl BufRead + Send + 'static,
    tx: Sender<TapEvent>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("tap-source".into())
        .spawn(move || {
            for (number, line) in reader.lines().enumerate() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Stopped reading tap events: {e}");
                        return;
                    }
                };
                match parse_line(&line) {
                    Ok(Some(event)) => {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Skipping line {}: {e:#}", number + 1),
                }
            }
            info!("Tap event source closed");
        })
        .map_err(|e| anyhow!("Failed to spawn tap event reader: {e}"))
}
