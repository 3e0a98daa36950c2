//! Shared fixtures for unit tests.

use crate::io::KeyInjector;
use anyhow::{Result, bail};
use evdev::KeyCode;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Press(KeyCode),
    Release(KeyCode),
}

/// Records what would have reached the host. Clones share one log.
#[derive(Clone, Default)]
pub struct RecordingInjector {
    strokes: Arc<Mutex<Vec<Stroke>>>,
    fail_on: Option<KeyCode>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses every operation on `key`, like a host rejecting a keystroke.
    pub fn failing_on(key: KeyCode) -> Self {
        Self {
            fail_on: Some(key),
            ..Self::default()
        }
    }

    pub fn strokes(&self) -> Vec<Stroke> {
        self.strokes.lock().unwrap().clone()
    }

    fn record(&mut self, stroke: Stroke, key: KeyCode) -> Result<()> {
        if self.fail_on == Some(key) {
            bail!("host refused {key:?}");
        }
        self.strokes.lock().unwrap().push(stroke);
        Ok(())
    }
}

impl KeyInjector for RecordingInjector {
    fn press(&mut self, key: KeyCode) -> Result<()> {
        self.record(Stroke::Press(key), key)
    }

    fn release(&mut self, key: KeyCode) -> Result<()> {
        self.record(Stroke::Release(key), key)
    }
}

/// What a tap of one key looks like to the host.
pub fn press_release(key: KeyCode) -> Vec<Stroke> {
    vec![Stroke::Press(key), Stroke::Release(key)]
}
