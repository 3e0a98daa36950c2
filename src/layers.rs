use crate::actions::{Action, ActionContext};
use crate::shared::lock;
use crate::tap_handler::TapHandler;
use crate::tapcode::TapCode;
use anyhow::Result;
use colored::Colorize;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub type LayerId = usize;

/// A named mapping from tap codes to handlers.
#[derive(Debug)]
pub struct Layer {
    name: String,
    transparent: bool,
    default: bool,
    handlers: HashMap<TapCode, TapHandler>,
    enter: Action,
    exit: Action,
}

impl Layer {
    pub fn new(
        name: String,
        transparent: bool,
        default: bool,
        handlers: HashMap<TapCode, TapHandler>,
        enter: Action,
        exit: Action,
    ) -> Self {
        Self {
            name,
            transparent,
            default,
            handlers,
            enter,
            exit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn would_process(&self, code: TapCode) -> bool {
        self.handlers.contains_key(&code)
    }

    pub fn process(&self, code: TapCode, now: Instant) -> Result<()> {
        match self.handlers.get(&code) {
            Some(handler) => handler.execute_at(now),
            None => Ok(()),
        }
    }

    /// Runs the enter actions. Called whenever a tap walks through this layer.
    pub fn start(&self) -> Result<()> {
        self.enter.invoke(ActionContext::immediate()).map(drop)
    }

    /// Runs the exit actions, the counterpart of [`Layer::start`].
    pub fn finish(&self) -> Result<()> {
        self.exit.invoke(ActionContext::immediate()).map(drop)
    }
}

/// Which layers are active, bottom first. Clones share the same stack.
///
/// The bottom layer can never be popped.
#[derive(Debug, Clone)]
pub struct LayerStack {
    active: Arc<Mutex<Vec<LayerId>>>,
    names: Arc<Vec<String>>,
}

impl LayerStack {
    /// `names` holds every known layer indexed by id, `initial` the starting
    /// stack, bottom first.
    pub fn new(names: Vec<String>, initial: Vec<LayerId>) -> Self {
        Self {
            active: Arc::new(Mutex::new(initial)),
            names: Arc::new(names),
        }
    }

    pub fn id_of(&self, name: &str) -> Option<LayerId> {
        self.names.iter().position(|n| n == name)
    }

    pub fn name_of(&self, id: LayerId) -> &str {
        self.names.get(id).map_or("?", String::as_str)
    }

    /// Puts `name` on top. Returns false if no such layer exists.
    pub fn push(&self, name: &str) -> bool {
        let Some(id) = self.id_of(name) else {
            return false;
        };
        lock(&self.active).push(id);
        log_layer("↓".green().bold(), name);
        true
    }

    /// Removes the top layer unless it is the only one left.
    pub fn pop(&self) -> bool {
        let mut active = lock(&self.active);
        if active.len() <= 1 {
            debug!("Refusing to pop the last layer");
            return false;
        }
        if let Some(id) = active.pop() {
            log_layer("↑".red().bold(), self.name_of(id));
        }
        true
    }

    /// Removes every occurrence of `name` and pushes it once on top.
    pub fn move_to_top(&self, name: &str) -> bool {
        let Some(id) = self.id_of(name) else {
            return false;
        };
        let mut active = lock(&self.active);
        active.retain(|layer| *layer != id);
        active.push(id);
        log_layer("⇈".purple().bold(), name);
        true
    }

    pub fn snapshot(&self) -> Vec<LayerId> {
        lock(&self.active).clone()
    }

    pub fn active_names(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .map(|id| self.name_of(id).to_owned())
            .collect()
    }
}

fn log_layer(arrow: colored::ColoredString, layer: &str) {
    debug!("{} {}: {}", arrow, "LAYER".purple(), layer.bright_blue());
}
