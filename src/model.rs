//! The layer model: routes each tap code down the active stack.

use crate::actions::{Action, ActionSpec};
use crate::config::{Bindings, ResolvedLayer};
use crate::layers::{Layer, LayerId, LayerStack};
use crate::scheduler::SchedulerHandle;
use crate::tap_handler::{Arities, TapHandler};
use crate::tapcode::TapCode;
use anyhow::Result;
use colored::Colorize;
use log::{debug, error};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Where a tap code ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A layer had a handler for the code.
    Handled(String),
    /// An opaque layer without a handler stopped the walk.
    Swallowed(String),
    /// Every active layer let the code through.
    Unmapped,
}

#[derive(Debug)]
pub struct Model {
    layers: Vec<Layer>,
    stack: LayerStack,
}

impl Model {
    /// Builds every layer and starts with the default layers active, in the
    /// order they were configured.
    pub fn build(resolved: &[ResolvedLayer], timeout: Duration, scheduler: SchedulerHandle) -> Self {
        let names = resolved.iter().map(|layer| layer.name.clone()).collect();
        let initial = resolved
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.default)
            .map(|(id, _)| id)
            .collect();
        let stack = LayerStack::new(names, initial);

        let layers = resolved
            .iter()
            .map(|layer| build_layer(layer, timeout, &scheduler, &stack))
            .collect();

        let model = Self { layers, stack };
        debug!(
            "Active layers: {:?}, defaults: {:?}",
            model.stack.active_names(),
            model
                .layers
                .iter()
                .filter(|layer| layer.is_default())
                .map(Layer::name)
                .collect::<Vec<_>>()
        );
        model
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn process(&self, code: TapCode) -> Dispatch {
        self.process_at(code, Instant::now())
    }

    /// Walks the active stack from the top. Every layer passed through runs
    /// its enter and exit actions; the walk ends at the first layer that
    /// handles the code or at the first opaque one.
    ///
    /// Failures are logged and never abort the walk.
    pub fn process_at(&self, code: TapCode, now: Instant) -> Dispatch {
        debug!("{} {}", "TAP".cyan().bold(), code);

        for id in self.stack.snapshot().into_iter().rev() {
            let Some(layer) = self.layer(id) else {
                continue;
            };
            let claimed = layer.would_process(code);

            report(code, layer, "enter", layer.start());
            if claimed {
                report(code, layer, "handler", layer.process(code, now));
            }
            report(code, layer, "exit", layer.finish());

            if claimed {
                return Dispatch::Handled(layer.name().to_owned());
            }
            if !layer.is_transparent() {
                debug!("Tap {code} swallowed by `{}`", layer.name());
                return Dispatch::Swallowed(layer.name().to_owned());
            }
        }

        debug!("Tap {code} is not mapped in any active layer");
        Dispatch::Unmapped
    }

    fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }
}

fn build_layer(
    layer: &ResolvedLayer,
    timeout: Duration,
    scheduler: &SchedulerHandle,
    stack: &LayerStack,
) -> Layer {
    let compile = |specs: &Option<Vec<ActionSpec>>| {
        specs
            .as_deref()
            .map(|specs| Action::sequence(specs, scheduler, stack))
    };

    let handlers: HashMap<TapCode, TapHandler> = layer
        .bindings
        .iter()
        .map(|(code, Bindings { single, double, triple })| {
            let arities = Arities {
                single: compile(single),
                double: compile(double),
                triple: compile(triple),
            };
            (
                *code,
                TapHandler::new(&layer.name, *code, timeout, arities, scheduler.clone()),
            )
        })
        .collect();

    Layer::new(
        layer.name.clone(),
        layer.transparent,
        layer.default,
        handlers,
        Action::sequence(&layer.enter, scheduler, stack),
        Action::sequence(&layer.exit, scheduler, stack),
    )
}

fn report(code: TapCode, layer: &Layer, stage: &str, result: Result<()>) {
    if let Err(e) = result {
        error!("Tap {code} failed in layer `{}` ({stage}): {e:#}", layer.name());
    }
}
