//! Single/double/triple tap disambiguation for one tap code.
//!
//! Every activation is stamped into a rolling window. Depending on which
//! arities are configured, the handler fires straight away, or parks its best
//! guess on the scheduler for one timeout and lets the next tap replace it.

use crate::actions::{Action, ActionContext};
use crate::scheduler::{CancelHandle, Job, Operation, SchedulerHandle};
use crate::shared::lock;
use crate::tapcode::TapCode;
use anyhow::{Context, Result};
use log::debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct Arities {
    pub single: Option<Action>,
    pub double: Option<Action>,
    pub triple: Option<Action>,
}

impl Arities {
    fn run(&self, fire: Fire) -> Result<CancelHandle> {
        let ctx = ActionContext::immediate();
        match fire {
            Fire::Single => invoke(&self.single, ctx),
            Fire::SingleTwice => {
                let mut cancel = invoke(&self.single, ctx)?;
                cancel.merge(invoke(&self.single, ctx)?);
                Ok(cancel)
            }
            Fire::Double => invoke(&self.double, ctx),
            Fire::Triple => invoke(&self.triple, ctx),
        }
    }
}

fn invoke(action: &Option<Action>, ctx: ActionContext) -> Result<CancelHandle> {
    match action {
        Some(action) => action.invoke(ctx),
        None => Ok(CancelHandle::noop()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fire {
    Single,
    /// Two taps with no double configured, but a triple still possible.
    SingleTwice,
    Double,
    Triple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Wait,
    Now(Fire),
    Defer(Fire),
}

#[derive(Debug)]
struct Pending {
    token: u64,
    cancel: CancelHandle,
}

#[derive(Debug, Default)]
struct TapState {
    history: Vec<Instant>,
    pending: Option<Pending>,
    next_token: u64,
}

#[derive(Debug)]
pub struct TapHandler {
    layer: String,
    code: TapCode,
    timeout: Duration,
    actions: Arc<Arities>,
    state: Arc<Mutex<TapState>>,
    scheduler: SchedulerHandle,
}

impl TapHandler {
    pub fn new(
        layer: &str,
        code: TapCode,
        timeout: Duration,
        actions: Arities,
        scheduler: SchedulerHandle,
    ) -> Self {
        Self {
            layer: layer.to_owned(),
            code,
            timeout,
            actions: Arc::new(actions),
            state: Arc::new(Mutex::new(TapState::default())),
            scheduler,
        }
    }

    /// Records one activation at `now` and acts on it.
    pub fn execute_at(&self, now: Instant) -> Result<()> {
        let mut state = lock(&self.state);

        let timeout = self.timeout;
        state
            .history
            .retain(|at| now.saturating_duration_since(*at) < timeout);
        state.history.push(now);
        let presses = state.history.len();

        let decision = self.decide(presses);
        debug!("Tap {} x{presses}: {decision:?}", self.code);

        match decision {
            Decision::Wait => Ok(()),
            Decision::Now(fire) => {
                self.supersede(&mut state, presses);
                state.history.clear();
                drop(state);
                self.actions.run(fire).map(drop)
            }
            Decision::Defer(fire) => {
                self.supersede(&mut state, presses);
                let token = state.next_token;
                state.next_token += 1;
                let cancel = self
                    .scheduler
                    .submit(Operation::Run(self.deferred(fire, token)), self.timeout)?;
                state.pending = Some(Pending { token, cancel });
                Ok(())
            }
        }
    }

    fn decide(&self, presses: usize) -> Decision {
        let single = self.actions.single.is_some();
        let double = self.actions.double.is_some();
        let triple = self.actions.triple.is_some();

        match (presses, single, double, triple) {
            (1, true, false, false) => Decision::Now(Fire::Single),
            (1, true, _, _) => Decision::Defer(Fire::Single),
            (2, true, false, true) => Decision::Defer(Fire::SingleTwice),
            (2, _, true, false) => Decision::Now(Fire::Double),
            (2, _, true, true) => Decision::Defer(Fire::Double),
            (3, _, _, true) => Decision::Now(Fire::Triple),
            _ => Decision::Wait,
        }
    }

    /// Drops the outstanding decision. Within a window it is cancelled; on the
    /// first tap of a new window it belongs to the expired window and is left
    /// to fire.
    fn supersede(&self, state: &mut TapState, presses: usize) {
        if let Some(pending) = state.pending.take() {
            if presses > 1 {
                debug!(
                    "Tap {}: cancelling deferred decision {:?}",
                    self.code,
                    pending.cancel.tasks()
                );
                pending.cancel.cancel();
            }
        }
    }

    fn deferred(&self, fire: Fire, token: u64) -> Job {
        let layer = self.layer.clone();
        let code = self.code;
        let actions = self.actions.clone();
        let state = self.state.clone();

        Job::new(move || {
            {
                let mut state = lock(&state);
                if state.pending.as_ref().is_some_and(|p| p.token == token) {
                    state.pending = None;
                    state.history.clear();
                }
            }
            debug!("Tap {code}: deferred {fire:?} fired");
            actions
                .run(fire)
                .map(drop)
                .with_context(|| format!("Deferred {fire:?} for tap {code} in layer `{layer}`"))
        })
    }
}
