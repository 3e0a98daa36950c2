use crate::keys::KeyCombo;
use crate::layers::LayerStack;
use crate::scheduler::{CancelHandle, Operation, SchedulerHandle};
use anyhow::Result;
use log::warn;
use std::time::Duration;

/// One configured behaviour, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSpec {
    Press(KeyCombo),
    PushLayer(String),
    PopLayer,
    TopLayer(String),
}

impl ActionSpec {
    pub fn compile(&self, scheduler: &SchedulerHandle, stack: &LayerStack) -> Action {
        match self {
            ActionSpec::Press(combo) => Action::Press {
                combo: combo.clone(),
                scheduler: scheduler.clone(),
            },
            ActionSpec::PushLayer(layer) => Action::PushLayer {
                layer: layer.clone(),
                stack: stack.clone(),
            },
            ActionSpec::PopLayer => Action::PopLayer {
                stack: stack.clone(),
            },
            ActionSpec::TopLayer(layer) => Action::TopLayer {
                layer: layer.clone(),
                stack: stack.clone(),
            },
        }
    }
}

/// Timing budget handed to an action when it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionContext {
    /// Applied to every key operation the action submits.
    pub delay: Duration,
}

impl ActionContext {
    pub fn immediate() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub enum Action {
    Press {
        combo: KeyCombo,
        scheduler: SchedulerHandle,
    },
    PushLayer {
        layer: String,
        stack: LayerStack,
    },
    PopLayer {
        stack: LayerStack,
    },
    TopLayer {
        layer: String,
        stack: LayerStack,
    },
    Sequence(Vec<Action>),
}

impl Action {
    /// Compiles a list of specs into one action that runs them in order.
    pub fn sequence(specs: &[ActionSpec], scheduler: &SchedulerHandle, stack: &LayerStack) -> Self {
        Action::Sequence(
            specs
                .iter()
                .map(|spec| spec.compile(scheduler, stack))
                .collect(),
        )
    }

    /// Runs the action. The returned handle withdraws any key operations it
    /// scheduled that have not fired yet; layer changes happen immediately
    /// and are not undone.
    pub fn invoke(&self, ctx: ActionContext) -> Result<CancelHandle> {
        match self {
            Action::Press { combo, scheduler } => {
                let mut cancel = CancelHandle::noop();
                for chord in combo.chords() {
                    if let [key] = chord.as_slice() {
                        cancel.merge(scheduler.submit(Operation::Tap(*key), ctx.delay)?);
                        continue;
                    }
                    for key in chord {
                        cancel.merge(scheduler.submit(Operation::Press(*key), ctx.delay)?);
                    }
                    for key in chord.iter().rev() {
                        cancel.merge(scheduler.submit(Operation::Release(*key), ctx.delay)?);
                    }
                }
                Ok(cancel)
            }
            Action::PushLayer { layer, stack } => {
                if !stack.push(layer) {
                    warn!("Cannot push unknown layer `{layer}`");
                }
                Ok(CancelHandle::noop())
            }
            Action::PopLayer { stack } => {
                stack.pop();
                Ok(CancelHandle::noop())
            }
            Action::TopLayer { layer, stack } => {
                if !stack.move_to_top(layer) {
                    warn!("Cannot move unknown layer `{layer}` to the top");
                }
                Ok(CancelHandle::noop())
            }
            Action::Sequence(actions) => {
                let mut cancel = CancelHandle::noop();
                for action in actions {
                    cancel.merge(action.invoke(ctx)?);
                }
                Ok(cancel)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use crate::testing::{RecordingInjector, Stroke, press_release};
    use evdev::KeyCode;
    use std::thread;

    fn stack() -> LayerStack {
        LayerStack::new(vec!["base".into(), "fn".into()], vec![0])
    }

    fn press(combo: &str) -> ActionSpec {
        ActionSpec::Press(combo.parse().unwrap())
    }

    #[test]
    fn test_press_releases_each_chord_before_the_next() {
        let injector = RecordingInjector::new();
        let scheduler = Scheduler::start(injector.clone()).unwrap();
        let action = press("ctrl+c,v").compile(&scheduler.handle(), &stack());

        action.invoke(ActionContext::immediate()).unwrap();
        scheduler.handle().sync().unwrap();

        assert_eq!(
            injector.strokes(),
            vec![
                Stroke::Press(KeyCode::KEY_LEFTCTRL),
                Stroke::Press(KeyCode::KEY_C),
                Stroke::Release(KeyCode::KEY_C),
                Stroke::Release(KeyCode::KEY_LEFTCTRL),
                Stroke::Press(KeyCode::KEY_V),
                Stroke::Release(KeyCode::KEY_V),
            ]
        );
    }

    #[test]
    fn test_delayed_press_can_be_cancelled() {
        let injector = RecordingInjector::new();
        let scheduler = Scheduler::start(injector.clone()).unwrap();
        let handle = scheduler.handle();
        let action = press("a,b").compile(&handle, &stack());

        let cancel = action
            .invoke(ActionContext {
                delay: Duration::from_millis(50),
            })
            .unwrap();
        assert_eq!(cancel.tasks().len(), 2);
        cancel.cancel();

        thread::sleep(Duration::from_millis(100));
        handle.sync().unwrap();
        assert!(injector.strokes().is_empty());
    }

    #[test]
    fn test_single_key_chord_is_one_tap() {
        let scheduler = Scheduler::start(RecordingInjector::new()).unwrap();
        let delayed = ActionContext {
            delay: Duration::from_secs(10),
        };

        let single = press("x").compile(&scheduler.handle(), &stack());
        let chord = press("ctrl+x").compile(&scheduler.handle(), &stack());

        assert_eq!(single.invoke(delayed).unwrap().tasks().len(), 1);
        assert_eq!(chord.invoke(delayed).unwrap().tasks().len(), 4);
    }

    #[test]
    fn test_sequence_runs_in_order() {
        let injector = RecordingInjector::new();
        let scheduler = Scheduler::start(injector.clone()).unwrap();
        let stack = stack();
        let specs = [press("a"), ActionSpec::PushLayer("fn".into()), press("b")];
        let action = Action::sequence(&specs, &scheduler.handle(), &stack);

        action.invoke(ActionContext::immediate()).unwrap();
        scheduler.handle().sync().unwrap();

        let mut expected = press_release(KeyCode::KEY_A);
        expected.extend(press_release(KeyCode::KEY_B));
        assert_eq!(injector.strokes(), expected);
        assert_eq!(stack.active_names(), vec!["base", "fn"]);
    }

    #[test]
    fn test_layer_actions() {
        let scheduler = Scheduler::start(RecordingInjector::new()).unwrap();
        let handle = scheduler.handle();
        let stack = stack();

        let push = ActionSpec::PushLayer("fn".into()).compile(&handle, &stack);
        let top = ActionSpec::TopLayer("base".into()).compile(&handle, &stack);
        let pop = ActionSpec::PopLayer.compile(&handle, &stack);

        push.invoke(ActionContext::immediate()).unwrap();
        assert_eq!(stack.active_names(), vec!["base", "fn"]);

        top.invoke(ActionContext::immediate()).unwrap();
        assert_eq!(stack.active_names(), vec!["fn", "base"]);

        pop.invoke(ActionContext::immediate()).unwrap();
        pop.invoke(ActionContext::immediate()).unwrap();
        assert_eq!(stack.active_names(), vec!["fn"]);
    }

    #[test]
    fn test_unknown_layer_is_a_noop() {
        let scheduler = Scheduler::start(RecordingInjector::new()).unwrap();
        let stack = stack();

        for spec in [
            ActionSpec::PushLayer("nope".into()),
            ActionSpec::TopLayer("nope".into()),
        ] {
            let cancel = spec
                .compile(&scheduler.handle(), &stack)
                .invoke(ActionContext::immediate())
                .unwrap();
            assert!(cancel.tasks().is_empty());
        }
        assert_eq!(stack.active_names(), vec!["base"]);
    }
}
