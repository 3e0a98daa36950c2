use crate::model::{Dispatch, Model};
use crate::source::TapEvent;
use crate::tapcode::TapCode;
use colored::Colorize;
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// Callbacks for a tap device.
pub trait TapListener {
    fn on_connect(&mut self, id: &str, name: &str, firmware: &str);

    fn on_disconnect(&mut self, id: &str);

    fn on_tap(&mut self, id: &str, code: TapCode);

    fn handle(&mut self, event: TapEvent) {
        match event {
            TapEvent::Connected { id, name, firmware } => self.on_connect(&id, &name, &firmware),
            TapEvent::Disconnected { id } => self.on_disconnect(&id),
            TapEvent::Tap { id, code } => self.on_tap(&id, code),
        }
    }
}

/// Feeds every tap into the model, whichever device it came from.
pub struct Session {
    model: Model,
    connected: BTreeSet<String>,
}

impl Session {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            connected: BTreeSet::new(),
        }
    }

    pub fn connected(&self) -> impl Iterator<Item = &str> {
        self.connected.iter().map(String::as_str)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    fn log_connected(&self) {
        info!("Connected devices: {:?}", self.connected().collect::<Vec<_>>());
    }
}

impl TapListener for Session {
    fn on_connect(&mut self, id: &str, name: &str, firmware: &str) {
        info!(
            "{} {} ({name}, firmware {firmware})",
            "CONNECT".green().bold(),
            id
        );
        self.connected.insert(id.to_owned());
        self.log_connected();
    }

    fn on_disconnect(&mut self, id: &str) {
        if !self.connected.remove(id) {
            warn!("Disconnect from unknown device {id}");
            return;
        }
        info!("{} {}", "DISCONNECT".red().bold(), id);
        self.log_connected();
    }

    fn on_tap(&mut self, id: &str, code: TapCode) {
        match self.model.process(code) {
            Dispatch::Handled(layer) => debug!("{id}: {code} handled by `{layer}`"),
            Dispatch::Swallowed(layer) => debug!("{id}: {code} swallowed by `{layer}`"),
            Dispatch::Unmapped => debug!("{id}: {code} unmapped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::scheduler::Scheduler;
    use crate::source::ANONYMOUS;
    use crate::testing::{RecordingInjector, press_release};
    use evdev::KeyCode;

    fn session(scheduler: &Scheduler) -> Session {
        let config = Config::default();
        let model = Model::build(
            &config.resolve().unwrap(),
            config.globals.timeout(),
            scheduler.handle(),
        );
        Session::new(model)
    }

    #[test]
    fn test_tracks_connected_devices() {
        let scheduler = Scheduler::start(RecordingInjector::new()).unwrap();
        let mut session = session(&scheduler);

        session.handle(TapEvent::Connected {
            id: "right".into(),
            name: "Tap".into(),
            firmware: "2.0".into(),
        });
        session.on_connect("left", "Tap", "2.0");
        assert_eq!(session.connected().collect::<Vec<_>>(), vec!["left", "right"]);

        session.handle(TapEvent::Disconnected { id: "left".into() });
        session.on_disconnect("ghost");
        assert_eq!(session.connected().collect::<Vec<_>>(), vec!["right"]);
    }

    #[test]
    fn test_taps_reach_the_model() {
        let injector = RecordingInjector::new();
        let scheduler = Scheduler::start(injector.clone()).unwrap();
        let mut session = session(&scheduler);

        // Taps from unannounced devices are still processed.
        session.handle(TapEvent::Tap {
            id: ANONYMOUS.into(),
            code: TapCode::new(1).unwrap(),
        });
        scheduler.handle().sync().unwrap();

        assert_eq!(injector.strokes(), press_release(KeyCode::KEY_A));
        assert_eq!(session.model().stack().active_names(), vec!["base"]);
    }
}
