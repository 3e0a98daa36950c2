mod actions;
mod config;
mod consts;
mod error;
mod io;
mod keys;
mod layers;
mod layouts;
mod model;
mod scheduler;
mod session;
mod shared;
mod source;
mod tap_handler;
mod tapcode;
#[cfg(test)]
mod testing;

use crate::{
    config::config,
    io::{DryRun, VirtualKeyboard},
    model::Model,
    scheduler::Scheduler,
    session::{Session, TapListener},
    source::spawn_reader,
};
use anyhow::Result;
use crossbeam_channel::unbounded;
use log::info;
use std::io::{BufReader, stdin};

fn main() -> Result<()> {
    env_logger::init();
    let config = config()?;
    let layers = config.resolve()?;

    let scheduler = if config.globals.no_emit {
        info!("no_emit set, keys are only logged");
        Scheduler::start(DryRun)?
    } else {
        Scheduler::start(VirtualKeyboard::create("tapkeys", config.globals.layout)?)?
    };

    let model = Model::build(&layers, config.globals.timeout(), scheduler.handle());
    let mut session = Session::new(model);

    let (tx, rx) = unbounded();
    spawn_reader(BufReader::new(stdin()), tx)?;
    info!("Listening for tap events on stdin");

    for event in rx {
        session.handle(event);
    }

    info!(
        "Shutting down with layers {:?}",
        session.model().stack().active_names()
    );
    scheduler.finish(config.globals.timeout())?;

    Ok(())
}
