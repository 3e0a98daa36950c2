use crate::consts::*;
use crate::layouts::Layout;
use anyhow::{Result, anyhow};
use colored::{ColoredString, Colorize};
use evdev::KeyCode;
use log::debug;
use uinput::device::Device as UInputDevice;

/// Host side of keystroke output. Implementations only ever write.
pub trait KeyInjector: Send {
    fn press(&mut self, key: KeyCode) -> Result<()>;

    fn release(&mut self, key: KeyCode) -> Result<()>;

    fn tap(&mut self, key: KeyCode) -> Result<()> {
        self.press(key)?;
        self.release(key)
    }
}

pub struct VirtualKeyboard {
    device: UInputDevice,
    layout: Layout,
}

impl VirtualKeyboard {
    pub fn create(name: &str, layout: Layout) -> Result<Self> {
        let device = uinput::default()
            .map_err(|e| anyhow!("Failed to open /dev/uinput (sudo modprobe uinput): {e}"))?
            .name(name)?
            .event(uinput::event::Keyboard::All)?
            .create()?;
        Ok(Self { device, layout })
    }

    fn write(&mut self, key: KeyCode, state: i32) -> Result<()> {
        let physical = self.layout.resolve_reverse(&key);
        self.device.write(EV_KEY, physical.0 as i32, state)?;
        self.device.synchronize()?;
        log_key(key, state_arrow(state));
        Ok(())
    }
}

impl KeyInjector for VirtualKeyboard {
    fn press(&mut self, key: KeyCode) -> Result<()> {
        self.write(key, PRESS)
    }

    fn release(&mut self, key: KeyCode) -> Result<()> {
        self.write(key, RELEASE)
    }
}

/// Used with `no_emit`: keys are logged but never reach the host.
pub struct DryRun;

impl KeyInjector for DryRun {
    fn press(&mut self, key: KeyCode) -> Result<()> {
        log_key(key, state_arrow(PRESS));
        Ok(())
    }

    fn release(&mut self, key: KeyCode) -> Result<()> {
        log_key(key, state_arrow(RELEASE));
        Ok(())
    }

    fn tap(&mut self, key: KeyCode) -> Result<()> {
        log_key(key, "↕".yellow().bold());
        Ok(())
    }
}

fn log_key(key: KeyCode, arrow: ColoredString) {
    debug!(
        "{}[{}] {:?}",
        if is_modifier(&key) { "    " } else { "" },
        arrow,
        key,
    );
}

fn state_arrow(state: i32) -> ColoredString {
    match state {
        PRESS => "↓".green().bold(),
        _ => "↑".red().bold(),
    }
}

fn is_modifier(key: &KeyCode) -> bool {
    matches!(
        *key,
        KeyCode::KEY_LEFTSHIFT
            | KeyCode::KEY_RIGHTSHIFT
            | KeyCode::KEY_LEFTCTRL
            | KeyCode::KEY_RIGHTCTRL
            | KeyCode::KEY_LEFTALT
            | KeyCode::KEY_RIGHTALT
            | KeyCode::KEY_LEFTMETA
            | KeyCode::KEY_RIGHTMETA
    )
}
