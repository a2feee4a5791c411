//! Player controls shared between the render loop, the status server and
//! the optional global keyboard listener.
//!
//! The keyboard listener uses rdev. On macOS it needs Accessibility
//! permissions; without them no key events arrive and the player stays on
//! whatever the other inputs say.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::{info, warn};
use rdev::{listen, Event, EventType, Key};

use crate::world::{Player, PlayerInput};

#[derive(Debug, Default)]
struct ControlState {
    /// One-shot input, consumed by the next tick.
    impulse: Option<PlayerInput>,
    /// Input from keys currently held down, applied every tick.
    held: PlayerInput,
    autopilot: Option<bool>,
    reset: bool,
}

/// Cloneable handle to pending player input.
#[derive(Debug, Clone, Default)]
pub struct Controls {
    inner: Arc<Mutex<ControlState>>,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue input for the next tick.
    pub fn submit(&self, input: PlayerInput) {
        self.lock().impulse = Some(input.clamped());
    }

    pub fn set_held(&self, input: PlayerInput) {
        self.lock().held = input.clamped();
    }

    pub fn request_autopilot(&self, enabled: bool) {
        self.lock().autopilot = Some(enabled);
    }

    pub fn request_reset(&self) {
        self.lock().reset = true;
    }

    /// Hand everything pending to the player.
    ///
    /// Input wins over an autopilot request from the same tick, since manual
    /// input switches the autopilot off.
    pub fn apply_to(&self, player: &mut Player) {
        let mut state = self.lock();
        if std::mem::take(&mut state.reset) {
            player.reset();
        }
        if let Some(enabled) = state.autopilot.take() {
            player.set_autopilot(enabled);
        }
        let input = state
            .impulse
            .take()
            .or_else(|| (!state.held.is_idle()).then_some(state.held));
        if let Some(input) = input {
            player.set_input(input);
        }
    }
}

/// Keys currently held, folded into one [`PlayerInput`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeldKeys {
    forward: bool,
    back: bool,
    turn_left: bool,
    turn_right: bool,
    strafe_left: bool,
    strafe_right: bool,
}

impl HeldKeys {
    /// Track a key press or release. Returns `false` for unmapped keys.
    pub fn update(&mut self, key: Key, pressed: bool) -> bool {
        let slot = match key {
            Key::KeyW | Key::UpArrow => &mut self.forward,
            Key::KeyS | Key::DownArrow => &mut self.back,
            Key::KeyA | Key::LeftArrow => &mut self.turn_left,
            Key::KeyD | Key::RightArrow => &mut self.turn_right,
            Key::KeyQ => &mut self.strafe_left,
            Key::KeyE => &mut self.strafe_right,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    pub fn input(&self) -> PlayerInput {
        let axis = |pos: bool, neg: bool| (pos as i8 - neg as i8) as f64;
        PlayerInput::new(
            axis(self.forward, self.back),
            axis(self.strafe_right, self.strafe_left),
            axis(self.turn_right, self.turn_left),
        )
    }
}

/// Global keyboard listener steering the player through [`Controls`].
///
/// WASD or arrows move and turn, Q/E strafe, P toggles the autopilot and R
/// returns to the spawn point.
pub struct KeyboardListener {
    controls: Controls,
    stop_flag: Arc<AtomicBool>,
    listener_thread: Option<JoinHandle<()>>,
}

impl KeyboardListener {
    pub fn new(controls: Controls) -> Self {
        Self {
            controls,
            stop_flag: Arc::new(AtomicBool::new(false)),
            listener_thread: None,
        }
    }

    /// Spawn the listener thread. Returns `false` when already running.
    pub fn start(&mut self) -> bool {
        if self.listener_thread.is_some() {
            return false;
        }

        let controls = self.controls.clone();
        let stop_flag = Arc::clone(&self.stop_flag);
        let handle = thread::spawn(move || {
            let mut held = HeldKeys::default();
            let mut autopilot = false;
            let callback = move |event: Event| {
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }
                let (key, pressed) = match event.event_type {
                    EventType::KeyPress(key) => (key, true),
                    EventType::KeyRelease(key) => (key, false),
                    _ => return,
                };
                match key {
                    Key::KeyP if pressed => {
                        autopilot = !autopilot;
                        controls.request_autopilot(autopilot);
                        info!("Autopilot {}", if autopilot { "on" } else { "off" });
                    }
                    Key::KeyR if pressed => controls.request_reset(),
                    _ => {
                        if held.update(key, pressed) {
                            controls.set_held(held.input());
                        }
                    }
                }
            };

            // Blocks for the life of the process
            if let Err(e) = listen(callback) {
                warn!("Keyboard listener error: {:?}", e);
            }
        });

        self.listener_thread = Some(handle);
        info!("Keyboard control enabled (WASD/arrows, Q/E strafe, P autopilot, R reset)");
        true
    }

    /// Stop reacting to keys. rdev cannot interrupt `listen`, so the thread
    /// itself lives until the process exits.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.controls.set_held(PlayerInput::default());
        self.listener_thread = None;
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        self.stop();
    }
}
