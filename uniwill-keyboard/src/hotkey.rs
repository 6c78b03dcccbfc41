//! Hotkey event classification
//!
//! Two inputs feed this module:
//! - raw event codes pushed by the backend's event callback
//! - key release codes from the keyboard itself, used to spot the
//!   LEFTMETA release that ends the touchpad toggle combination
//!
//! Output goes to an [`InputSink`]. The touchpad toggle is reported from the
//! work queue, never from the notifier call itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use uniwill_transport::protocol::event;

use crate::led::KbdBacklight;
use crate::work::WorkQueue;

/// Logical keys this driver reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Rfkill,
    F21,
    KbdIllumDown,
    KbdIllumUp,
    KbdIllumToggle,
    LeftMeta,
    LeftAlt,
    F6,
}

impl Key {
    /// Linux input event code
    pub fn code(self) -> u16 {
        match self {
            Self::Rfkill => 247,
            Self::F21 => 191,
            Self::KbdIllumDown => 229,
            Self::KbdIllumUp => 230,
            Self::KbdIllumToggle => 228,
            Self::LeftMeta => 125,
            Self::LeftAlt => 56,
            Self::F6 => 64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rfkill => "KEY_RFKILL",
            Self::F21 => "KEY_F21",
            Self::KbdIllumDown => "KEY_KBDILLUMDOWN",
            Self::KbdIllumUp => "KEY_KBDILLUMUP",
            Self::KbdIllumToggle => "KEY_KBDILLUMTOGGLE",
            Self::LeftMeta => "KEY_LEFTMETA",
            Self::LeftAlt => "KEY_LEFTALT",
            Self::F6 => "KEY_F6",
        }
    }
}

/// Event code to key table
pub const KEYMAP: &[(u32, Key)] = &[
    (event::KEY_RFKILL, Key::Rfkill),
    (event::OSD_TOUCHPAD_WORKAROUND, Key::F21),
    (event::KEY_KBDILLUMDOWN, Key::KbdIllumDown),
    (event::KEY_KBDILLUMUP, Key::KbdIllumUp),
    (event::KEY_KBDILLUMTOGGLE, Key::KbdIllumToggle),
];

/// Look up the key for an event code
pub fn lookup(code: u32) -> Option<Key> {
    KEYMAP.iter().find(|(c, _)| *c == code).map(|(_, k)| *k)
}

/// Chord synthesized for the mode toggle key, pressed in order
pub const MODE_TOGGLE_CHORD: [Key; 3] = [Key::LeftMeta, Key::LeftAlt, Key::F6];

/// Release codes, oldest first, that end in a touchpad toggle
pub const TOUCHPAD_TOGGLE_SEQUENCE: [u16; 3] = [85, 29, 125];

/// Destination for synthesized input
pub trait InputSink: Send + Sync {
    fn key(&self, key: Key, pressed: bool);
    fn sync(&self);
}

/// Recorded input, for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(Key, bool),
    Sync,
}

/// Sink that keeps everything it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<InputEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().clone()
    }

    /// Drain recorded events
    pub fn take(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of presses of `key`
    pub fn presses(&self, key: Key) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| **e == InputEvent::Key(key, true))
            .count()
    }
}

impl InputSink for RecordingSink {
    fn key(&self, key: Key, pressed: bool) {
        self.events.lock().push(InputEvent::Key(key, pressed));
    }

    fn sync(&self) {
        self.events.lock().push(InputEvent::Sync);
    }
}

/// Report a mapped event code as a press followed by a release
///
/// Returns false if the code is not in [`KEYMAP`].
pub fn report_known_event(sink: &dyn InputSink, code: u32) -> bool {
    match lookup(code) {
        Some(key) => {
            sink.key(key, true);
            sink.sync();
            sink.key(key, false);
            sink.sync();
            true
        }
        None => false,
    }
}

/// The last two key release codes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyHistory {
    prev: u16,
    prevprev: u16,
}

impl KeyHistory {
    /// Record a release; true if it completes the touchpad toggle sequence
    pub fn release(&mut self, code: u16) -> bool {
        if code == 0 {
            return false;
        }
        let [first, second, last] = TOUCHPAD_TOGGLE_SEQUENCE;
        let matched = code == last && self.prevprev == first && self.prev == second;
        self.prevprev = self.prev;
        self.prev = code;
        matched
    }
}

/// Classifies backend events and keyboard releases into input
pub struct HotkeyClassifier {
    sink: Arc<dyn InputSink>,
    queue: Arc<WorkQueue>,
    /// Present only on single-zone RGB boards
    backlight: Option<Arc<KbdBacklight>>,
    history: Mutex<KeyHistory>,
    key_notifier: AtomicBool,
}

impl HotkeyClassifier {
    pub fn new(
        sink: Arc<dyn InputSink>,
        queue: Arc<WorkQueue>,
        backlight: Option<Arc<KbdBacklight>>,
    ) -> Self {
        Self {
            sink,
            queue,
            backlight,
            history: Mutex::new(KeyHistory::default()),
            key_notifier: AtomicBool::new(false),
        }
    }

    /// Start or stop following keyboard releases
    pub fn set_key_notifier(&self, attached: bool) {
        self.key_notifier.store(attached, Ordering::SeqCst);
    }

    pub fn key_notifier_attached(&self) -> bool {
        self.key_notifier.load(Ordering::SeqCst)
    }

    /// Handle one event code pushed by the backend
    pub fn handle_event(&self, code: u32) {
        if !report_known_event(self.sink.as_ref(), code) {
            debug!("Unknown code - {} ({:#06x})", code, code);
        }

        if code == event::KEY_MODE_TOGGLE {
            for key in MODE_TOGGLE_CHORD {
                self.sink.key(key, true);
            }
            self.sink.sync();
            for key in MODE_TOGGLE_CHORD.into_iter().rev() {
                self.sink.key(key, false);
            }
            self.sink.sync();
        }

        if let Some(backlight) = &self.backlight {
            let result = match code {
                event::OSD_KB_LED_LEVEL0..=event::OSD_KB_LED_LEVEL4 => {
                    backlight.set_level((code - event::OSD_KB_LED_LEVEL0) as usize)
                }
                event::OSD_DC_ADAPTER_CHANGE => backlight.write_state(),
                _ => Ok(()),
            };
            if let Err(e) = result {
                warn!("backlight update for event {:#x} failed: {}", code, e);
            }
        }
    }

    /// Handle a key edge from the keyboard
    pub fn handle_key(&self, code: u16, down: bool) {
        if down || !self.key_notifier_attached() {
            return;
        }
        let matched = self.history.lock().release(code);
        if matched {
            debug!("Touchpad Toggle");
            let sink = Arc::clone(&self.sink);
            self.queue.schedule(move || {
                report_known_event(sink.as_ref(), event::OSD_TOUCHPAD_WORKAROUND);
            });
        }
    }
}
