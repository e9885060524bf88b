//! Pressed-input set shared between the event source and the simulation.
//!
//! Keys and pointer buttons live in one integer namespace: key codes are
//! stored as positive values and pointer buttons as the negated button
//! ordinal, so the two never collide. The render side writes from window
//! events; the simulation reads a snapshot once per step.
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Pointer buttons with their ordinals (1-based; 0 means "no button").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary = 1,
    Middle = 2,
    Secondary = 3,
    Back = 4,
    Forward = 5,
}

impl PointerButton {
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        match ordinal {
            1 => Some(PointerButton::Primary),
            2 => Some(PointerButton::Middle),
            3 => Some(PointerButton::Secondary),
            4 => Some(PointerButton::Back),
            5 => Some(PointerButton::Forward),
            _ => None,
        }
    }
}

/// Decoded entry of the pressed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputCode {
    Key(u32),
    Button(PointerButton),
}

impl InputCode {
    /// Raw signed code as stored in the pressed set.
    pub fn raw(self) -> i32 {
        match self {
            InputCode::Key(code) => code as i32,
            InputCode::Button(button) => -button.ordinal(),
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => None,
            r if r > 0 => Some(InputCode::Key(r as u32)),
            r => PointerButton::from_ordinal(-r).map(InputCode::Button),
        }
    }
}

#[derive(Default)]
struct InputState {
    pressed: FxHashSet<i32>,
    pointer: (i32, i32),
}

/// Cloneable handle to the shared input state.
#[derive(Clone, Default)]
pub struct PressedInputs {
    inner: Arc<Mutex<InputState>>,
}

impl PressedInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key press. Code 0 is reserved and ignored.
    pub fn key_down(&self, code: u32) {
        if code != 0 && code <= i32::MAX as u32 {
            self.inner.lock().pressed.insert(code as i32);
        }
    }

    pub fn key_up(&self, code: u32) {
        if code <= i32::MAX as u32 {
            self.inner.lock().pressed.remove(&(code as i32));
        }
    }

    pub fn button_down(&self, button: PointerButton) {
        self.inner.lock().pressed.insert(-button.ordinal());
    }

    pub fn button_up(&self, button: PointerButton) {
        self.inner.lock().pressed.remove(&-button.ordinal());
    }

    /// Store the pointer position, already mapped to logical coordinates.
    pub fn pointer_moved(&self, x: i32, y: i32) {
        self.inner.lock().pointer = (x, y);
    }

    /// Copy of the raw pressed set.
    pub fn snapshot(&self) -> FxHashSet<i32> {
        self.inner.lock().pressed.clone()
    }

    pub fn is_pressed(&self, code: InputCode) -> bool {
        self.inner.lock().pressed.contains(&code.raw())
    }

    pub fn pointer(&self) -> (i32, i32) {
        self.inner.lock().pointer
    }

    pub fn pointer_x(&self) -> i32 {
        self.pointer().0
    }

    pub fn pointer_y(&self) -> i32 {
        self.pointer().1
    }

    /// Forget every pressed input, e.g. when the window loses focus.
    pub fn release_all(&self) {
        self.inner.lock().pressed.clear();
    }
}
