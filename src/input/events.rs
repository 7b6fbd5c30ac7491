use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Clone, Copy)]
pub struct RawInputEvent {
    pub keycode: KeyCode,
    pub state: ElementState,
}

impl RawInputEvent {
    /// Key repeats are dropped here, so holding a lane key never re-hits.
    pub fn from_winit(event: &WindowEvent) -> Option<Self> {
        if let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(keycode),
                    state,
                    repeat: false,
                    ..
                },
            ..
        } = event
        {
            Some(Self {
                keycode: *keycode,
                state: *state,
            })
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAction {
    // Gameplay
    Hit { lane: usize },
    Release { lane: usize },
    Restart,

    // System
    Confirm,
    TogglePause,
    Quit,
}
