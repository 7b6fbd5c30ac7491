use super::events::{GameAction, RawInputEvent};
use super::keycode::parse_keycode;
use crate::models::engine::constants::NUM_LANES;
use crate::models::settings::KeySettings;
use std::collections::HashMap;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

pub struct InputManager {
    bindings: HashMap<KeyCode, GameAction>,
}

impl InputManager {
    pub fn new(keys: &KeySettings) -> Self {
        let mut manager = Self {
            bindings: HashMap::new(),
        };
        manager.load_default_bindings();
        manager.reload_keybinds(keys);
        manager
    }

    pub fn process(&self, event: RawInputEvent) -> Option<GameAction> {
        let base_action = self.bindings.get(&event.keycode)?;

        match (event.state, *base_action) {
            (ElementState::Pressed, action) => Some(action),
            (ElementState::Released, GameAction::Hit { lane }) => Some(GameAction::Release { lane }),
            _ => None,
        }
    }

    /// Applies user bindings on top of the defaults. Unknown key names are skipped.
    pub fn reload_keybinds(&mut self, keys: &KeySettings) {
        let mut lanes = Vec::new();
        for (idx, label) in keys.lanes.iter().enumerate() {
            if idx >= NUM_LANES {
                break;
            }
            match parse_keycode(label) {
                Some(code) => lanes.push((idx, code)),
                None => log::warn!("INPUT: Unknown key '{}' for lane {}", label, idx),
            }
        }

        if !lanes.is_empty() {
            self.bindings
                .retain(|_, action| !matches!(action, GameAction::Hit { .. }));
            for (idx, code) in lanes {
                self.bindings.insert(code, GameAction::Hit { lane: idx });
            }
        }

        for (label, action) in [
            (&keys.start, GameAction::Confirm),
            (&keys.pause, GameAction::TogglePause),
            (&keys.restart, GameAction::Restart),
        ] {
            match parse_keycode(label) {
                Some(code) => {
                    self.bindings.retain(|_, bound| *bound != action);
                    self.bindings.insert(code, action);
                }
                None => log::warn!("INPUT: Unknown key '{}' for {:?}", label, action),
            }
        }
    }

    fn load_default_bindings(&mut self) {
        // Gameplay 4K
        self.bindings.insert(KeyCode::KeyD, GameAction::Hit { lane: 0 });
        self.bindings.insert(KeyCode::KeyF, GameAction::Hit { lane: 1 });
        self.bindings.insert(KeyCode::KeyJ, GameAction::Hit { lane: 2 });
        self.bindings.insert(KeyCode::KeyK, GameAction::Hit { lane: 3 });

        // System
        self.bindings.insert(KeyCode::Enter, GameAction::Confirm);
        self.bindings.insert(KeyCode::NumpadEnter, GameAction::Confirm);
        self.bindings.insert(KeyCode::Escape, GameAction::TogglePause);
        self.bindings.insert(KeyCode::KeyR, GameAction::Restart);
        self.bindings.insert(KeyCode::F5, GameAction::Restart);
    }
}
