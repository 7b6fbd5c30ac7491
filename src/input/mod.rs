//! Keyboard translation from window events to gameplay actions.

pub mod events;
pub mod keycode;
pub mod manager;
