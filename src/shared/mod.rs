//! Types shared between the session logic and the renderer.

pub mod snapshot;
