//! Session state management.
//!
//! - `PlaySession` - one play-through of one chart
//! - traits shared by state handlers (snapshots, updates, actions)

pub mod game;
pub mod traits;

// Re-exports for convenient access
pub use game::PlaySession;
pub use traits::{HandleAction, SessionContext, Snapshot, Transition, Update};
