//! Session state of this context.
//!
//! [`SessionState`] and its transition table live in [`state`];
//! [`SessionMachine`] applies transitions and their side effects.

pub mod machine;
pub mod state;

pub use machine::{SessionMachine, SessionObserver};
pub use state::{SessionEvent, SessionState};
