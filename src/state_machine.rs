//! Voice composition state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! each recording turn, user action and transport outcome is an `Event`;
//! `transition` returns the new `SessionState` plus the `Effect`s the
//! runtime must carry out.

pub mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, FailureKind, Notification};
pub use event::{AudioClip, Event, TurnResult};
pub use state::{ConversationState, Phase, SessionContext, SessionState};
pub use transition::{transition, TransitionError};
