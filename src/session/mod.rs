//! Session lifecycle: the connection state machine, backoff schedule,
//! persistable credential, and the actor that drives all three.

mod backoff;
mod credential;
mod envelope;
mod machine;
mod state;

pub use backoff::Backoff;
pub use credential::SessionCredential;
pub use machine::{Command, SessionActor, SessionHandle};
pub use state::{ConnectionState, Transition, TransitionReason};
