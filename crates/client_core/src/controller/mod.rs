//! Controller layer: UI intents, session state transitions, and intent orchestration.

pub mod events;
pub mod orchestration;
pub mod session;
