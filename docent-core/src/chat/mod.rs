//! Conversational sessions.
//!
//! - [`DialogueManager`]: answers one turn (intent routing, retrieval, history)
//! - [`SessionStore`]: per-session state with idle expiry
//! - [`Turn`] / [`HistoryMessage`]: stored turns and their wire form
//! - [`Intent`]: classifier labels

mod history;
mod intent;
mod manager;
mod session;

pub use history::{merge_client_history, HistoryMessage, HistoryRole, Turn};
pub use intent::Intent;
pub use manager::{Answer, AnswerRequest, DialogueManager};
pub use session::{Session, SessionStore};
