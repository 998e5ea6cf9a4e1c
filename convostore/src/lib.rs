//! convostore - bounded, token-budgeted conversation history
//!
//! Backs `polyphase::conversation::ConversationManager`: a conversation
//! thread is an ordered sequence of `Message`s with a system prompt, user/
//! assistant turns, and tool results. `ConversationThread::trim` enforces a
//! token budget by dropping the oldest droppable messages; `ThreadStore`
//! persists a thread snapshot to `.pipeline/threads/<thread_id>.json` with
//! the same temp+fsync+rename discipline as `taskgraph::Store`, so a
//! snapshot is never read half-written.

mod error;
mod message;
mod store;

pub use error::ConvoError;
pub use message::{Message, Role};
pub use store::{ConversationThread, ThreadStore};

pub mod cli;
