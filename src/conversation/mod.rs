//! Per-user conversation history, serialized by per-user locks.

mod store;

pub use store::{ConversationEntry, ConversationStore, EntryMetadata, Role, StoreStats};
