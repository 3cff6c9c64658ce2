use crate::error::GatewayError;
use crate::services::{ChatMessage, ServiceKind};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Author of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Parse a wire-format role string.
    pub fn parse(value: &str) -> Result<Self, GatewayError> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(GatewayError::validation(format!(
                "invalid role '{other}', expected 'user', 'assistant', or 'system'"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to an assistant entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Which upstream service produced this reply.
    pub service_used: Option<ServiceKind>,
    /// Number of citations carried by the reply, when the service reports them.
    pub citation_count: Option<usize>,
}

/// One entry in a user's conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
    pub metadata: Option<EntryMetadata>,
}

impl ConversationEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(role: Role, content: impl Into<String>, metadata: EntryMetadata) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: Some(metadata),
        }
    }
}

/// Summary of the store's current footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Users with at least one history entry.
    pub active_users: usize,
    pub total_entries: usize,
    /// Per-user lock slots currently allocated, idle ones included.
    pub tracked_slots: usize,
}

#[derive(Default)]
struct UserSlot {
    entries: Mutex<Vec<ConversationEntry>>,
}

/// Per-user ordered message history behind per-user locks.
///
/// The outer `RwLock` guards only the slot table; each user's entries sit
/// behind their own mutex, so contention is bounded to a single user and
/// operations on one user's history are totally ordered by that user's lock
/// acquisition order. The store is an explicit registry: construct one and
/// inject it wherever history is needed.
pub struct ConversationStore {
    slots: RwLock<HashMap<u64, Arc<UserSlot>>>,
    max_history: usize,
    sweep_interval: Duration,
    last_sweep: Mutex<Instant>,
}

impl ConversationStore {
    pub fn new(max_history: usize, sweep_interval: Duration) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            max_history,
            sweep_interval,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn slot(&self, user: u64) -> Arc<UserSlot> {
        if let Some(slot) = self.slots.read().get(&user) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(user).or_default())
    }

    /// Append one entry to `user`'s history.
    ///
    /// Empty or whitespace-only content is a policy no-op, not an error.
    /// Content is stored trimmed. The oldest entries are pruned first once
    /// the history exceeds its bound.
    pub fn append(&self, user: u64, role: Role, content: &str, metadata: Option<EntryMetadata>) {
        let content = content.trim();
        if content.is_empty() {
            warn!(user, %role, "ignoring empty conversation entry");
            return;
        }

        let slot = self.slot(user);
        let mut entries = slot.entries.lock();
        entries.push(ConversationEntry {
            role,
            content: content.to_string(),
            metadata,
        });

        let overflow = entries.len().saturating_sub(self.max_history);
        if overflow > 0 {
            entries.drain(..overflow);
            info!(
                user,
                removed = overflow,
                kept = self.max_history,
                "pruned oldest conversation entries"
            );
        }

        debug!(user, %role, total = entries.len(), "appended conversation entry");
    }

    /// Return an independent snapshot of `user`'s history.
    pub fn read(&self, user: u64) -> Vec<ConversationEntry> {
        self.sweep_idle_slots(false);
        let slot = self.slot(user);
        let entries = slot.entries.lock();
        entries.clone()
    }

    /// Build model context by pairing chronological user/assistant turns.
    ///
    /// System entries are dropped, metadata is stripped, and a trailing run
    /// of unanswered user messages is kept so the model sees the pending
    /// question.
    pub fn summarize(&self, user: u64) -> Vec<ChatMessage> {
        let slot = self.slot(user);
        let entries = slot.entries.lock();

        let user_turns: Vec<&ConversationEntry> =
            entries.iter().filter(|e| e.role == Role::User).collect();
        let assistant_turns: Vec<&ConversationEntry> = entries
            .iter()
            .filter(|e| e.role == Role::Assistant)
            .collect();

        let mut summary = Vec::with_capacity(user_turns.len() + assistant_turns.len());
        for (question, answer) in user_turns.iter().zip(assistant_turns.iter()) {
            summary.push(ChatMessage::user(question.content.clone()));
            summary.push(ChatMessage::assistant(answer.content.clone()));
        }
        if user_turns.len() > assistant_turns.len() {
            for question in &user_turns[assistant_turns.len()..] {
                summary.push(ChatMessage::user(question.content.clone()));
            }
        }

        debug!(user, messages = summary.len(), "built conversation summary");
        summary
    }

    /// Replace `user`'s entire history.
    ///
    /// Every entry is validated before any mutation: the first invalid entry
    /// rejects the whole call and leaves the store untouched.
    pub fn replace(&self, user: u64, entries: Vec<ConversationEntry>) -> Result<(), GatewayError> {
        for (index, entry) in entries.iter().enumerate() {
            if entry.content.trim().is_empty() {
                return Err(GatewayError::validation(format!(
                    "entry {index} has empty content"
                )));
            }
        }

        let slot = self.slot(user);
        let mut current = slot.entries.lock();
        *current = entries;
        let overflow = current.len().saturating_sub(self.max_history);
        if overflow > 0 {
            current.drain(..overflow);
            info!(user, removed = overflow, "truncated replaced conversation");
        }
        debug!(user, total = current.len(), "replaced conversation history");
        Ok(())
    }

    /// Drop `user`'s history, returning how many entries were removed.
    pub fn clear(&self, user: u64) -> usize {
        let slot = self.slot(user);
        let mut entries = slot.entries.lock();
        let cleared = entries.len();
        entries.clear();
        info!(user, cleared, "cleared conversation history");
        cleared
    }

    /// The service used by the most recent assistant reply within the last
    /// `lookback` entries, if any recorded one. Drives sticky routing for
    /// follow-up messages.
    pub fn recent_service(&self, user: u64, lookback: usize) -> Option<ServiceKind> {
        let slot = self.slot(user);
        let entries = slot.entries.lock();
        let start = entries.len().saturating_sub(lookback);
        entries[start..]
            .iter()
            .rev()
            .find(|e| e.role == Role::Assistant)
            .and_then(|e| e.metadata.as_ref()?.service_used)
    }

    pub fn stats(&self) -> StoreStats {
        let slots = self.slots.read();
        let mut active_users = 0;
        let mut total_entries = 0;
        for slot in slots.values() {
            let len = slot.entries.lock().len();
            if len > 0 {
                active_users += 1;
            }
            total_entries += len;
        }
        StoreStats {
            active_users,
            total_entries,
            tracked_slots: slots.len(),
        }
    }

    /// Reclaim lock slots for users with no history.
    ///
    /// Runs opportunistically from [`read`](Self::read) at most once per
    /// sweep interval; pass `force` to run immediately. A slot is only
    /// removed when the table holds the sole reference to it, so an
    /// in-flight operation can never lose an append to the sweep.
    pub fn sweep_idle_slots(&self, force: bool) -> usize {
        {
            let mut last_sweep = self.last_sweep.lock();
            if !force && last_sweep.elapsed() < self.sweep_interval {
                return 0;
            }
            *last_sweep = Instant::now();
        }

        let mut slots = self.slots.write();
        let before = slots.len();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1 || !slot.entries.lock().is_empty());
        let removed = before - slots.len();
        if removed > 0 {
            debug!(removed, "swept idle per-user lock slots");
        }
        removed
    }
}
