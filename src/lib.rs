#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::uninlined_format_args
)]

pub mod cache;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod limits;
pub mod orchestrator;
pub mod reliability;
pub mod services;

pub use config::Config;
pub use conversation::{ConversationEntry, ConversationStore, EntryMetadata, Role};
pub use error::{ErrorKind, GatewayError, ServiceError};
pub use gateway::{GatewayReply, MessageGateway, ServiceSet};
pub use orchestrator::{CitationBlock, ServiceReply};
pub use services::{ChatMessage, ChatService, CompletionRequest, ServiceKind};
