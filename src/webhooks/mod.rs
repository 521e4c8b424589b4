//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Parsing of payloads into triggers for the engine

pub mod parser;
pub mod signature;

pub use parser::{EventKind, OwnChecks, ParseError, Trigger, parse_webhook};
pub use signature::WebhookSecret;
