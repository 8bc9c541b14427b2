//! # inboxpilot-classify
//!
//! Intent classification for inboxpilot.
//!
//! Maps free-text messenger content to a structured [`Intent`] via an
//! external chat-completion model, with deterministic post-parse correction
//! (date dominance) and a conservative fallback when the model cannot be
//! reached or replies with garbage.
//!
//! ## Quick start
//!
//! ```ignore
//! use inboxpilot_classify::{IntentClassifier, LlmClassifier, LlmClient, LlmClientConfig};
//!
//! let client = LlmClient::new(LlmClientConfig::openai(api_key, "gpt-4o"))?;
//! let classifier = LlmClassifier::new(client);
//! let intent = classifier.classify(content, sender, title).await;
//! ```

pub mod classifier;
pub mod error;
pub mod intent;
pub mod llm;

pub use classifier::{IntentClassifier, LlmClassifier};
pub use error::{ClassifyError, ClassifyResult};
pub use intent::{CalendarIntent, InfoIntent, Intent, Priority, RawClassification, TodoIntent};
pub use llm::{LlmClient, LlmClientConfig, LlmProvider};
