//! Event pipeline: classification, deduplication, context enrichment and relay.
//!
//! Platform adapters translate their native events into
//! [`shaperelay_core::types::PlatformEvent`] and hand them to
//! [`Dispatcher::dispatch`]. Everything below this module is platform-agnostic;
//! the adapter supplies side effects through [`ChatPlatform`].

pub mod classify;
pub mod context;
pub mod dedup;
pub mod dispatch;
pub mod platform;
pub mod status;

pub use classify::{classify, prepare_content, Action, ReplyMode};
pub use context::{build_context, render_transcript};
pub use dedup::DedupLedger;
pub use dispatch::{fallback_notice, Delivery, Dispatcher, DropReason, Outcome};
pub use platform::{ChatPlatform, PlatformError};
