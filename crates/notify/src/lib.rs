//! Rotation outcome notifications.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Discord-style embed rendering of rotation outcomes
//! - A webhook channel that posts those embeds
//! - `Dispatcher`, which fans an outcome out to every channel and never fails

pub mod dispatcher;
pub mod embed;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use embed::{Embed, WebhookPayload};
pub use traits::{DispatchResult, Notifier, NotifyError};
pub use webhook::WebhookNotifier;
