//! Rain-alert message rendering and delivery.
//!
//! This crate provides:
//! - `NotificationChannel` trait for pluggable delivery channels
//! - WhatsApp (Twilio), webhook and dry-run log channel implementations
//! - Minijinja rendering of forecast predictions into alert messages

pub mod dry_run;
pub mod templating;
pub mod traits;
pub mod webhook;
pub mod whatsapp;

pub use dry_run::LogChannel;
pub use templating::MessageRenderer;
pub use traits::{NotificationChannel, NotifyError, SendOutcome};
pub use webhook::WebhookChannel;
pub use whatsapp::WhatsAppChannel;
