//! Reminder delivery for PillBuddy.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `webhook` | ✅ | Webhook notification channel |
//!
//! The [`Notifier`] turns tracker decisions into user-facing text (see
//! [`wording`]) and hands each [`Notification`] to every enabled
//! [`NotificationChannel`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use pillbuddy_messages::Notifier;
//!
//! #[tokio::main]
//! async fn main() {
//!     let notifier = Notifier::console().await;
//!     notifier.return_bottle("pb-1", 2, "Aspirin").await;
//! }
//! ```

pub mod category;
pub mod channels;
pub mod error;
pub mod notification;
pub mod notifier;
pub mod wording;

pub use category::ReminderKind;
pub use channels::{ChannelRegistry, ConsoleChannel, MemoryChannel, NotificationChannel};
pub use error::{Error, Result};
pub use notification::{Notification, NotificationId, Severity};
pub use notifier::{Delivery, Notifier};

#[cfg(feature = "webhook")]
pub use channels::WebhookChannel;
