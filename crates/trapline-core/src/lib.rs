//! Core inbox logic for Trapline
//!
//! Provides the message store, the live-sync engine, and preferences.

mod error;
pub mod notifications;
mod settings;
mod store;
mod sync;

#[cfg(test)]
mod testing;

pub use error::{CoreError, CoreResult};
pub use notifications::{
    notifications_enabled, toggle_notifications, MessageNotification, NoopNotifier,
    NotificationHandle, Notifier, Permission,
};
pub use settings::{PreferenceStore, Preferences};
pub use store::{Message, MessageStore};
pub use sync::{SyncCommand, SyncEngine, SyncEvent};
