//! Desktop notification seam
//!
//! The store announces new mail through a [`Notifier`] and keeps the
//! returned handle so the notification can be withdrawn once the
//! message is viewed or deleted.

use std::time::Duration;

use trapline_client::MessageSummary;

use crate::settings::PreferenceStore;
use crate::{CoreError, CoreResult};

/// How long a new-mail notification stays on screen
pub const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether the platform lets us show notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; the user has to be asked
    Prompt,
}

/// Content of a new-mail notification
#[derive(Debug, Clone, PartialEq)]
pub struct MessageNotification {
    pub title: String,
    pub body: String,
    pub timeout: Duration,
}

impl MessageNotification {
    pub fn for_message(summary: &MessageSummary) -> Self {
        Self {
            title: summary.subject.clone(),
            body: format!(
                "From {} to {}",
                summary.sender,
                summary.recipients.to.join(", ")
            ),
            timeout: NOTIFICATION_TIMEOUT,
        }
    }
}

/// A notification currently on screen
pub trait NotificationHandle: Send {
    /// Withdraw the notification
    fn dismiss(self: Box<Self>);
}

/// Shows desktop notifications
pub trait Notifier: Send + Sync {
    /// Whether this platform supports notifications at all
    fn available(&self) -> bool;

    fn permission(&self) -> Permission;

    /// Ask the user for permission and report the outcome
    fn request_permission(&self) -> Permission;

    fn show(&self, notification: &MessageNotification) -> CoreResult<Box<dyn NotificationHandle>>;
}

/// Notifier for headless use; never shows anything
#[derive(Debug, Default)]
pub struct NoopNotifier;

struct NoopHandle;

impl NotificationHandle for NoopHandle {
    fn dismiss(self: Box<Self>) {}
}

impl Notifier for NoopNotifier {
    fn available(&self) -> bool {
        false
    }

    fn permission(&self) -> Permission {
        Permission::Denied
    }

    fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    fn show(&self, _notification: &MessageNotification) -> CoreResult<Box<dyn NotificationHandle>> {
        Ok(Box::new(NoopHandle))
    }
}

/// Notifications are on when the user enabled them and the platform allows it
pub fn notifications_enabled(prefs: &PreferenceStore, notifier: &dyn Notifier) -> bool {
    notifier.available() && prefs.notifications() && notifier.permission() == Permission::Granted
}

/// Flip the notification preference, asking for permission if needed.
///
/// Returns the new effective state.
pub fn toggle_notifications(prefs: &PreferenceStore, notifier: &dyn Notifier) -> CoreResult<bool> {
    if !notifier.available() {
        return Err(CoreError::NotificationError(
            "desktop notifications are not available".to_string(),
        ));
    }

    match notifier.permission() {
        Permission::Denied => Err(CoreError::PermissionDenied),
        Permission::Granted => {
            prefs.set_notifications(!prefs.notifications())?;
            Ok(notifications_enabled(prefs, notifier))
        }
        Permission::Prompt => {
            let granted = notifier.request_permission() == Permission::Granted;
            prefs.set_notifications(granted)?;
            Ok(notifications_enabled(prefs, notifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedNotifier {
        permission: Mutex<Permission>,
        answer: Permission,
    }

    impl ScriptedNotifier {
        fn new(permission: Permission, answer: Permission) -> Self {
            Self {
                permission: Mutex::new(permission),
                answer,
            }
        }
    }

    impl Notifier for ScriptedNotifier {
        fn available(&self) -> bool {
            true
        }

        fn permission(&self) -> Permission {
            *self.permission.lock().unwrap()
        }

        fn request_permission(&self) -> Permission {
            *self.permission.lock().unwrap() = self.answer;
            self.answer
        }

        fn show(&self, _: &MessageNotification) -> CoreResult<Box<dyn NotificationHandle>> {
            Ok(Box::new(NoopHandle))
        }
    }

    fn temp_prefs() -> (tempfile::TempDir, PreferenceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::load(dir.path().join("preferences.json"));
        (dir, store)
    }

    #[test]
    fn test_toggle_when_granted() {
        let (_dir, prefs) = temp_prefs();
        let notifier = ScriptedNotifier::new(Permission::Granted, Permission::Granted);

        assert!(toggle_notifications(&prefs, &notifier).unwrap());
        assert!(notifications_enabled(&prefs, &notifier));
        assert!(!toggle_notifications(&prefs, &notifier).unwrap());
        assert!(!prefs.notifications());
    }

    #[test]
    fn test_toggle_when_denied() {
        let (_dir, prefs) = temp_prefs();
        let notifier = ScriptedNotifier::new(Permission::Denied, Permission::Denied);

        assert!(matches!(
            toggle_notifications(&prefs, &notifier),
            Err(CoreError::PermissionDenied)
        ));
        assert!(!prefs.notifications());
    }

    #[test]
    fn test_toggle_prompts_user() {
        let (_dir, prefs) = temp_prefs();
        let accepts = ScriptedNotifier::new(Permission::Prompt, Permission::Granted);
        assert!(toggle_notifications(&prefs, &accepts).unwrap());
        assert!(prefs.notifications());

        let (_dir, prefs) = temp_prefs();
        let refuses = ScriptedNotifier::new(Permission::Prompt, Permission::Denied);
        assert!(!toggle_notifications(&prefs, &refuses).unwrap());
        assert!(!prefs.notifications());
    }

    #[test]
    fn test_enabled_requires_permission() {
        let (_dir, prefs) = temp_prefs();
        prefs.set_notifications(true).unwrap();

        let prompt = ScriptedNotifier::new(Permission::Prompt, Permission::Granted);
        assert!(!notifications_enabled(&prefs, &prompt));
        assert!(!notifications_enabled(&prefs, &NoopNotifier));
    }
}
