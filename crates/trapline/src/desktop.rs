//! Desktop notifications through the freedesktop notification service

use std::sync::Arc;

use trapline_core::Notifier;

/// The notifier for this platform
pub fn notifier() -> Arc<dyn Notifier> {
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Arc::new(xdg::DesktopNotifier)
    }
    #[cfg(not(all(unix, not(target_os = "macos"))))]
    {
        Arc::new(trapline_core::NoopNotifier)
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
mod xdg {
    use notify_rust::{Notification, Timeout};
    use tracing::debug;
    use trapline_core::{
        CoreError, CoreResult, MessageNotification, NotificationHandle, Notifier, Permission,
    };

    /// Shows notifications on the session bus
    pub struct DesktopNotifier;

    struct Shown(notify_rust::NotificationHandle);

    impl NotificationHandle for Shown {
        fn dismiss(self: Box<Self>) {
            self.0.close();
        }
    }

    impl Notifier for DesktopNotifier {
        fn available(&self) -> bool {
            match notify_rust::get_server_information() {
                Ok(info) => {
                    debug!("Notification server: {} {}", info.name, info.version);
                    true
                }
                Err(e) => {
                    debug!("No notification server: {}", e);
                    false
                }
            }
        }

        // The notification service has no permission model
        fn permission(&self) -> Permission {
            Permission::Granted
        }

        fn request_permission(&self) -> Permission {
            Permission::Granted
        }

        fn show(&self, notification: &MessageNotification) -> CoreResult<Box<dyn NotificationHandle>> {
            let timeout = u32::try_from(notification.timeout.as_millis()).unwrap_or(u32::MAX);
            let handle = Notification::new()
                .appname("trapline")
                .summary(&notification.title)
                .body(&notification.body)
                .icon("mail-unread")
                .timeout(Timeout::Milliseconds(timeout))
                .show()
                .map_err(|e| CoreError::NotificationError(e.to_string()))?;
            Ok(Box::new(Shown(handle)))
        }
    }
}
