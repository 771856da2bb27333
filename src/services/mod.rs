mod background;
mod notifications;
pub mod notifier;

pub use background::BackgroundScheduler;
pub use notifications::NotificationService;
pub use notifier::{DesktopNotifier, LogNotifier, Notifier};
