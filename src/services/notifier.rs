use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionStatus {
    #[default]
    Undetermined,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub data: Option<serde_json::Value>,
}

/// Delivery backend for local notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn permission_status(&self) -> PermissionStatus;

    async fn request_permission(&self) -> PermissionStatus;

    /// Show the notification now.
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Helper {
    NotifySend,
    Osascript,
}

impl Helper {
    fn program(self) -> &'static str {
        match self {
            Self::NotifySend => "notify-send",
            Self::Osascript => "osascript",
        }
    }
}

/// Desktop notifications through the platform's command-line helper
/// (`notify-send` on Linux, `osascript` on macOS). Permission is granted
/// when the helper is installed.
pub struct DesktopNotifier {
    helper: Option<(Helper, PathBuf)>,
}

impl DesktopNotifier {
    pub fn detect() -> Self {
        let helper = if cfg!(target_os = "macos") {
            Helper::Osascript
        } else {
            Helper::NotifySend
        };
        let helper = find_on_path(helper.program()).map(|path| (helper, path));
        if helper.is_none() {
            tracing::debug!("No desktop notification helper found on PATH");
        }
        Self { helper }
    }

    pub fn is_available(&self) -> bool {
        self.helper.is_some()
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn permission_status(&self) -> PermissionStatus {
        if self.is_available() {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    async fn request_permission(&self) -> PermissionStatus {
        // Nothing to prompt for on the desktop
        self.permission_status().await
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let Some((helper, path)) = &self.helper else {
            return Err(anyhow::anyhow!("No desktop notification helper available").into());
        };

        let mut command = Command::new(path);
        match helper {
            Helper::NotifySend => {
                command
                    .arg("--app-name=topic-feed")
                    .arg(&notification.title)
                    .arg(&notification.body);
            }
            Helper::Osascript => {
                let script = format!(
                    "display notification \"{}\" with title \"{}\"",
                    escape_applescript(&notification.body),
                    escape_applescript(&notification.title)
                );
                command.arg("-e").arg(script);
            }
        }

        if let Some(data) = &notification.data {
            tracing::debug!("Notification data: {}", data);
        }

        let status = command.status().await?;
        if !status.success() {
            return Err(anyhow::anyhow!("{} exited with {}", helper.program(), status).into());
        }
        Ok(())
    }
}

/// Writes notifications to the log. Used when running headless.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn permission_status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        tracing::info!("{}: {}", notification.title, notification.body);
        Ok(())
    }
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn escape_applescript(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applescript_quotes_are_escaped() {
        assert_eq!(escape_applescript(r#"say "hi" \ bye"#), r#"say \"hi\" \\ bye"#);
    }

    #[tokio::test]
    async fn missing_helper_means_denied() {
        let notifier = DesktopNotifier { helper: None };
        assert_eq!(notifier.request_permission().await, PermissionStatus::Denied);
        let notification = Notification {
            title: "t".to_string(),
            body: "b".to_string(),
            data: None,
        };
        assert!(notifier.deliver(&notification).await.is_err());
    }

    #[tokio::test]
    async fn log_notifier_always_delivers() {
        let notification = Notification {
            title: "t".to_string(),
            body: "b".to_string(),
            data: Some(serde_json::json!({ "newArticleCount": 1 })),
        };
        assert!(LogNotifier.deliver(&notification).await.is_ok());
        assert_eq!(LogNotifier.permission_status().await, PermissionStatus::Granted);
    }
}
