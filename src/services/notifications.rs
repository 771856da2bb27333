use std::sync::Arc;

use chrono::{Local, NaiveTime};
use tokio::sync::Mutex;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{Article, NotificationSettings, Topic};

use super::notifier::{Notification, Notifier, PermissionStatus};

pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    repository: Arc<Repository>,
    permission: Mutex<PermissionStatus>,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>, repository: Arc<Repository>) -> Self {
        Self {
            notifier,
            repository,
            permission: Mutex::new(PermissionStatus::Undetermined),
        }
    }

    /// Ask for permission unless it was already granted. Returns whether
    /// notifications may be shown.
    pub async fn request_permissions(&self) -> bool {
        let mut cached = self.permission.lock().await;
        if *cached == PermissionStatus::Granted {
            return true;
        }

        let existing = self.notifier.permission_status().await;
        let status = if existing == PermissionStatus::Granted {
            existing
        } else {
            self.notifier.request_permission().await
        };

        *cached = status;
        status == PermissionStatus::Granted
    }

    /// Deliver immediately, without consulting settings.
    pub async fn send(
        &self,
        title: &str,
        body: &str,
        data: Option<serde_json::Value>,
    ) -> Result<()> {
        let notification = Notification {
            title: title.to_string(),
            body: body.to_string(),
            data,
        };
        self.notifier.deliver(&notification).await
    }

    /// Announce a refresh that produced new articles. Returns whether a
    /// notification was delivered.
    pub async fn notify_new_articles(&self, articles: &[Article], topics: &[Topic]) -> Result<bool> {
        let settings = self.repository.get_notification_settings().await;
        self.notify_new_articles_at(&settings, articles, topics, Local::now().time())
            .await
    }

    async fn notify_new_articles_at(
        &self,
        settings: &NotificationSettings,
        articles: &[Article],
        topics: &[Topic],
        now: NaiveTime,
    ) -> Result<bool> {
        if !settings.enabled {
            tracing::debug!("Notifications disabled, skipping");
            return Ok(false);
        }

        if settings.quiet_hours.contains(now) {
            tracing::debug!("Inside quiet hours, skipping notification");
            return Ok(false);
        }

        let count = articles
            .iter()
            .filter(|article| {
                topics
                    .iter()
                    .find(|t| t.id == article.topic_id)
                    .map(|t| t.notifications_enabled)
                    .unwrap_or(true)
            })
            .count();
        if count == 0 {
            return Ok(false);
        }

        if !self.request_permissions().await {
            tracing::debug!("Notification permission not granted");
            return Ok(false);
        }

        self.send(
            "New Articles Available",
            &format!("Found {count} new articles across your topics"),
            Some(serde_json::json!({ "newArticleCount": count })),
        )
        .await?;
        Ok(true)
    }
}
