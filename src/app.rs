use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::{RefreshMode, RefreshOutcome, RefreshSettings, Refresher};
use crate::models::article::{self, sort_by_published_desc};
use crate::models::settings::parse_hhmm;
use crate::models::topic::{self, topic_name};
use crate::models::{Article, ArticleFilter, NotificationSettings, Topic, TopicDraft};
use crate::search::ExaClient;
use crate::services::{BackgroundScheduler, NotificationService, Notifier};
use crate::tui::{AppAction, KeyContext, Screen};

/// Explicitly constructed service graph shared by the TUI and headless modes.
pub struct Services {
    pub repository: Arc<Repository>,
    pub client: Arc<ExaClient>,
    pub notifications: Arc<NotificationService>,
    pub refresher: Arc<Refresher>,
    pub scheduler: BackgroundScheduler,
}

impl Services {
    pub async fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let repository = Arc::new(Repository::new(&config.db_path).await?);
        let client = Arc::new(ExaClient::new(
            config.api_key().map(str::to_string),
            &config.api_base_url,
        )?);
        let notifications = Arc::new(NotificationService::new(notifier, Arc::clone(&repository)));
        let refresher = Arc::new(Refresher::new(
            Arc::clone(&repository),
            Arc::clone(&client),
            Arc::clone(&notifications),
            RefreshSettings::from(config),
        ));
        let scheduler = BackgroundScheduler::new(Arc::clone(&refresher));

        Ok(Self {
            repository,
            client,
            notifications,
            refresher,
            scheduler,
        })
    }

    /// Register or drop the background refresh to match the stored settings.
    pub async fn apply_background_settings(&self, settings: &NotificationSettings) -> bool {
        if !settings.enabled {
            self.scheduler.unregister();
            return true;
        }
        if !self.notifications.request_permissions().await {
            return false;
        }
        self.scheduler.register(settings.frequency.interval());
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicField {
    Name,
    Query,
    Notifications,
}

impl TopicField {
    fn next(self) -> Self {
        match self {
            Self::Name => Self::Query,
            Self::Query => Self::Notifications,
            Self::Notifications => Self::Name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicForm {
    /// Id of the topic being edited; `None` when adding.
    pub editing: Option<String>,
    pub draft: TopicDraft,
    pub field: TopicField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    QuietStart,
    QuietEnd,
    ApiKey,
}

impl SettingField {
    pub fn label(self) -> &'static str {
        match self {
            Self::QuietStart => "Quiet hours start (HH:MM)",
            Self::QuietEnd => "Quiet hours end (HH:MM)",
            Self::ApiKey => "Exa API key",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextInput {
    Topic(TopicForm),
    Setting { field: SettingField, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
    DeleteTopic { id: String, name: String },
    ClearData,
}

pub struct App {
    // Data
    pub topics: Vec<Topic>,
    /// Newest first.
    pub articles: Vec<Article>,
    pub settings: NotificationSettings,
    pub last_sync: Option<DateTime<Utc>>,

    // UI State
    pub screen: Screen,
    pub filter: ArticleFilter,
    pub feed_index: usize,
    pub topic_index: usize,
    pub show_help: bool,
    pub input: Option<TextInput>,
    pub confirm: Option<Confirm>,
    pub status: Option<String>,

    // Async state
    pub is_refreshing: bool,
    refresh_rx: mpsc::Receiver<Result<RefreshOutcome>>,
    refresh_tx: mpsc::Sender<Result<RefreshOutcome>>,

    // Services
    config: Config,
    services: Services,
}

impl App {
    pub async fn new(config: Config, services: Services) -> Result<Self> {
        let topics = services.repository.get_topics().await;
        let mut articles = services.repository.get_articles().await;
        sort_by_published_desc(&mut articles);
        let settings = services.repository.get_notification_settings().await;
        let last_sync = services.repository.get_last_sync().await;

        let (refresh_tx, refresh_rx) = mpsc::channel(1);

        let mut app = Self {
            topics,
            articles,
            settings,
            last_sync,
            screen: Screen::Feed,
            filter: ArticleFilter::All,
            feed_index: 0,
            topic_index: 0,
            show_help: false,
            input: None,
            confirm: None,
            status: None,
            is_refreshing: false,
            refresh_rx,
            refresh_tx,
            config,
            services,
        };

        if !app.services.client.has_api_key() {
            app.status = Some(format!(
                "No Exa API key configured. Press 3 then K, or set {}.",
                crate::config::API_KEY_ENV
            ));
        }

        let settings = app.settings.clone();
        if !app.services.apply_background_settings(&settings).await {
            tracing::warn!("Notification permission not granted, background refresh not registered");
        }

        Ok(app)
    }

    pub fn key_context(&self) -> KeyContext {
        if self.show_help {
            KeyContext::Help
        } else if self.confirm.is_some() {
            KeyContext::Confirm
        } else if self.input.is_some() {
            KeyContext::TextInput
        } else {
            KeyContext::Normal(self.screen)
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.services.client.has_api_key()
    }

    pub fn filtered_articles(&self) -> Vec<&Article> {
        self.articles
            .iter()
            .filter(|a| self.filter.matches(a))
            .collect()
    }

    pub fn selected_article(&self) -> Option<&Article> {
        self.filtered_articles().get(self.feed_index).copied()
    }

    pub fn selected_topic(&self) -> Option<&Topic> {
        self.topics.get(self.topic_index)
    }

    pub fn topic_name(&self, topic_id: &str) -> &str {
        topic_name(&self.topics, topic_id)
    }

    pub async fn handle_action(&mut self, action: AppAction) -> Result<bool> {
        match action {
            AppAction::Quit => return Ok(true),

            AppAction::NextScreen => self.screen = self.screen.next(),
            AppAction::ShowScreen(screen) => self.screen = screen,
            AppAction::ShowHelp => self.show_help = true,
            AppAction::HideHelp => self.show_help = false,

            AppAction::MoveUp => match self.screen {
                Screen::Feed => self.feed_index = self.feed_index.saturating_sub(1),
                Screen::Topics => self.topic_index = self.topic_index.saturating_sub(1),
                Screen::Settings => {}
            },

            AppAction::MoveDown => match self.screen {
                Screen::Feed => {
                    let len = self.filtered_articles().len();
                    if len > 0 && self.feed_index < len - 1 {
                        self.feed_index += 1;
                    }
                }
                Screen::Topics => {
                    let len = self.topics.len();
                    if len > 0 && self.topic_index < len - 1 {
                        self.topic_index += 1;
                    }
                }
                Screen::Settings => {}
            },

            AppAction::RefreshFeed => self.start_refresh(),
            AppAction::OpenArticle => self.open_selected_article().await,
            AppAction::ToggleRead => self.toggle_selected_read().await,
            AppAction::CycleFilter => {
                self.filter = self.filter.cycle();
                self.feed_index = 0;
            }

            AppAction::AddTopic => {
                self.input = Some(TextInput::Topic(TopicForm {
                    editing: None,
                    draft: TopicDraft::default(),
                    field: TopicField::Name,
                }));
            }
            AppAction::EditTopic => {
                if let Some(topic) = self.selected_topic() {
                    self.input = Some(TextInput::Topic(TopicForm {
                        editing: Some(topic.id.clone()),
                        draft: TopicDraft::from_topic(topic),
                        field: TopicField::Name,
                    }));
                }
            }
            AppAction::DeleteTopic => {
                if let Some(topic) = self.selected_topic() {
                    self.confirm = Some(Confirm::DeleteTopic {
                        id: topic.id.clone(),
                        name: topic.name.clone(),
                    });
                }
            }
            AppAction::ToggleTopicActive => {
                if let Some(id) = self.selected_topic().map(|t| t.id.clone()) {
                    let result = topic::toggle_topic_active(&mut self.topics, &id, Utc::now());
                    self.finish_topic_change(result.map(|_| ()), "Failed to update topic")
                        .await;
                }
            }
            AppAction::ToggleTopicNotifications => {
                if let Some(id) = self.selected_topic().map(|t| t.id.clone()) {
                    let result =
                        topic::toggle_topic_notifications(&mut self.topics, &id, Utc::now());
                    self.finish_topic_change(result.map(|_| ()), "Failed to update topic")
                        .await;
                }
            }

            AppAction::ToggleNotifications => self.settings.enabled = !self.settings.enabled,
            AppAction::CycleFrequency => {
                self.settings.frequency = self.settings.frequency.cycle();
            }
            AppAction::ToggleQuietHours => {
                self.settings.quiet_hours.enabled = !self.settings.quiet_hours.enabled;
            }
            AppAction::EditQuietStart => {
                self.input = Some(TextInput::Setting {
                    field: SettingField::QuietStart,
                    value: self.settings.quiet_hours.start.clone(),
                });
            }
            AppAction::EditQuietEnd => {
                self.input = Some(TextInput::Setting {
                    field: SettingField::QuietEnd,
                    value: self.settings.quiet_hours.end.clone(),
                });
            }
            AppAction::EditApiKey => {
                self.input = Some(TextInput::Setting {
                    field: SettingField::ApiKey,
                    value: String::new(),
                });
            }
            AppAction::SaveSettings => self.save_settings().await,
            AppAction::ClearData => self.confirm = Some(Confirm::ClearData),

            AppAction::InputChar(c) => self.input_char(c),
            AppAction::InputBackspace => self.input_backspace(),
            AppAction::InputNextField => {
                if let Some(TextInput::Topic(form)) = &mut self.input {
                    form.field = form.field.next();
                }
            }
            AppAction::InputConfirm => self.confirm_input().await,
            AppAction::InputCancel => self.input = None,

            AppAction::ConfirmYes => {
                if let Some(confirm) = self.confirm.take() {
                    self.apply_confirm(confirm).await;
                }
            }
            AppAction::ConfirmNo => self.confirm = None,
        }

        Ok(false)
    }

    fn start_refresh(&mut self) {
        if self.is_refreshing {
            return;
        }
        self.is_refreshing = true;
        self.status = Some("Refreshing...".to_string());

        let refresher = Arc::clone(&self.services.refresher);
        let tx = self.refresh_tx.clone();
        tokio::spawn(async move {
            let result = refresher.refresh(RefreshMode::Interactive).await;
            let _ = tx.send(result).await;
        });
    }

    /// Poll for a completed refresh (non-blocking)
    pub async fn poll_refresh_result(&mut self) -> Result<()> {
        let Ok(result) = self.refresh_rx.try_recv() else {
            return Ok(());
        };
        self.is_refreshing = false;

        self.status = Some(match result {
            Ok(RefreshOutcome::NoActiveTopics) => {
                "No active topics: add and activate topics in the Topics tab.".to_string()
            }
            Ok(RefreshOutcome::NoNewArticles) => {
                "No new articles found for your topics.".to_string()
            }
            Ok(RefreshOutcome::NewArticles(count)) => format!("Found {count} new articles!"),
            Err(e) => {
                tracing::error!("Error fetching new articles: {}", e);
                format!("Failed to fetch new articles ({}): {}", e.kind(), e)
            }
        });

        self.reload_articles().await;
        self.last_sync = self.services.repository.get_last_sync().await;
        Ok(())
    }

    async fn reload_articles(&mut self) {
        self.articles = self.services.repository.get_articles().await;
        sort_by_published_desc(&mut self.articles);
        let len = self.filtered_articles().len();
        if self.feed_index >= len {
            self.feed_index = len.saturating_sub(1);
        }
    }

    async fn open_selected_article(&mut self) {
        let Some(article) = self.selected_article() else {
            return;
        };
        let id = article.id.clone();
        let url = article.url.clone();

        if let Err(e) = open::that(&url) {
            tracing::warn!("Failed to open {}: {}", url, e);
            self.status = Some("Unable to open article".to_string());
            return;
        }

        if article::mark_read(&mut self.articles, &id) {
            self.persist_read_flag(&id, true).await;
        }
    }

    async fn toggle_selected_read(&mut self) {
        let Some(id) = self.selected_article().map(|a| a.id.clone()) else {
            return;
        };
        if let Some(is_read) = article::toggle_read(&mut self.articles, &id) {
            self.persist_read_flag(&id, is_read).await;
        }
    }

    /// Writes the read flag onto the stored collection rather than the
    /// display copy, so articles a refresh adds meanwhile are kept.
    async fn persist_read_flag(&mut self, id: &str, is_read: bool) {
        if let Err(e) = self.services.refresher.set_read(id, is_read).await {
            tracing::error!("Error saving articles: {}", e);
            self.status = Some("Failed to save read state".to_string());
        }
    }

    async fn finish_topic_change(&mut self, result: Result<()>, failure: &str) {
        if let Err(e) = result {
            tracing::error!("{}: {}", failure, e);
            self.status = Some(e.to_string());
            return;
        }
        if let Err(e) = self.services.repository.save_topics(&self.topics).await {
            tracing::error!("Error saving topics: {}", e);
            self.status = Some(failure.to_string());
        }
        if self.topic_index >= self.topics.len() {
            self.topic_index = self.topics.len().saturating_sub(1);
        }
    }

    fn input_char(&mut self, c: char) {
        match &mut self.input {
            Some(TextInput::Topic(form)) => match form.field {
                TopicField::Name => form.draft.name.push(c),
                TopicField::Query => form.draft.query.push(c),
                TopicField::Notifications => {
                    if c == ' ' {
                        form.draft.notifications_enabled = !form.draft.notifications_enabled;
                    }
                }
            },
            Some(TextInput::Setting { value, .. }) => value.push(c),
            None => {}
        }
    }

    fn input_backspace(&mut self) {
        match &mut self.input {
            Some(TextInput::Topic(form)) => match form.field {
                TopicField::Name => {
                    form.draft.name.pop();
                }
                TopicField::Query => {
                    form.draft.query.pop();
                }
                TopicField::Notifications => {}
            },
            Some(TextInput::Setting { value, .. }) => {
                value.pop();
            }
            None => {}
        }
    }

    async fn confirm_input(&mut self) {
        let Some(input) = self.input.take() else {
            return;
        };

        match input {
            TextInput::Topic(form) => {
                let now = Utc::now();
                let result = match &form.editing {
                    Some(id) => topic::update_topic(&mut self.topics, id, &form.draft, now),
                    None => topic::add_topic(&mut self.topics, &form.draft, now).map(|_| ()),
                };
                if let Err(e) = &result {
                    // Keep the form open so the user can fix it
                    self.status = Some(e.to_string());
                    self.input = Some(TextInput::Topic(form));
                    return;
                }
                self.finish_topic_change(result, "Failed to save topic").await;
                self.status = None;
            }
            TextInput::Setting { field, value } => match field {
                SettingField::QuietStart | SettingField::QuietEnd => {
                    if parse_hhmm(&value).is_none() {
                        self.status = Some("Use HH:MM, e.g. 22:00".to_string());
                        self.input = Some(TextInput::Setting { field, value });
                        return;
                    }
                    let value = value.trim().to_string();
                    if field == SettingField::QuietStart {
                        self.settings.quiet_hours.start = value;
                    } else {
                        self.settings.quiet_hours.end = value;
                    }
                }
                SettingField::ApiKey => self.save_api_key(value),
            },
        }
    }

    fn save_api_key(&mut self, value: String) {
        let key = value.trim().to_string();
        if key.is_empty() {
            self.status = Some("Please enter a valid API key".to_string());
            return;
        }

        self.services.client.set_api_key(Some(key.clone()));
        self.config.exa_api_key = Some(key);
        match self.config.save() {
            Ok(()) => self.status = Some("API key saved successfully".to_string()),
            Err(e) => {
                tracing::error!("Failed to write config: {}", e);
                self.status = Some("API key set for this session (config not writable)".to_string());
            }
        }
    }

    async fn save_settings(&mut self) {
        if let Err(e) = self
            .services
            .repository
            .save_notification_settings(&self.settings)
            .await
        {
            tracing::error!("Error saving notification settings: {}", e);
            self.status = Some("Failed to save settings".to_string());
            return;
        }

        if !self.services.apply_background_settings(&self.settings).await {
            self.status = Some(
                "Permission Required: install a desktop notification helper (notify-send) to receive updates."
                    .to_string(),
            );
            return;
        }

        self.status = Some("Settings saved successfully".to_string());
    }

    async fn apply_confirm(&mut self, confirm: Confirm) {
        match confirm {
            Confirm::DeleteTopic { id, .. } => {
                let result = topic::remove_topic(&mut self.topics, &id).map(|_| ());
                self.finish_topic_change(result, "Failed to delete topic").await;
            }
            Confirm::ClearData => {
                if let Err(e) = self.services.repository.clear_all().await {
                    tracing::error!("Error clearing all data: {}", e);
                    self.status = Some("Failed to clear data".to_string());
                    return;
                }
                self.topics.clear();
                self.articles.clear();
                self.settings = NotificationSettings::default();
                self.last_sync = None;
                self.feed_index = 0;
                self.topic_index = 0;

                if !self.services.apply_background_settings(&self.settings).await {
                    self.status = Some(
                        "All data cleared. Permission Required: install a desktop notification helper (notify-send) to receive updates."
                            .to_string(),
                    );
                    return;
                }
                self.status = Some("All data cleared successfully".to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifier::testing::RecordingNotifier;
    use tempfile::TempDir;

    async fn test_app() -> (TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: dir.path().join("feed.db").to_string_lossy().to_string(),
            exa_api_key: Some("test-key".to_string()),
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        let notifier = Arc::new(RecordingNotifier::granted());
        let services = Services::new(&config, notifier).await.unwrap();
        let app = App::new(config, services).await.unwrap();
        (dir, app)
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_action(AppAction::InputChar(c)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn startup_registers_background_refresh_by_default() {
        let (_dir, app) = test_app().await;
        assert!(app.services.scheduler.is_registered());
    }

    #[tokio::test]
    async fn adding_a_topic_through_the_form_persists_it() {
        let (_dir, mut app) = test_app().await;
        app.handle_action(AppAction::AddTopic).await.unwrap();
        type_text(&mut app, "Rust").await;
        app.handle_action(AppAction::InputNextField).await.unwrap();
        type_text(&mut app, "rust language news").await;
        app.handle_action(AppAction::InputConfirm).await.unwrap();

        assert!(app.input.is_none());
        assert_eq!(app.topics.len(), 1);
        let stored = app.services.repository.get_topics().await;
        assert_eq!(stored, app.topics);
        assert_eq!(stored[0].query, "rust language news");
    }

    #[tokio::test]
    async fn invalid_topic_keeps_form_open() {
        let (_dir, mut app) = test_app().await;
        app.handle_action(AppAction::AddTopic).await.unwrap();
        type_text(&mut app, "Only a name").await;
        app.handle_action(AppAction::InputConfirm).await.unwrap();

        assert!(matches!(app.input, Some(TextInput::Topic(_))));
        assert!(app.topics.is_empty());
        assert_eq!(
            app.status.as_deref(),
            Some("Please fill in both topic name and search query")
        );
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let (_dir, mut app) = test_app().await;
        app.handle_action(AppAction::AddTopic).await.unwrap();
        type_text(&mut app, "t").await;
        app.handle_action(AppAction::InputNextField).await.unwrap();
        type_text(&mut app, "q").await;
        app.handle_action(AppAction::InputConfirm).await.unwrap();

        app.handle_action(AppAction::DeleteTopic).await.unwrap();
        app.handle_action(AppAction::ConfirmNo).await.unwrap();
        assert_eq!(app.topics.len(), 1);

        app.handle_action(AppAction::DeleteTopic).await.unwrap();
        app.handle_action(AppAction::ConfirmYes).await.unwrap();
        assert!(app.topics.is_empty());
        assert!(app.services.repository.get_topics().await.is_empty());
    }

    #[tokio::test]
    async fn disabling_notifications_unregisters_background_refresh() {
        let (_dir, mut app) = test_app().await;
        app.handle_action(AppAction::ToggleNotifications).await.unwrap();
        app.handle_action(AppAction::SaveSettings).await.unwrap();

        assert!(!app.services.scheduler.is_registered());
        assert!(!app.services.repository.get_notification_settings().await.enabled);
        assert_eq!(app.status.as_deref(), Some("Settings saved successfully"));
    }

    #[tokio::test]
    async fn quiet_hours_input_is_validated() {
        let (_dir, mut app) = test_app().await;
        app.handle_action(AppAction::EditQuietStart).await.unwrap();
        for _ in 0..5 {
            app.handle_action(AppAction::InputBackspace).await.unwrap();
        }
        type_text(&mut app, "25:99").await;
        app.handle_action(AppAction::InputConfirm).await.unwrap();
        assert!(app.input.is_some());
        assert_eq!(app.settings.quiet_hours.start, "22:00");

        app.handle_action(AppAction::InputCancel).await.unwrap();
        app.handle_action(AppAction::EditQuietStart).await.unwrap();
        for _ in 0..5 {
            app.handle_action(AppAction::InputBackspace).await.unwrap();
        }
        type_text(&mut app, "21:30").await;
        app.handle_action(AppAction::InputConfirm).await.unwrap();
        assert_eq!(app.settings.quiet_hours.start, "21:30");
    }

    #[tokio::test]
    async fn refresh_without_topics_reports_no_active_topics() {
        let (_dir, mut app) = test_app().await;
        app.handle_action(AppAction::RefreshFeed).await.unwrap();
        assert!(app.is_refreshing);

        for _ in 0..50 {
            app.poll_refresh_result().await.unwrap();
            if !app.is_refreshing {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(!app.is_refreshing);
        assert!(app
            .status
            .as_deref()
            .unwrap()
            .starts_with("No active topics"));
    }

    #[tokio::test]
    async fn clear_data_resets_everything() {
        let (_dir, mut app) = test_app().await;
        app.handle_action(AppAction::ToggleNotifications).await.unwrap();
        app.handle_action(AppAction::SaveSettings).await.unwrap();
        assert!(!app.services.scheduler.is_registered());

        app.handle_action(AppAction::ClearData).await.unwrap();
        app.handle_action(AppAction::ConfirmYes).await.unwrap();

        assert_eq!(app.settings, NotificationSettings::default());
        assert_eq!(
            app.services.repository.get_notification_settings().await,
            NotificationSettings::default()
        );
        // Defaults have notifications on, so the background refresh is back
        assert!(app.services.scheduler.is_registered());
        assert_eq!(app.status.as_deref(), Some("All data cleared successfully"));
    }

    #[tokio::test]
    async fn toggling_read_persists_to_storage() {
        let (_dir, mut app) = test_app().await;
        let now = Utc::now();
        let stored = Article {
            id: "a.com/1".to_string(),
            title: "Stored".to_string(),
            url: "a.com/1".to_string(),
            description: String::new(),
            topic_id: "t".to_string(),
            published_at: now,
            fetched_at: now,
            is_read: false,
        };
        app.services.repository.save_articles(&[stored]).await.unwrap();
        app.reload_articles().await;

        app.handle_action(AppAction::ToggleRead).await.unwrap();

        assert!(app.articles[0].is_read);
        assert!(app.services.repository.get_articles().await[0].is_read);
    }
}
