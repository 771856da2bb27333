use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::models::topic::active_topics;
use crate::models::Article;
use crate::search::{ExaClient, SearchOptions, SearchResult};
use crate::services::NotificationService;

use super::merge::ArticleMerger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// User asked for it: no recency filter, larger result cap.
    Interactive,
    /// Scheduled: only results published since the previous run.
    Background { published_after: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    NoActiveTopics,
    NoNewArticles,
    NewArticles(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSettings {
    pub interactive_results: u32,
    pub background_results: u32,
    pub description_max_length: usize,
    pub text_length: u32,
}

impl From<&Config> for RefreshSettings {
    fn from(config: &Config) -> Self {
        Self {
            interactive_results: config.interactive_results,
            background_results: config.background_results,
            description_max_length: config.description_max_length,
            text_length: config.text_length,
        }
    }
}

pub struct Refresher {
    repository: Arc<Repository>,
    client: Arc<ExaClient>,
    notifications: Arc<NotificationService>,
    settings: RefreshSettings,
    // Held for a whole refresh cycle
    in_flight: Mutex<()>,
    // Held for every read-modify-write of the stored article collection
    articles_write: Mutex<()>,
}

impl Refresher {
    pub fn new(
        repository: Arc<Repository>,
        client: Arc<ExaClient>,
        notifications: Arc<NotificationService>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            repository,
            client,
            notifications,
            settings,
            in_flight: Mutex::new(()),
            articles_write: Mutex::new(()),
        }
    }

    /// Run one refresh cycle over all active topics.
    ///
    /// Any search failure aborts the cycle before anything is written.
    pub async fn refresh(&self, mode: RefreshMode) -> Result<RefreshOutcome> {
        let _guard = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!("Refresh already running, waiting for it to finish");
                self.in_flight.lock().await
            }
        };

        let topics = self.repository.get_topics().await;
        let active = active_topics(&topics);
        if active.is_empty() {
            tracing::info!("No active topics to refresh");
            return Ok(RefreshOutcome::NoActiveTopics);
        }

        let existing = self.repository.get_articles().await;
        let options = self.search_options(mode);
        let now = Utc::now();
        let mut merger = ArticleMerger::new(&existing, self.settings.description_max_length);

        for topic in &active {
            tracing::debug!("Fetching articles for topic: {}", topic.name);
            let mut response = self.client.search(&topic.query, &options).await?;
            self.backfill_text(&mut response.results).await;
            let added = merger.add_results(topic, &response.results, now);
            tracing::debug!(
                "Found {} results for {} ({} new)",
                response.results.len(),
                topic.name,
                added
            );
        }

        let new_articles = merger.into_new_articles();
        if new_articles.is_empty() {
            tracing::info!("Refresh found no new articles");
            return Ok(RefreshOutcome::NoNewArticles);
        }

        // Re-read: read flags may have changed while the searches ran
        let write_guard = self.articles_write.lock().await;
        let mut all_articles = self.repository.get_articles().await;
        let stored_urls: HashSet<&str> = all_articles.iter().map(|a| a.url.as_str()).collect();
        let new_articles: Vec<Article> = new_articles
            .into_iter()
            .filter(|a| !stored_urls.contains(a.url.as_str()))
            .collect();
        if new_articles.is_empty() {
            return Ok(RefreshOutcome::NoNewArticles);
        }

        let count = new_articles.len();
        all_articles.extend(new_articles.iter().cloned());

        self.repository.save_articles(&all_articles).await?;
        drop(write_guard);
        self.repository.save_last_sync(now).await?;
        tracing::info!("Stored {} new articles", count);

        if let Err(e) = self
            .notifications
            .notify_new_articles(&new_articles, &topics)
            .await
        {
            tracing::warn!("Failed to send new articles notification: {}", e);
        }

        Ok(RefreshOutcome::NewArticles(count))
    }

    /// Set the read flag of a stored article. Returns false when no stored
    /// article has that id.
    pub async fn set_read(&self, id: &str, is_read: bool) -> Result<bool> {
        let _guard = self.articles_write.lock().await;
        let mut stored = self.repository.get_articles().await;
        let Some(article) = stored.iter_mut().find(|a| a.id == id) else {
            return Ok(false);
        };
        article.is_read = is_read;
        self.repository.save_articles(&stored).await?;
        Ok(true)
    }

    /// Fill in body text for results that came back without any, so they
    /// still get a description. Best effort: failures leave them as they are.
    async fn backfill_text(&self, results: &mut [SearchResult]) {
        let missing: Vec<String> = results
            .iter()
            .filter(|r| r.text.as_deref().map_or(true, |t| t.trim().is_empty()))
            .map(|r| r.id.clone())
            .collect();
        if missing.is_empty() {
            return;
        }

        let contents = match self.client.get_contents(&missing).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Failed to fetch contents for {} results: {}", missing.len(), e);
                return;
            }
        };

        for content in contents.results {
            let Some(text) = content.text else { continue };
            if let Some(result) = results.iter_mut().find(|r| r.id == content.id) {
                result.text = Some(text);
            }
        }
    }

    fn search_options(&self, mode: RefreshMode) -> SearchOptions {
        let base = SearchOptions {
            text_length: self.settings.text_length,
            ..SearchOptions::default()
        };

        match mode {
            RefreshMode::Interactive => SearchOptions {
                num_results: self.settings.interactive_results,
                ..base
            },
            RefreshMode::Background { published_after } => SearchOptions {
                num_results: self.settings.background_results,
                published_after: Some(published_after),
                ..base
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::topic::{add_topic, toggle_topic_active};
    use crate::models::TopicDraft;
    use crate::services::notifier::testing::RecordingNotifier;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) struct Harness {
        _dir: TempDir,
        pub repository: Arc<Repository>,
        pub notifier: Arc<RecordingNotifier>,
        pub refresher: Arc<Refresher>,
    }

    pub(crate) async fn harness(server: &MockServer) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.db");
        let repository = Arc::new(Repository::new(path.to_str().unwrap()).await.unwrap());
        let notifier = Arc::new(RecordingNotifier::granted());
        let notifications = Arc::new(NotificationService::new(
            notifier.clone(),
            Arc::clone(&repository),
        ));
        let client = Arc::new(ExaClient::new(Some("test-key".to_string()), &server.uri()).unwrap());
        let settings = RefreshSettings {
            interactive_results: 10,
            background_results: 5,
            description_max_length: 150,
            text_length: 1000,
        };
        let refresher = Arc::new(Refresher::new(
            Arc::clone(&repository),
            client,
            notifications,
            settings,
        ));
        Harness {
            _dir: dir,
            repository,
            notifier,
            refresher,
        }
    }

    pub(crate) async fn save_topics(repository: &Repository, queries: &[&str]) -> Vec<crate::models::Topic> {
        let mut topics = Vec::new();
        for query in queries {
            let draft = TopicDraft {
                name: query.to_string(),
                query: query.to_string(),
                notifications_enabled: true,
            };
            add_topic(&mut topics, &draft, Utc::now()).unwrap();
        }
        repository.save_topics(&topics).await.unwrap();
        topics
    }

    pub(crate) fn results(urls: &[&str]) -> serde_json::Value {
        let results: Vec<_> = urls
            .iter()
            .map(|url| {
                serde_json::json!({
                    "id": url,
                    "title": format!("Article at {url}"),
                    "url": url,
                    "publishedDate": "2026-06-01T08:00:00.000Z",
                    "text": "Something happened. More details follow."
                })
            })
            .collect();
        serde_json::json!({ "results": results })
    }

    fn stored(url: &str) -> Article {
        let now = Utc::now();
        Article {
            id: url.to_string(),
            title: "Stored".to_string(),
            url: url.to_string(),
            description: String::new(),
            topic_id: "old".to_string(),
            published_at: now,
            fetched_at: now,
            is_read: false,
        }
    }

    #[tokio::test]
    async fn no_active_topics_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results(&[])))
            .expect(0)
            .mount(&server)
            .await;

        let h = harness(&server).await;
        let mut topics = save_topics(&h.repository, &["rust"]).await;
        let id = topics[0].id.clone();
        toggle_topic_active(&mut topics, &id, Utc::now()).unwrap();
        h.repository.save_topics(&topics).await.unwrap();

        let outcome = h.refresher.refresh(RefreshMode::Interactive).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::NoActiveTopics);
    }

    #[tokio::test]
    async fn adds_only_unseen_urls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(results(&["a.com/1", "a.com/2"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server).await;
        save_topics(&h.repository, &["rust"]).await;
        h.repository.save_articles(&[stored("a.com/1")]).await.unwrap();

        let outcome = h.refresher.refresh(RefreshMode::Interactive).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::NewArticles(1));

        let articles = h.repository.get_articles().await;
        let urls: Vec<_> = articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["a.com/1", "a.com/2"]);
        assert_eq!(articles[1].description, "Something happened. More details follow.");
        assert!(h.repository.get_last_sync().await.is_some());

        let delivered = h.notifier.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].body, "Found 1 new articles across your topics");
    }

    #[tokio::test]
    async fn nothing_new_leaves_last_sync_alone() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results(&["a.com/1"])))
            .mount(&server)
            .await;

        let h = harness(&server).await;
        save_topics(&h.repository, &["rust"]).await;
        h.repository.save_articles(&[stored("a.com/1")]).await.unwrap();

        let outcome = h.refresher.refresh(RefreshMode::Interactive).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::NoNewArticles);
        assert_eq!(h.repository.get_last_sync().await, None);
        assert!(h.notifier.delivered().is_empty());
    }

    #[tokio::test]
    async fn same_url_from_two_topics_is_stored_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results(&["shared.com/x"])))
            .expect(2)
            .mount(&server)
            .await;

        let h = harness(&server).await;
        save_topics(&h.repository, &["rust", "tokio"]).await;

        let outcome = h.refresher.refresh(RefreshMode::Interactive).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::NewArticles(1));
        assert_eq!(h.repository.get_articles().await.len(), 1);
    }

    #[tokio::test]
    async fn one_failing_topic_aborts_without_writing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({ "query": "good" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(results(&["a.com/9"])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({ "query": "bad" })))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let h = harness(&server).await;
        save_topics(&h.repository, &["good", "bad"]).await;

        let err = h.refresher.refresh(RefreshMode::Interactive).await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::Auth { status: 401 }));
        assert!(h.repository.get_articles().await.is_empty());
        assert_eq!(h.repository.get_last_sync().await, None);
    }

    #[tokio::test]
    async fn background_mode_filters_by_recency() {
        let server = MockServer::start().await;
        let since = DateTime::parse_from_rfc3339("2026-06-01T07:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(serde_json::json!({
                "numResults": 5,
                "publishedAfter": "2026-06-01T07:00:00.000Z"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(results(&["a.com/1"])))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server).await;
        save_topics(&h.repository, &["rust"]).await;

        let outcome = h
            .refresher
            .refresh(RefreshMode::Background {
                published_after: since,
            })
            .await
            .unwrap();
        assert_eq!(outcome, RefreshOutcome::NewArticles(1));
    }

    #[tokio::test]
    async fn interactive_mode_has_no_recency_filter() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        let notifications = Arc::new(NotificationService::new(
            h.notifier.clone(),
            Arc::clone(&h.repository),
        ));
        let client = Arc::new(ExaClient::new(None, &server.uri()).unwrap());
        let refresher = Refresher::new(
            Arc::clone(&h.repository),
            client,
            notifications,
            RefreshSettings {
                interactive_results: 10,
                background_results: 5,
                description_max_length: 150,
                text_length: 500,
            },
        );

        let options = refresher.search_options(RefreshMode::Interactive);
        assert_eq!(options.num_results, 10);
        assert_eq!(options.published_after, None);
        assert_eq!(options.text_length, 500);
    }

    #[tokio::test]
    async fn overlapping_refreshes_do_not_duplicate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(results(&["a.com/1"]))
                    .set_delay(std::time::Duration::from_millis(50)),
            )
            .mount(&server)
            .await;

        let h = harness(&server).await;
        save_topics(&h.repository, &["rust"]).await;

        let (first, second) = tokio::join!(
            h.refresher.refresh(RefreshMode::Interactive),
            h.refresher.refresh(RefreshMode::Interactive)
        );
        let mut outcomes = vec![first.unwrap(), second.unwrap()];
        outcomes.sort_by_key(|o| matches!(o, RefreshOutcome::NoNewArticles));
        assert_eq!(
            outcomes,
            vec![RefreshOutcome::NewArticles(1), RefreshOutcome::NoNewArticles]
        );
        assert_eq!(h.repository.get_articles().await.len(), 1);
    }

    #[tokio::test]
    async fn results_without_text_get_contents_backfilled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{ "id": "a.com/1", "title": "Bare", "url": "a.com/1" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/contents"))
            .and(body_partial_json(serde_json::json!({ "ids": ["a.com/1"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{ "id": "a.com/1", "url": "a.com/1", "text": "Filled in later." }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server).await;
        save_topics(&h.repository, &["rust"]).await;

        h.refresher.refresh(RefreshMode::Interactive).await.unwrap();
        assert_eq!(h.repository.get_articles().await[0].description, "Filled in later.");
    }

    #[tokio::test]
    async fn contents_failure_keeps_the_article() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{ "id": "a.com/1", "url": "a.com/1" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/contents"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let h = harness(&server).await;
        save_topics(&h.repository, &["rust"]).await;

        let outcome = h.refresher.refresh(RefreshMode::Interactive).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::NewArticles(1));
        let articles = h.repository.get_articles().await;
        assert_eq!(articles[0].title, "Untitled");
        assert_eq!(articles[0].description, "");
    }

    #[tokio::test]
    async fn read_flag_set_during_refresh_survives_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(results(&["a.com/2"]))
                    .set_delay(std::time::Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let h = harness(&server).await;
        save_topics(&h.repository, &["rust"]).await;
        h.repository.save_articles(&[stored("a.com/1")]).await.unwrap();

        let refresher = Arc::clone(&h.refresher);
        let running =
            tokio::spawn(async move { refresher.refresh(RefreshMode::Interactive).await });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert!(h.refresher.set_read("a.com/1", true).await.unwrap());
        assert!(h.repository.get_articles().await[0].is_read);

        let outcome = running.await.unwrap().unwrap();
        assert_eq!(outcome, RefreshOutcome::NewArticles(1));

        let articles = h.repository.get_articles().await;
        assert_eq!(articles.len(), 2);
        assert!(articles[0].is_read);
        assert!(!articles[1].is_read);
    }

    #[tokio::test]
    async fn set_read_on_unknown_id_changes_nothing() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        h.repository.save_articles(&[stored("a.com/1")]).await.unwrap();

        assert!(!h.refresher.set_read("a.com/404", true).await.unwrap());
        assert!(!h.repository.get_articles().await[0].is_read);
    }
}
