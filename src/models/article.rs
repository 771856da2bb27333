use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: String,
    pub description: String,
    pub topic_id: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArticleFilter {
    #[default]
    All,
    Unread,
}

impl ArticleFilter {
    pub fn cycle(self) -> Self {
        match self {
            Self::All => Self::Unread,
            Self::Unread => Self::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Unread => "Unread",
        }
    }

    pub fn matches(self, article: &Article) -> bool {
        match self {
            Self::All => true,
            Self::Unread => !article.is_read,
        }
    }
}

/// Display order: newest first. Stable, so equal timestamps keep storage order.
pub fn sort_by_published_desc(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

/// Marks the article as read. Returns `true` if the flag changed.
pub fn mark_read(articles: &mut [Article], id: &str) -> bool {
    match articles.iter_mut().find(|a| a.id == id) {
        Some(article) if !article.is_read => {
            article.is_read = true;
            true
        }
        _ => false,
    }
}

/// Returns the new read state, or `None` if no article has this id.
pub fn toggle_read(articles: &mut [Article], id: &str) -> Option<bool> {
    let article = articles.iter_mut().find(|a| a.id == id)?;
    article.is_read = !article.is_read;
    Some(article.is_read)
}
