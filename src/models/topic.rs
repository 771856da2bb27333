use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub query: String,
    pub is_active: bool,
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// User input from the add/edit topic form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDraft {
    pub name: String,
    pub query: String,
    pub notifications_enabled: bool,
}

impl Default for TopicDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            query: String::new(),
            notifications_enabled: true,
        }
    }
}

impl TopicDraft {
    pub fn from_topic(topic: &Topic) -> Self {
        Self {
            name: topic.name.clone(),
            query: topic.query.clone(),
            notifications_enabled: topic.notifications_enabled,
        }
    }

    /// Returns the trimmed (name, query) pair, rejecting blanks.
    fn validated(&self) -> Result<(String, String)> {
        let name = self.name.trim();
        let query = self.query.trim();
        if name.is_empty() || query.is_empty() {
            return Err(AppError::InvalidTopic(
                "Please fill in both topic name and search query".to_string(),
            ));
        }
        Ok((name.to_string(), query.to_string()))
    }
}

pub fn active_topics(topics: &[Topic]) -> Vec<Topic> {
    topics.iter().filter(|t| t.is_active).cloned().collect()
}

pub fn topic_name<'a>(topics: &'a [Topic], topic_id: &str) -> &'a str {
    topics
        .iter()
        .find(|t| t.id == topic_id)
        .map(|t| t.name.as_str())
        .unwrap_or("Unknown Topic")
}

pub fn add_topic(topics: &mut Vec<Topic>, draft: &TopicDraft, now: DateTime<Utc>) -> Result<Topic> {
    let (name, query) = draft.validated()?;

    let topic = Topic {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        query,
        is_active: true,
        notifications_enabled: draft.notifications_enabled,
        created_at: now,
        last_updated: now,
    };
    topics.push(topic.clone());
    Ok(topic)
}

pub fn update_topic(
    topics: &mut [Topic],
    id: &str,
    draft: &TopicDraft,
    now: DateTime<Utc>,
) -> Result<()> {
    let (name, query) = draft.validated()?;
    let topic = find_mut(topics, id)?;
    topic.name = name;
    topic.query = query;
    topic.notifications_enabled = draft.notifications_enabled;
    topic.last_updated = now;
    Ok(())
}

pub fn remove_topic(topics: &mut Vec<Topic>, id: &str) -> Result<Topic> {
    let index = topics
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| AppError::TopicNotFound(id.to_string()))?;
    Ok(topics.remove(index))
}

pub fn toggle_topic_active(topics: &mut [Topic], id: &str, now: DateTime<Utc>) -> Result<bool> {
    let topic = find_mut(topics, id)?;
    topic.is_active = !topic.is_active;
    topic.last_updated = now;
    Ok(topic.is_active)
}

pub fn toggle_topic_notifications(
    topics: &mut [Topic],
    id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let topic = find_mut(topics, id)?;
    topic.notifications_enabled = !topic.notifications_enabled;
    topic.last_updated = now;
    Ok(topic.notifications_enabled)
}

fn find_mut<'a>(topics: &'a mut [Topic], id: &str) -> Result<&'a mut Topic> {
    topics
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| AppError::TopicNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(name: &str, query: &str) -> TopicDraft {
        TopicDraft {
            name: name.to_string(),
            query: query.to_string(),
            notifications_enabled: true,
        }
    }

    #[test]
    fn add_trims_input_and_starts_active() {
        let mut topics = Vec::new();
        let now = Utc::now();
        let topic = add_topic(&mut topics, &draft("  Rust ", " rust async runtimes "), now).unwrap();

        assert_eq!(topics.len(), 1);
        assert_eq!(topic.name, "Rust");
        assert_eq!(topic.query, "rust async runtimes");
        assert!(topic.is_active);
        assert_eq!(topic.created_at, now);
        assert_eq!(topic.last_updated, now);
    }

    #[test]
    fn add_generates_distinct_ids() {
        let mut topics = Vec::new();
        let now = Utc::now();
        let a = add_topic(&mut topics, &draft("a", "a"), now).unwrap();
        let b = add_topic(&mut topics, &draft("b", "b"), now).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn blank_name_or_query_is_rejected() {
        let mut topics = Vec::new();
        let err = add_topic(&mut topics, &draft("   ", "query"), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTopic(_)));
        assert!(add_topic(&mut topics, &draft("name", ""), Utc::now()).is_err());
        assert!(topics.is_empty());
    }

    #[test]
    fn update_keeps_identity_and_bumps_timestamp() {
        let mut topics = Vec::new();
        let created = Utc::now();
        let topic = add_topic(&mut topics, &draft("old", "old query"), created).unwrap();

        let later = created + Duration::minutes(5);
        let edit = TopicDraft {
            notifications_enabled: false,
            ..draft("new", "new query")
        };
        update_topic(&mut topics, &topic.id, &edit, later).unwrap();

        let updated = &topics[0];
        assert_eq!(updated.id, topic.id);
        assert_eq!(updated.name, "new");
        assert_eq!(updated.query, "new query");
        assert!(!updated.notifications_enabled);
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.last_updated, later);
    }

    #[test]
    fn toggle_and_remove() {
        let mut topics = Vec::new();
        let now = Utc::now();
        let topic = add_topic(&mut topics, &draft("t", "q"), now).unwrap();

        assert!(!toggle_topic_active(&mut topics, &topic.id, now).unwrap());
        assert!(active_topics(&topics).is_empty());
        assert!(toggle_topic_active(&mut topics, &topic.id, now).unwrap());
        assert_eq!(active_topics(&topics).len(), 1);

        assert!(!toggle_topic_notifications(&mut topics, &topic.id, now).unwrap());

        remove_topic(&mut topics, &topic.id).unwrap();
        assert!(topics.is_empty());
        assert!(matches!(
            remove_topic(&mut topics, &topic.id),
            Err(AppError::TopicNotFound(_))
        ));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut topics = Vec::new();
        add_topic(&mut topics, &draft("t", "q"), Utc::now()).unwrap();
        let json = serde_json::to_value(&topics[0]).unwrap();
        assert!(json.get("isActive").is_some());
        assert!(json.get("notificationsEnabled").is_some());
        assert!(json.get("lastUpdated").is_some());
    }

    #[test]
    fn unknown_topic_name_has_placeholder() {
        assert_eq!(topic_name(&[], "missing"), "Unknown Topic");
    }
}
