use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{Article, Topic};
use crate::search::{generate_description, SearchResult};

/// Collects articles for URLs not seen before, either in storage or earlier
/// in the same refresh.
pub struct ArticleMerger {
    seen_urls: HashSet<String>,
    new_articles: Vec<Article>,
    description_max_length: usize,
}

impl ArticleMerger {
    pub fn new(existing: &[Article], description_max_length: usize) -> Self {
        Self {
            seen_urls: existing.iter().map(|a| a.url.clone()).collect(),
            new_articles: Vec::new(),
            description_max_length,
        }
    }

    /// Returns how many of `results` were new.
    pub fn add_results(&mut self, topic: &Topic, results: &[SearchResult], now: DateTime<Utc>) -> usize {
        let before = self.new_articles.len();

        for result in results {
            if !self.seen_urls.insert(result.url.clone()) {
                continue;
            }

            self.new_articles.push(Article {
                id: result.id.clone(),
                title: result.display_title(),
                url: result.url.clone(),
                description: generate_description(
                    result.text.as_deref().unwrap_or_default(),
                    self.description_max_length,
                ),
                topic_id: topic.id.clone(),
                published_at: result.published_at().unwrap_or(now),
                fetched_at: now,
                is_read: false,
            });
        }

        self.new_articles.len() - before
    }

    pub fn into_new_articles(self) -> Vec<Article> {
        self.new_articles
    }
}
