pub const SCHEMA: &str = r#"
-- key/value records, each value a JSON document
CREATE TABLE IF NOT EXISTS records (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

pub const KEY_TOPICS: &str = "topics";
pub const KEY_ARTICLES: &str = "articles";
pub const KEY_NOTIFICATION_SETTINGS: &str = "notificationSettings";
pub const KEY_LAST_SYNC: &str = "lastSync";

pub const ALL_KEYS: [&str; 4] = [
    KEY_TOPICS,
    KEY_ARTICLES,
    KEY_NOTIFICATION_SETTINGS,
    KEY_LAST_SYNC,
];
