pub mod article;
pub mod settings;
pub mod topic;

pub use article::{Article, ArticleFilter};
pub use settings::NotificationSettings;
pub use topic::{Topic, TopicDraft};
