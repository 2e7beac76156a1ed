use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl OAuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + chrono::Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskListSummary {
    pub id: String,
    pub title: String,
}

/// Destination list plus the source lists scanned for due tasks, in
/// enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLists {
    pub primary: TaskListSummary,
    pub secondary: Vec<TaskListSummary>,
}

impl ResolvedLists {
    pub fn all_ids(&self) -> Vec<String> {
        std::iter::once(&self.primary)
            .chain(self.secondary.iter())
            .map(|list| list.id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedTask {
    pub original_id: String,
    pub new_id: String,
    pub title: String,
    pub source_list_id: String,
    pub destination_list_id: String,
    pub due: Option<String>,
    pub deadline_time: Option<String>,
}
