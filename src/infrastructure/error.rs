use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("OAuth error: {0}")]
    OAuth(String),
    #[error("Credential store error: {0}")]
    Credential(String),
    #[error("Authentication required: {0}")]
    Authentication(String),
    #[error("Credential refresh rejected: {0}")]
    CredentialRefresh(String),
    #[error("No task lists found for this account")]
    NoListsFound,
    #[error("Task {task_id} not found in list {list_id}")]
    TaskNotFound { list_id: String, task_id: String },
    #[error("Failed to insert task into list {list_id}: {message}")]
    Insertion { list_id: String, message: String },
    #[error("Failed to delete task {task_id} from list {list_id}: {message}")]
    Deletion {
        list_id: String,
        task_id: String,
        message: String,
        /// Id of the copy already inserted elsewhere, when the delete was the
        /// second half of a move.
        duplicated_as: Option<String>,
    },
    #[error("Remote service error: {0}")]
    RemoteService(String),
}
