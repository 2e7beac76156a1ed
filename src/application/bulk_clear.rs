use crate::infrastructure::google_tasks_client::GoogleTasksClient;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearFailure {
    pub list_id: String,
    pub task_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub deleted: usize,
    pub failures: Vec<ClearFailure>,
}

pub struct BulkClear<C>
where
    C: GoogleTasksClient,
{
    tasks_client: Arc<C>,
}

impl<C> BulkClear<C>
where
    C: GoogleTasksClient,
{
    pub fn new(tasks_client: Arc<C>) -> Self {
        Self { tasks_client }
    }

    /// Best-effort delete of every task in `list_ids`, one list at a time.
    pub async fn clear_all(&self, access_token: &str, list_ids: &[String]) -> ClearReport {
        let mut report = ClearReport::default();

        for list_id in list_ids {
            let tasks = match self.tasks_client.list_tasks(access_token, list_id).await {
                Ok(tasks) => tasks,
                Err(error) => {
                    log::error!("Could not list tasks of {list_id}: {error}");
                    report.failures.push(ClearFailure {
                        list_id: list_id.clone(),
                        task_id: None,
                        message: error.to_string(),
                    });
                    continue;
                }
            };

            let mut list_failed = false;
            for task_id in tasks.into_iter().filter_map(|task| task.id) {
                match self.tasks_client.delete_task(access_token, list_id, &task_id).await {
                    Ok(()) => report.deleted += 1,
                    Err(error) => {
                        log::warn!("Failed to delete {task_id} from {list_id}: {error}");
                        list_failed = true;
                        report.failures.push(ClearFailure {
                            list_id: list_id.clone(),
                            task_id: Some(task_id),
                            message: error.to_string(),
                        });
                    }
                }
            }

            if list_failed {
                log::warn!("Some tasks in list {list_id} could not be deleted");
            } else {
                log::info!("Cleared all tasks from list {list_id}");
            }
        }

        report
    }
}
