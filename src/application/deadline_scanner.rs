use crate::application::relocator::TaskRelocator;
use crate::domain::models::{MovedTask, TaskListSummary};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_tasks_client::GoogleTasksClient;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

pub const NOTHING_MOVED_MESSAGE: &str = "No tasks moved, enjoy your day";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub list_id: String,
    pub task_id: Option<String>,
    pub message: String,
    /// Set when the task now exists in both lists.
    pub duplicated_as: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub moved: Vec<MovedTask>,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    pub fn tasks_moved(&self) -> bool {
        !self.moved.is_empty()
    }

    fn record_failure(&mut self, list_id: &str, task_id: Option<&str>, error: InfraError) {
        let duplicated_as = match &error {
            InfraError::Deletion { duplicated_as, .. } => duplicated_as.clone(),
            _ => None,
        };
        self.failures.push(ScanFailure {
            list_id: list_id.to_string(),
            task_id: task_id.map(ToOwned::to_owned),
            message: error.to_string(),
            duplicated_as,
        });
    }
}

/// `now + lookahead >= due`, compared as UTC instants. A window reaching past
/// the representable range covers every due date.
pub fn is_due_within(due: DateTime<Utc>, now: DateTime<Utc>, lookahead: Duration) -> bool {
    match now.checked_add_signed(lookahead) {
        Some(limit) => limit >= due,
        None => true,
    }
}

pub struct DeadlineScanner<C>
where
    C: GoogleTasksClient,
{
    tasks_client: Arc<C>,
    relocator: TaskRelocator<C>,
    lookahead: Duration,
}

impl<C> DeadlineScanner<C>
where
    C: GoogleTasksClient,
{
    pub fn new(tasks_client: Arc<C>, lookahead: Duration) -> Self {
        Self {
            relocator: TaskRelocator::new(Arc::clone(&tasks_client)),
            tasks_client,
            lookahead,
        }
    }

    /// Moves every task of `secondary_lists` due within the lookahead window
    /// into `primary_list_id`.
    ///
    /// A failure on one list or task is logged and recorded, and the scan
    /// carries on with the rest.
    pub async fn scan<Tz>(
        &self,
        access_token: &str,
        primary_list_id: &str,
        secondary_lists: &[TaskListSummary],
        now: &DateTime<Tz>,
    ) -> ScanReport
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let now_utc = now.with_timezone(&Utc);
        log::debug!(
            "scanning at {now} (lookahead {} day(s))",
            self.lookahead.num_days()
        );

        let mut report = ScanReport::default();
        for list in secondary_lists {
            let tasks = match self.tasks_client.list_tasks(access_token, &list.id).await {
                Ok(tasks) => tasks,
                Err(error) => {
                    log::error!("Could not list tasks of {} ({}): {error}", list.title, list.id);
                    report.record_failure(&list.id, None, error);
                    continue;
                }
            };
            log::debug!("{} task(s) in {} ({})", tasks.len(), list.title, list.id);

            for task in tasks {
                let Some(task_id) = task.id.as_deref() else {
                    log::debug!("skipping task without id in {}", list.id);
                    continue;
                };

                let due = match task.due_at() {
                    Ok(Some(due)) => due,
                    Ok(None) => continue,
                    Err(error) => {
                        log::warn!("Skipping {task_id} in {}: {error}", list.id);
                        report.record_failure(&list.id, Some(task_id), error);
                        continue;
                    }
                };
                if !is_due_within(due, now_utc, self.lookahead) {
                    continue;
                }

                match self
                    .relocator
                    .relocate(access_token, task_id, &list.id, primary_list_id)
                    .await
                {
                    Ok(moved) => {
                        log::info!("Task moved: {} (from {})", moved.title, list.title);
                        report.moved.push(moved);
                    }
                    Err(error) => {
                        match &error {
                            InfraError::Deletion {
                                duplicated_as: Some(copy_id),
                                ..
                            } => log::warn!(
                                "Task {task_id} was copied to {primary_list_id} as {copy_id} but could not be \
                                 removed from {}; it now exists in both lists: {error}",
                                list.id
                            ),
                            _ => log::error!("Failed to move {task_id} from {}: {error}", list.id),
                        }
                        report.record_failure(&list.id, Some(task_id), error);
                    }
                }
            }
        }

        if !report.tasks_moved() {
            log::info!("{NOTHING_MOVED_MESSAGE}");
        }
        report
    }
}
