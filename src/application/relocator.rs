//! Moves a task between lists.
//!
//! The task service has no move operation, so a move is an insert into the
//! destination followed by a delete from the source. The two calls are not
//! atomic: if the insert succeeds and the delete fails, the task exists in
//! both lists and the returned `Deletion` error names the new copy in
//! `duplicated_as`. Nothing is rolled back.

use crate::application::note_parser::{deadline_annotation, extract_time};
use crate::domain::models::MovedTask;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_tasks_client::{GoogleTask, GoogleTasksClient, NewTask};
use std::sync::Arc;

pub struct TaskRelocator<C>
where
    C: GoogleTasksClient,
{
    tasks_client: Arc<C>,
}

impl<C> TaskRelocator<C>
where
    C: GoogleTasksClient,
{
    pub fn new(tasks_client: Arc<C>) -> Self {
        Self { tasks_client }
    }

    pub async fn relocate(
        &self,
        access_token: &str,
        task_id: &str,
        source_list_id: &str,
        destination_list_id: &str,
    ) -> Result<MovedTask, InfraError> {
        let original = self
            .tasks_client
            .get_task(access_token, source_list_id, task_id)
            .await?;

        let deadline_time = original.notes.as_deref().and_then(extract_time);
        if let Some(time) = &deadline_time {
            log::info!("Extracted deadline time {time} from notes of {task_id}");
        }

        let payload = insertion_payload(&original, deadline_time.as_deref());
        let created = self
            .tasks_client
            .insert_task(access_token, destination_list_id, &payload)
            .await?;
        let new_id = created.id.clone().unwrap_or_default();

        self.tasks_client
            .delete_task(access_token, source_list_id, task_id)
            .await
            .map_err(|error| match error {
                InfraError::Deletion {
                    list_id,
                    task_id,
                    message,
                    ..
                } => InfraError::Deletion {
                    list_id,
                    task_id,
                    message,
                    duplicated_as: Some(new_id.clone()),
                },
                other => InfraError::Deletion {
                    list_id: source_list_id.to_string(),
                    task_id: task_id.to_string(),
                    message: other.to_string(),
                    duplicated_as: Some(new_id.clone()),
                },
            })?;

        Ok(MovedTask {
            original_id: task_id.to_string(),
            new_id,
            title: original.display_title().to_string(),
            source_list_id: source_list_id.to_string(),
            destination_list_id: destination_list_id.to_string(),
            due: created.due.or(original.due),
            deadline_time,
        })
    }
}

/// Client-owned fields of `original`; notes become the deadline annotation
/// when a time was found and are carried over unchanged otherwise.
fn insertion_payload(original: &GoogleTask, deadline_time: Option<&str>) -> NewTask {
    NewTask {
        title: original.title.clone(),
        notes: match deadline_time {
            Some(time) => Some(deadline_annotation(time)),
            None => original.notes.clone(),
        },
        due: original.due.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::fake_tasks_client::{FakeTasksClient, task};
    use std::sync::atomic::Ordering;

    const DUE: &str = "2024-11-11T00:00:00.000Z";

    fn client_with_task(notes: Option<&str>) -> Arc<FakeTasksClient> {
        let client = Arc::new(FakeTasksClient::with_lists(&[("primary", "Today"), ("later", "Later")]));
        client.add_task("later", task("t1", "Pay rent", Some(DUE), notes));
        client
    }

    #[tokio::test]
    async fn relocation_moves_task_and_keeps_due_date() {
        let client = client_with_task(None);
        let relocator = TaskRelocator::new(Arc::clone(&client));

        let moved = relocator
            .relocate("token", "t1", "later", "primary")
            .await
            .expect("relocate");

        assert!(!client.task_ids("later").contains(&"t1".to_string()));
        let destination = client.tasks("primary");
        assert_eq!(destination.len(), 1);
        assert_eq!(destination[0].due.as_deref(), Some(DUE));
        assert_eq!(destination[0].id.as_deref(), Some(moved.new_id.as_str()));
        assert_eq!(moved.original_id, "t1");
        assert_eq!(moved.due.as_deref(), Some(DUE));
        assert_eq!(moved.deadline_time, None);
    }

    #[tokio::test]
    async fn extracted_time_replaces_notes_with_annotation() {
        let client = client_with_task(Some("Pay before 18:30 at the bank"));
        let relocator = TaskRelocator::new(Arc::clone(&client));

        let moved = relocator
            .relocate("token", "t1", "later", "primary")
            .await
            .expect("relocate");

        assert_eq!(moved.deadline_time.as_deref(), Some("18:30"));
        let payloads = client.inserted_payloads();
        assert_eq!(
            payloads,
            vec![(
                "primary".to_string(),
                NewTask {
                    title: Some("Pay rent".to_string()),
                    notes: Some("Deadline time: 18:30".to_string()),
                    due: Some(DUE.to_string()),
                }
            )]
        );
    }

    #[tokio::test]
    async fn notes_without_time_are_carried_over() {
        let client = client_with_task(Some("bring the receipt"));
        let relocator = TaskRelocator::new(Arc::clone(&client));
        relocator
            .relocate("token", "t1", "later", "primary")
            .await
            .expect("relocate");

        let payloads = client.inserted_payloads();
        assert_eq!(payloads[0].1.notes.as_deref(), Some("bring the receipt"));
    }

    #[test]
    fn payload_drops_server_assigned_fields() {
        let original = task("t1", "Pay rent", Some(DUE), None);
        assert!(original.etag.is_some());

        let payload = serde_json::to_value(insertion_payload(&original, None)).expect("serialize");
        assert_eq!(
            payload,
            serde_json::json!({ "title": "Pay rent", "due": DUE })
        );
    }

    #[tokio::test]
    async fn missing_task_is_not_found() {
        let client = client_with_task(None);
        let relocator = TaskRelocator::new(Arc::clone(&client));

        assert!(matches!(
            relocator.relocate("token", "nope", "later", "primary").await,
            Err(InfraError::TaskNotFound { .. })
        ));
        assert_eq!(client.insert_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_insert_leaves_original_in_place() {
        let client = client_with_task(None);
        client.fail_inserts_into("primary");
        let relocator = TaskRelocator::new(Arc::clone(&client));

        assert!(matches!(
            relocator.relocate("token", "t1", "later", "primary").await,
            Err(InfraError::Insertion { .. })
        ));
        assert_eq!(client.task_ids("later"), vec!["t1"]);
        assert_eq!(client.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_delete_reports_the_duplicate() {
        let client = client_with_task(None);
        client.fail_deletes_of("t1");
        let relocator = TaskRelocator::new(Arc::clone(&client));

        match relocator.relocate("token", "t1", "later", "primary").await {
            Err(InfraError::Deletion {
                task_id,
                duplicated_as: Some(copy_id),
                ..
            }) => {
                assert_eq!(task_id, "t1");
                assert_eq!(client.task_ids("primary"), vec![copy_id]);
                assert_eq!(client.task_ids("later"), vec!["t1"]);
            }
            other => panic!("expected deletion error with duplicate, got {other:?}"),
        }
    }
}
