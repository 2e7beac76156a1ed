use crate::domain::models::TaskListSummary;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_tasks_client::{GoogleTask, GoogleTasksClient, NewTask};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct FakeState {
    lists: Vec<(TaskListSummary, Vec<GoogleTask>)>,
    inserted_payloads: Vec<(String, NewTask)>,
    next_id: usize,
    failing_inserts: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_listings: HashSet<String>,
}

/// In-memory task service with call counters and per-id failure injection.
#[derive(Debug, Default)]
pub struct FakeTasksClient {
    state: Mutex<FakeState>,
    pub list_lists_calls: AtomicUsize,
    pub list_tasks_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

pub fn task(id: &str, title: &str, due: Option<&str>, notes: Option<&str>) -> GoogleTask {
    GoogleTask {
        id: Some(id.to_string()),
        title: Some(title.to_string()),
        notes: notes.map(ToOwned::to_owned),
        due: due.map(ToOwned::to_owned),
        status: Some("needsAction".to_string()),
        etag: Some(format!("\"etag-{id}\"")),
        self_link: Some(format!("https://tasks.example/{id}")),
        position: Some("00000000000000000000".to_string()),
        updated: Some("2024-11-01T08:00:00.000Z".to_string()),
        ..GoogleTask::default()
    }
}

impl FakeTasksClient {
    pub fn with_lists(lists: &[(&str, &str)]) -> Self {
        let client = Self::default();
        {
            let mut state = client.state.lock().expect("fake state poisoned");
            state.lists = lists
                .iter()
                .map(|(id, title)| {
                    (
                        TaskListSummary {
                            id: id.to_string(),
                            title: title.to_string(),
                        },
                        Vec::new(),
                    )
                })
                .collect();
        }
        client
    }

    pub fn add_task(&self, list_id: &str, task: GoogleTask) {
        let mut state = self.state.lock().expect("fake state poisoned");
        let (_, tasks) = state
            .lists
            .iter_mut()
            .find(|(list, _)| list.id == list_id)
            .expect("list exists in fake");
        tasks.push(task);
    }

    pub fn tasks(&self, list_id: &str) -> Vec<GoogleTask> {
        let state = self.state.lock().expect("fake state poisoned");
        state
            .lists
            .iter()
            .find(|(list, _)| list.id == list_id)
            .map(|(_, tasks)| tasks.clone())
            .unwrap_or_default()
    }

    pub fn task_ids(&self, list_id: &str) -> Vec<String> {
        self.tasks(list_id).into_iter().filter_map(|task| task.id).collect()
    }

    pub fn inserted_payloads(&self) -> Vec<(String, NewTask)> {
        self.state.lock().expect("fake state poisoned").inserted_payloads.clone()
    }

    pub fn fail_inserts_into(&self, list_id: &str) {
        self.state
            .lock()
            .expect("fake state poisoned")
            .failing_inserts
            .insert(list_id.to_string());
    }

    pub fn fail_deletes_of(&self, task_id: &str) {
        self.state
            .lock()
            .expect("fake state poisoned")
            .failing_deletes
            .insert(task_id.to_string());
    }

    pub fn fail_listing_of(&self, list_id: &str) {
        self.state
            .lock()
            .expect("fake state poisoned")
            .failing_listings
            .insert(list_id.to_string());
    }
}

#[async_trait]
impl GoogleTasksClient for FakeTasksClient {
    async fn list_task_lists(&self, _access_token: &str) -> Result<Vec<TaskListSummary>, InfraError> {
        self.list_lists_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().expect("fake state poisoned");
        Ok(state.lists.iter().map(|(list, _)| list.clone()).collect())
    }

    async fn list_tasks(&self, _access_token: &str, list_id: &str) -> Result<Vec<GoogleTask>, InfraError> {
        self.list_tasks_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().expect("fake state poisoned");
        if state.failing_listings.contains(list_id) {
            return Err(InfraError::RemoteService(format!("listing {list_id} failed")));
        }
        state
            .lists
            .iter()
            .find(|(list, _)| list.id == list_id)
            .map(|(_, tasks)| tasks.clone())
            .ok_or_else(|| InfraError::RemoteService(format!("unknown list {list_id}")))
    }

    async fn get_task(
        &self,
        _access_token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<GoogleTask, InfraError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().expect("fake state poisoned");
        state
            .lists
            .iter()
            .find(|(list, _)| list.id == list_id)
            .and_then(|(_, tasks)| tasks.iter().find(|task| task.id.as_deref() == Some(task_id)))
            .cloned()
            .ok_or_else(|| InfraError::TaskNotFound {
                list_id: list_id.to_string(),
                task_id: task_id.to_string(),
            })
    }

    async fn insert_task(
        &self,
        _access_token: &str,
        list_id: &str,
        task: &NewTask,
    ) -> Result<GoogleTask, InfraError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("fake state poisoned");
        if state.failing_inserts.contains(list_id) {
            return Err(InfraError::Insertion {
                list_id: list_id.to_string(),
                message: "http 500".to_string(),
            });
        }

        state.next_id += 1;
        let created = GoogleTask {
            id: Some(format!("created-{}", state.next_id)),
            title: task.title.clone(),
            notes: task.notes.clone(),
            due: task.due.clone(),
            status: Some("needsAction".to_string()),
            ..GoogleTask::default()
        };
        state.inserted_payloads.push((list_id.to_string(), task.clone()));
        let (_, tasks) = state
            .lists
            .iter_mut()
            .find(|(list, _)| list.id == list_id)
            .ok_or_else(|| InfraError::Insertion {
                list_id: list_id.to_string(),
                message: "unknown list".to_string(),
            })?;
        tasks.push(created.clone());
        Ok(created)
    }

    async fn delete_task(&self, _access_token: &str, list_id: &str, task_id: &str) -> Result<(), InfraError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("fake state poisoned");
        let deletion_error = |message: &str| InfraError::Deletion {
            list_id: list_id.to_string(),
            task_id: task_id.to_string(),
            message: message.to_string(),
            duplicated_as: None,
        };
        if state.failing_deletes.contains(task_id) {
            return Err(deletion_error("http 503"));
        }

        let (_, tasks) = state
            .lists
            .iter_mut()
            .find(|(list, _)| list.id == list_id)
            .ok_or_else(|| deletion_error("unknown list"))?;
        let before = tasks.len();
        tasks.retain(|task| task.id.as_deref() != Some(task_id));
        if tasks.len() == before {
            return Err(deletion_error("http 404"));
        }
        Ok(())
    }
}
