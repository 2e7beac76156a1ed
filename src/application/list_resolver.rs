use crate::domain::models::{ResolvedLists, TaskListSummary};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_tasks_client::GoogleTasksClient;
use std::sync::Arc;

/// Splits `lists` into the destination list and the scanned sources.
///
/// A configured primary id wins; otherwise the first enumerated list is
/// primary. Secondary lists keep enumeration order.
pub fn designate(
    lists: Vec<TaskListSummary>,
    configured_primary: Option<&str>,
) -> Result<ResolvedLists, InfraError> {
    if lists.is_empty() {
        return Err(InfraError::NoListsFound);
    }

    let primary_index = match configured_primary {
        Some(primary_id) => lists
            .iter()
            .position(|list| list.id == primary_id)
            .ok_or_else(|| {
                InfraError::InvalidConfig(format!(
                    "primary list {primary_id:?} is not among this account's task lists"
                ))
            })?,
        None => 0,
    };

    let mut secondary = lists;
    let primary = secondary.remove(primary_index);
    Ok(ResolvedLists { primary, secondary })
}

pub struct ListResolver<C>
where
    C: GoogleTasksClient,
{
    tasks_client: Arc<C>,
    configured_primary: Option<String>,
}

impl<C> ListResolver<C>
where
    C: GoogleTasksClient,
{
    pub fn new(tasks_client: Arc<C>, configured_primary: Option<String>) -> Self {
        Self {
            tasks_client,
            configured_primary,
        }
    }

    pub async fn resolve(&self, access_token: &str) -> Result<ResolvedLists, InfraError> {
        let lists = self.tasks_client.list_task_lists(access_token).await?;
        log::debug!("account has {} task list(s)", lists.len());

        let resolved = designate(lists, self.configured_primary.as_deref())?;
        log::info!(
            "Primary list: {} ({}); scanning {} secondary list(s)",
            resolved.primary.title,
            resolved.primary.id,
            resolved.secondary.len()
        );
        Ok(resolved)
    }
}
