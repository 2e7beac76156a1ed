use crate::application::bootstrap::{BootstrapResult, bootstrap_workspace};
use crate::application::bulk_clear::{BulkClear, ClearReport};
use crate::application::deadline_scanner::{DeadlineScanner, ScanReport};
use crate::application::list_resolver::ListResolver;
use crate::application::oauth::{ConsentMode, OAuthConfig, OAuthManager, TOKEN_LEEWAY_SECONDS};
use crate::domain::models::{OAuthToken, ResolvedLists};
use crate::infrastructure::client_secrets::load_client_secrets;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::credential_store::{ConfiguredCredentialStore, CredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_tasks_client::{GoogleTasksClient, ReqwestGoogleTasksClient};
use crate::infrastructure::oauth_client::{OAuthHttpClient, ReqwestOAuthClient};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

pub struct AppState<S, O, T>
where
    S: CredentialStore,
    O: OAuthHttpClient,
    T: GoogleTasksClient,
{
    workspace_root: PathBuf,
    config_dir: PathBuf,
    config: AppConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<O>,
    tasks_client: Arc<T>,
    consent: ConsentMode,
}

pub type LiveAppState = AppState<ConfiguredCredentialStore, ReqwestOAuthClient, ReqwestGoogleTasksClient>;

impl LiveAppState {
    pub fn new(workspace_root: PathBuf, interactive: bool) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let credential_store =
            ConfiguredCredentialStore::for_backend(bootstrap.config.credential_backend, bootstrap.token_path.clone());
        log::debug!("credential store: {}", credential_store.describe());

        let consent = if interactive {
            ConsentMode::Loopback {
                port: bootstrap.config.consent_port,
                timeout: StdDuration::from_secs(bootstrap.config.consent_timeout_seconds),
            }
        } else {
            ConsentMode::Disabled
        };

        Ok(Self::with_clients(
            bootstrap,
            Arc::new(credential_store),
            Arc::new(ReqwestOAuthClient::new()),
            Arc::new(ReqwestGoogleTasksClient::new()),
            consent,
        ))
    }
}

impl<S, O, T> AppState<S, O, T>
where
    S: CredentialStore,
    O: OAuthHttpClient,
    T: GoogleTasksClient,
{
    pub fn with_clients(
        bootstrap: BootstrapResult,
        credential_store: Arc<S>,
        oauth_client: Arc<O>,
        tasks_client: Arc<T>,
        consent: ConsentMode,
    ) -> Self {
        Self {
            workspace_root: bootstrap.workspace_root,
            config_dir: bootstrap.config_dir,
            config: bootstrap.config,
            credential_store,
            oauth_client,
            tasks_client,
            consent,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn oauth_manager(&self) -> Result<OAuthManager<S, O>, InfraError> {
        let secrets = load_client_secrets(&self.config.client_secrets_path(&self.config_dir))?;
        let scopes = self
            .config
            .scopes
            .iter()
            .map(|scope| scope.trim())
            .filter(|scope| !scope.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        Ok(OAuthManager::new(
            OAuthConfig::from_client_secrets(secrets, scopes),
            Arc::clone(&self.credential_store),
            Arc::clone(&self.oauth_client),
        ))
    }

    /// A still-valid stored token is returned without reading the client
    /// secrets; those are only needed to refresh or to ask for consent.
    async fn obtain_token(&self) -> Result<OAuthToken, InfraError> {
        if let Some(token) = self.credential_store.load_token()? {
            if token.is_valid_at(Utc::now(), TOKEN_LEEWAY_SECONDS) {
                log::debug!("reusing stored access token (expires {})", token.expires_at.to_rfc3339());
                return Ok(token);
            }
        }
        self.oauth_manager()?.obtain(&self.consent).await
    }

    async fn access_token(&self) -> Result<String, InfraError> {
        Ok(self.obtain_token().await?.access_token)
    }

    fn list_resolver(&self, primary_override: Option<String>) -> ListResolver<T> {
        let configured_primary = primary_override
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.config.primary_list_id().map(ToOwned::to_owned));
        ListResolver::new(Arc::clone(&self.tasks_client), configured_primary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The account has no task lists; nothing was scanned.
    NoLists,
    Scanned(ScanReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearTarget {
    All,
    Lists(Vec<String>),
}

pub async fn authenticate_impl<S, O, T>(state: &AppState<S, O, T>) -> Result<OAuthToken, InfraError>
where
    S: CredentialStore,
    O: OAuthHttpClient,
    T: GoogleTasksClient,
{
    let token = state.obtain_token().await?;
    log::info!("Credential valid until {}", token.expires_at.to_rfc3339());
    Ok(token)
}

pub fn logout_impl<S, O, T>(state: &AppState<S, O, T>) -> Result<(), InfraError>
where
    S: CredentialStore,
    O: OAuthHttpClient,
    T: GoogleTasksClient,
{
    state.credential_store.delete_token()?;
    log::info!("Stored credential removed");
    Ok(())
}

pub async fn list_lists_impl<S, O, T>(
    state: &AppState<S, O, T>,
    primary_override: Option<String>,
) -> Result<ResolvedLists, InfraError>
where
    S: CredentialStore,
    O: OAuthHttpClient,
    T: GoogleTasksClient,
{
    let access_token = state.access_token().await?;
    state.list_resolver(primary_override).resolve(&access_token).await
}

/// One scheduled pass: authenticate, resolve lists, move tasks due soon.
///
/// `now` is converted once into the configured timezone and used for the
/// whole scan.
pub async fn run_scan_impl<S, O, T>(
    state: &AppState<S, O, T>,
    primary_override: Option<String>,
    now: DateTime<Utc>,
) -> Result<RunOutcome, InfraError>
where
    S: CredentialStore,
    O: OAuthHttpClient,
    T: GoogleTasksClient,
{
    let time_zone = state.config.time_zone()?;
    let lookahead = state.config.lookahead()?;
    let access_token = state.access_token().await?;

    let lists = match state.list_resolver(primary_override).resolve(&access_token).await {
        Ok(lists) => lists,
        Err(InfraError::NoListsFound) => {
            log::warn!("No task lists found for this account; nothing to do");
            return Ok(RunOutcome::NoLists);
        }
        Err(error) => return Err(error),
    };

    let local_now = now.with_timezone(&time_zone);
    let scanner = DeadlineScanner::new(Arc::clone(&state.tasks_client), lookahead);
    let report = scanner
        .scan(&access_token, &lists.primary.id, &lists.secondary, &local_now)
        .await;

    if !report.failures.is_empty() {
        log::warn!(
            "{} task(s) moved, {} failure(s)",
            report.moved.len(),
            report.failures.len()
        );
    }
    Ok(RunOutcome::Scanned(report))
}

pub async fn clear_impl<S, O, T>(state: &AppState<S, O, T>, target: ClearTarget) -> Result<ClearReport, InfraError>
where
    S: CredentialStore,
    O: OAuthHttpClient,
    T: GoogleTasksClient,
{
    let access_token = state.access_token().await?;
    let list_ids = match target {
        ClearTarget::All => state
            .tasks_client
            .list_task_lists(&access_token)
            .await?
            .into_iter()
            .map(|list| list.id)
            .collect::<Vec<_>>(),
        ClearTarget::Lists(ids) => ids,
    };

    Ok(BulkClear::new(Arc::clone(&state.tasks_client))
        .clear_all(&access_token, &list_ids)
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::client_secrets::load_client_secrets_with_lookup;
    use crate::infrastructure::credential_store::InMemoryCredentialStore;
    use crate::infrastructure::fake_tasks_client::{FakeTasksClient, task};
    use crate::infrastructure::oauth_client::{OAuthCodeExchangeRequest, OAuthRefreshRequest, OAuthTokenResponse};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const CLIENT_SECRETS: &str = r#"{
        "installed": { "client_id": "test-id", "client_secret": "test-secret" }
    }"#;

    #[derive(Debug, Default)]
    struct OfflineOAuthClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OAuthHttpClient for OfflineOAuthClient {
        async fn exchange_authorization_code(
            &self,
            _request: OAuthCodeExchangeRequest,
        ) -> Result<OAuthTokenResponse, InfraError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(InfraError::RemoteService("offline".to_string()))
        }

        async fn refresh_access_token(
            &self,
            _request: OAuthRefreshRequest,
        ) -> Result<OAuthTokenResponse, InfraError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(InfraError::RemoteService("offline".to_string()))
        }
    }

    struct Harness {
        _workspace: TempDir,
        store: Arc<InMemoryCredentialStore>,
        oauth: Arc<OfflineOAuthClient>,
        tasks: Arc<FakeTasksClient>,
        state: AppState<InMemoryCredentialStore, OfflineOAuthClient, FakeTasksClient>,
    }

    fn harness(lists: &[(&str, &str)], with_token: bool) -> Harness {
        let workspace = TempDir::new().expect("temp dir");
        let bootstrap = bootstrap_workspace(workspace.path()).expect("bootstrap");
        fs::write(bootstrap.config_dir.join("credentials.json"), CLIENT_SECRETS).expect("client secrets");

        let store = Arc::new(InMemoryCredentialStore::default());
        if with_token {
            store
                .save_token(&OAuthToken {
                    access_token: "stored-access".to_string(),
                    refresh_token: Some("stored-refresh".to_string()),
                    expires_at: Utc::now() + Duration::hours(1),
                    token_type: "Bearer".to_string(),
                    scope: None,
                })
                .expect("save token");
        }
        let oauth = Arc::new(OfflineOAuthClient::default());
        let tasks = Arc::new(FakeTasksClient::with_lists(lists));
        let state = AppState::with_clients(
            bootstrap,
            Arc::clone(&store),
            Arc::clone(&oauth),
            Arc::clone(&tasks),
            ConsentMode::Disabled,
        );
        Harness {
            _workspace: workspace,
            store,
            oauth,
            tasks,
            state,
        }
    }

    fn scan_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 9, 22, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn run_moves_due_tasks_into_first_list() {
        let harness = harness(&[("inbox", "Inbox"), ("later", "Later")], true);
        harness
            .tasks
            .add_task("later", task("t1", "File taxes", Some("2024-11-11T00:00:00.000Z"), Some("by 17:00")));
        harness
            .tasks
            .add_task("later", task("t2", "Plan trip", Some("2024-12-01T00:00:00.000Z"), None));

        let outcome = run_scan_impl(&harness.state, None, scan_time()).await.expect("run");

        match outcome {
            RunOutcome::Scanned(report) => {
                assert_eq!(report.moved.len(), 1);
                assert_eq!(report.moved[0].destination_list_id, "inbox");
                assert_eq!(report.moved[0].deadline_time.as_deref(), Some("17:00"));
            }
            other => panic!("expected scan, got {other:?}"),
        }
        assert_eq!(harness.tasks.task_ids("later"), vec!["t2"]);
        assert_eq!(harness.oauth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_honours_primary_override() {
        let harness = harness(&[("inbox", "Inbox"), ("today", "Today")], true);
        harness
            .tasks
            .add_task("inbox", task("t1", "Call bank", Some("2024-11-10T08:00:00.000Z"), None));

        run_scan_impl(&harness.state, Some("today".to_string()), scan_time())
            .await
            .expect("run");

        assert!(harness.tasks.task_ids("inbox").is_empty());
        assert_eq!(harness.tasks.tasks("today").len(), 1);
    }

    #[tokio::test]
    async fn run_without_lists_ends_cleanly() {
        let harness = harness(&[], true);
        let outcome = run_scan_impl(&harness.state, None, scan_time()).await.expect("run");
        assert_eq!(outcome, RunOutcome::NoLists);
        assert_eq!(harness.tasks.list_tasks_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_without_credential_fails_when_not_interactive() {
        let harness = harness(&[("inbox", "Inbox")], false);
        assert!(matches!(
            run_scan_impl(&harness.state, None, scan_time()).await,
            Err(InfraError::Authentication(_))
        ));
        assert_eq!(harness.tasks.list_lists_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_client_secrets_is_a_config_error() {
        let harness = harness(&[("inbox", "Inbox")], true);
        let path = harness.state.config.client_secrets_path(&harness.state.config_dir);
        fs::remove_file(&path).expect("remove secrets");

        assert!(matches!(
            load_client_secrets_with_lookup(&path, |_| None),
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn valid_stored_token_does_not_need_client_secrets() {
        let harness = harness(&[("inbox", "Inbox"), ("later", "Later")], true);
        fs::remove_file(harness.state.config_dir.join("credentials.json")).expect("remove secrets");

        let token = authenticate_impl(&harness.state).await.expect("stored token");
        assert_eq!(token.access_token, "stored-access");
        let lists = list_lists_impl(&harness.state, None).await.expect("lists");
        assert_eq!(lists.primary.id, "inbox");
        assert_eq!(harness.oauth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_stored_token_is_refreshed_through_client_secrets() {
        let harness = harness(&[("inbox", "Inbox")], false);
        harness
            .store
            .save_token(&OAuthToken {
                access_token: "stale".to_string(),
                refresh_token: Some("stored-refresh".to_string()),
                expires_at: Utc::now() - Duration::minutes(5),
                token_type: "Bearer".to_string(),
                scope: None,
            })
            .expect("save token");

        assert!(matches!(
            authenticate_impl(&harness.state).await,
            Err(InfraError::RemoteService(_))
        ));
        assert_eq!(harness.oauth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_all_empties_every_list() {
        let harness = harness(&[("inbox", "Inbox"), ("later", "Later")], true);
        harness.tasks.add_task("inbox", task("a", "A", None, None));
        harness.tasks.add_task("later", task("b", "B", None, None));

        let report = clear_impl(&harness.state, ClearTarget::All).await.expect("clear");
        assert_eq!(report.deleted, 2);
        assert!(harness.tasks.task_ids("inbox").is_empty());
        assert!(harness.tasks.task_ids("later").is_empty());
    }

    #[tokio::test]
    async fn lists_reports_designation() {
        let harness = harness(&[("inbox", "Inbox"), ("later", "Later"), ("someday", "Someday")], true);
        let lists = list_lists_impl(&harness.state, None).await.expect("lists");
        assert_eq!(lists.primary.id, "inbox");
        assert_eq!(lists.all_ids(), vec!["inbox", "later", "someday"]);
    }

    #[test]
    fn logout_removes_stored_credential() {
        let harness = harness(&[], true);
        logout_impl(&harness.state).expect("logout");
        assert_eq!(harness.store.load_token().expect("load"), None);
        logout_impl(&harness.state).expect("second logout");
    }
}
