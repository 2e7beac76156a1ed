use crate::domain::models::OAuthToken;
use crate::infrastructure::client_secrets::ClientSecrets;
use crate::infrastructure::consent_listener::LoopbackConsentListener;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::{
    OAuthCodeExchangeRequest, OAuthHttpClient, OAuthRefreshRequest, OAuthTokenResponse,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use url::Url;

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub(crate) const TOKEN_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    pub token_endpoint: String,
    pub authorization_endpoint: String,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
        }
    }

    pub fn from_client_secrets(secrets: ClientSecrets, scopes: Vec<String>) -> Self {
        let mut config = Self::new(secrets.client_id, secrets.client_secret, scopes);
        if let Some(token_uri) = secrets.token_uri {
            config.token_endpoint = token_uri;
        }
        if let Some(auth_uri) = secrets.auth_uri {
            config.authorization_endpoint = auth_uri;
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureTokenResult {
    Existing(OAuthToken),
    Refreshed(OAuthToken),
    /// The authorization server refused the stored refresh token.
    RefreshRejected(String),
    ReauthenticationRequired,
}

/// How a missing or unusable credential may be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentMode {
    /// Scheduled or non-terminal runs: fail instead of prompting.
    Disabled,
    Loopback { port: u16, timeout: StdDuration },
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
type UrlPresenter = Arc<dyn Fn(&str) + Send + Sync>;

pub struct OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    config: OAuthConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    now_provider: NowProvider,
    url_presenter: UrlPresenter,
}

impl<S, C> OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    pub fn new(config: OAuthConfig, credential_store: Arc<S>, oauth_client: Arc<C>) -> Self {
        Self {
            config,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
            url_presenter: Arc::new(|url: &str| {
                log::info!("Open this URL in a browser to authorize taskshift:\n\n    {url}\n");
                if let Err(error) = open::that(url) {
                    log::warn!("Could not open a browser automatically: {error}");
                }
            }),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn with_url_presenter(mut self, url_presenter: UrlPresenter) -> Self {
        self.url_presenter = url_presenter;
        self
    }

    pub fn is_token_valid(&self, token: &OAuthToken) -> bool {
        token.is_valid_at((self.now_provider)(), TOKEN_LEEWAY_SECONDS)
    }

    pub fn build_authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, InfraError> {
        if state.trim().is_empty() {
            return Err(InfraError::OAuth("state must not be empty".to_string()));
        }
        if self.config.scopes.is_empty() {
            return Err(InfraError::OAuth("at least one scope is required".to_string()));
        }

        let mut url = Url::parse(&self.config.authorization_endpoint)
            .map_err(|error| InfraError::OAuth(format!("invalid authorization endpoint: {error}")))?;
        let scope = self.config.scopes.join(" ");

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &scope)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);

        Ok(url.to_string())
    }

    pub async fn authenticate_with_code(
        &self,
        authorization_code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthToken, InfraError> {
        if authorization_code.trim().is_empty() {
            return Err(InfraError::Authentication(
                "authorization code must not be empty".to_string(),
            ));
        }

        let response = self
            .oauth_client
            .exchange_authorization_code(OAuthCodeExchangeRequest {
                token_endpoint: self.config.token_endpoint.clone(),
                client_id: self.config.client_id.clone(),
                client_secret: self.config.client_secret.clone(),
                redirect_uri: redirect_uri.to_string(),
                authorization_code: authorization_code.trim().to_string(),
            })
            .await
            .map_err(|error| match error {
                InfraError::OAuth(message) => {
                    InfraError::Authentication(format!("authorization code was rejected: {message}"))
                }
                other => other,
            })?;

        let token = self.token_from_response(response, None);
        self.credential_store.save_token(&token)?;
        Ok(token)
    }

    pub async fn ensure_access_token(&self) -> Result<EnsureTokenResult, InfraError> {
        let Some(stored_token) = self.credential_store.load_token()? else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        if self.is_token_valid(&stored_token) {
            return Ok(EnsureTokenResult::Existing(stored_token));
        }

        let Some(refresh_token) = stored_token.refresh_token.clone() else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        let refreshed = self
            .oauth_client
            .refresh_access_token(OAuthRefreshRequest {
                token_endpoint: self.config.token_endpoint.clone(),
                client_id: self.config.client_id.clone(),
                client_secret: self.config.client_secret.clone(),
                refresh_token,
            })
            .await;

        match refreshed {
            Ok(response) => {
                let token = self.token_from_response(response, stored_token.refresh_token.clone());
                self.credential_store.save_token(&token)?;
                Ok(EnsureTokenResult::Refreshed(token))
            }
            Err(InfraError::OAuth(reason)) => Ok(EnsureTokenResult::RefreshRejected(reason)),
            Err(error) => Err(error),
        }
    }

    /// Returns a usable credential, refreshing or re-consenting as needed.
    ///
    /// Every newly acquired or refreshed credential is persisted before it is
    /// returned.
    pub async fn obtain(&self, consent: &ConsentMode) -> Result<OAuthToken, InfraError> {
        let rejected_refresh = match self.ensure_access_token().await? {
            EnsureTokenResult::Existing(token) => {
                log::debug!("reusing stored access token (expires {})", token.expires_at.to_rfc3339());
                return Ok(token);
            }
            EnsureTokenResult::Refreshed(token) => {
                log::info!("Refreshed access token (expires {})", token.expires_at.to_rfc3339());
                return Ok(token);
            }
            EnsureTokenResult::RefreshRejected(reason) => Some(reason),
            EnsureTokenResult::ReauthenticationRequired => None,
        };

        match consent {
            ConsentMode::Loopback { port, timeout } => {
                if let Some(reason) = &rejected_refresh {
                    log::warn!("Stored refresh token was rejected ({reason}); requesting consent again");
                }
                self.authenticate_interactively(*port, *timeout).await
            }
            ConsentMode::Disabled => Err(match rejected_refresh {
                Some(reason) => InfraError::CredentialRefresh(reason),
                None => InfraError::Authentication(
                    "no usable stored credential and interactive consent is unavailable; \
                     run `taskshift auth` from a terminal"
                        .to_string(),
                ),
            }),
        }
    }

    async fn authenticate_interactively(&self, port: u16, timeout: StdDuration) -> Result<OAuthToken, InfraError> {
        let listener = LoopbackConsentListener::bind(port)?;
        let redirect_uri = listener.redirect_uri().to_string();
        let state = consent_state((self.now_provider)());
        let authorization_url = self.build_authorization_url(&redirect_uri, &state)?;

        (self.url_presenter)(&authorization_url);
        let code = listener.wait_for_code(&state, timeout).await?;
        let token = self.authenticate_with_code(&code, &redirect_uri).await?;
        log::info!("Authorization complete; credential stored");
        Ok(token)
    }

    fn token_from_response(
        &self,
        response: OAuthTokenResponse,
        fallback_refresh_token: Option<String>,
    ) -> OAuthToken {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        OAuthToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh_token),
            expires_at,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: response.scope,
        }
    }
}

fn consent_state(now: DateTime<Utc>) -> String {
    format!(
        "taskshift-{}-{}",
        std::process::id(),
        now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros())
    )
}
