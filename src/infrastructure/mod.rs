pub mod client_secrets;
pub mod config;
pub mod consent_listener;
pub mod credential_store;
pub mod error;
#[cfg(test)]
pub mod fake_tasks_client;
pub mod google_tasks_client;
pub mod oauth_client;
