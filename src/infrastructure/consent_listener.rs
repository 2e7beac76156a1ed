//! One-shot loopback HTTP receiver for the OAuth consent redirect.
//!
//! The browser is sent to Google's consent page with `redirect_uri` pointing
//! at `http://127.0.0.1:<port>/`. Google then redirects back with either
//! `code` and `state`, or `error`. Requests carrying neither (favicon fetches
//! and the like) get a 404 and the listener keeps waiting. Connections are
//! served by `tiny_http`'s worker threads, so a connection that never sends a
//! request does not hold up the redirect.

use crate::infrastructure::error::InfraError;
use std::time::{Duration, Instant};
use tiny_http::{Header, Request, Response, Server};
use url::Url;

const SUCCESS_PAGE: &str =
    "<html><body><h1>taskshift is authorized</h1><p>You can close this window.</p></body></html>";
const FAILURE_PAGE: &str =
    "<html><body><h1>taskshift authorization failed</h1><p>See the terminal for details.</p></body></html>";

#[derive(Debug, Clone, PartialEq, Eq)]
enum RedirectOutcome {
    Code { code: String, state: Option<String> },
    Denied(String),
    Unrelated,
}

pub struct LoopbackConsentListener {
    server: Server,
    redirect_uri: String,
}

impl LoopbackConsentListener {
    /// Binds `127.0.0.1:port`; port 0 picks an ephemeral one.
    pub fn bind(port: u16) -> Result<Self, InfraError> {
        let server = Server::http(("127.0.0.1", port)).map_err(|error| {
            InfraError::Authentication(format!("failed to start consent listener on port {port}: {error}"))
        })?;
        let bound = server.server_addr().to_ip().ok_or_else(|| {
            InfraError::Authentication("consent listener is not bound to an IP address".to_string())
        })?;
        Ok(Self {
            server,
            redirect_uri: format!("http://127.0.0.1:{}/", bound.port()),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub async fn wait_for_code(self, expected_state: &str, timeout: Duration) -> Result<String, InfraError> {
        let expected_state = expected_state.to_string();
        tokio::task::spawn_blocking(move || self.receive_redirect(&expected_state, timeout))
            .await
            .map_err(|error| InfraError::Authentication(format!("consent listener stopped: {error}")))?
    }

    fn receive_redirect(&self, expected_state: &str, timeout: Duration) -> Result<String, InfraError> {
        let timed_out = || {
            InfraError::Authentication(format!(
                "no consent redirect received within {}s",
                timeout.as_secs()
            ))
        };
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }
            let Some(request) = self.server.recv_timeout(remaining)? else {
                return Err(timed_out());
            };

            match parse_redirect_target(request.url()) {
                RedirectOutcome::Unrelated => {
                    log::debug!("ignoring consent listener request for {}", request.url());
                    respond(request, 404, "");
                }
                RedirectOutcome::Denied(reason) => {
                    respond(request, 200, FAILURE_PAGE);
                    return Err(InfraError::Authentication(format!("consent was not granted: {reason}")));
                }
                RedirectOutcome::Code { code, state } => {
                    if state.as_deref() != Some(expected_state) {
                        respond(request, 400, FAILURE_PAGE);
                        return Err(InfraError::Authentication(
                            "consent redirect carried an unexpected state".to_string(),
                        ));
                    }
                    respond(request, 200, SUCCESS_PAGE);
                    return Ok(code);
                }
            }
        }
    }
}

fn parse_redirect_target(target: &str) -> RedirectOutcome {
    let Ok(url) = Url::parse("http://127.0.0.1/").and_then(|base| base.join(target)) else {
        return RedirectOutcome::Unrelated;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return RedirectOutcome::Denied(error);
    }
    match code.filter(|value| !value.trim().is_empty()) {
        Some(code) => RedirectOutcome::Code { code, state },
        None => RedirectOutcome::Unrelated,
    }
}

fn respond(request: Request, status: u16, body: &str) {
    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        response = response.with_header(header);
    }
    if let Err(error) = request.respond(response) {
        log::debug!("failed writing consent response: {error}");
    }
}
