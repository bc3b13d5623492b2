//! A thin `reqwest`-based client for the Issuer's wire protocol (spec.md
//! §6), used by the Enforcer to activate, validate, heartbeat, and
//! upgrade against a remote Issuer.
//!
//! spec.md §5: outbound calls are bounded to seconds, not minutes, and
//! the heartbeat in particular uses an aggressive timeout because an
//! unreachable Issuer is the expected degraded operating mode, not an
//! exceptional one — see [`IssuerClient::heartbeat`], which never
//! returns `Err` for a network failure.

use std::time::Duration;

use lic_retry_error::RetryError;
use lic_wire::{
    ActivateRequest, ActivateResponse, HeartbeatReason, HeartbeatRequest, HeartbeatResponse, UpgradeRequest,
    UpgradeResponse, ValidateRequest, ValidateResponse,
};

/// Default timeout for calls other than the heartbeat (spec.md §5:
/// "seconds, not minutes").
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The heartbeat's own, more aggressive timeout (spec.md §4.6, §5: offline
/// operation is the expected degraded mode, so the Enforcer should not
/// wait long to discover it).
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(3);

/// How many times `activate`/`validate`/`upgrade` retry a failed call
/// before giving up (spec.md §5: these calls have no degraded fallback, so
/// a single dropped packet should not fail an activation outright).
const MAX_ATTEMPTS: usize = 3;

/// Delay between retry attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// The outcome of calling [`IssuerClient::heartbeat`]: either the Issuer
/// answered, or it didn't, in which case the caller treats this as
/// `server_check_skipped` rather than an error (spec.md §4.6: "best-effort
/// ... does not by itself cause a transition").
#[derive(Clone, Debug)]
pub enum HeartbeatOutcome {
    /// The Issuer was reached and answered.
    Reached(HeartbeatResponse),
    /// The Issuer could not be reached within [`HEARTBEAT_TIMEOUT`], or
    /// returned a response that didn't parse.
    Unreachable,
}

impl HeartbeatOutcome {
    /// Treat an unreachable Issuer as a locally synthesized
    /// `server_check_skipped`, still valid, response — the shape callers
    /// that don't care about the distinction can fold on directly.
    pub fn or_skipped(self) -> HeartbeatResponse {
        match self {
            HeartbeatOutcome::Reached(r) => r,
            HeartbeatOutcome::Unreachable => HeartbeatResponse {
                valid: true,
                reason: HeartbeatReason::ServerCheckSkipped,
                customer_name: None,
                tier: None,
            },
        }
    }
}

/// A client for the six Issuer HTTP endpoints an Enforcer calls (spec.md
/// §6); everything except [`IssuerClient::heartbeat`] surfaces transport
/// failures as [`lic_error::Error`], since those callers (activation,
/// startup validation, an explicit upgrade) have no sensible degraded
/// behavior to fall back to.
pub struct IssuerClient {
    http: reqwest::Client,
    base_url: String,
}

impl IssuerClient {
    /// Point a client at `base_url` (e.g. `https://issuer.example:8443`).
    pub fn new(base_url: impl Into<String>) -> lic_error::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Network, "building HTTP client", e))?;
        Ok(IssuerClient {
            http,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `POST /api/v1/activate`.
    pub async fn activate(&self, req: &ActivateRequest) -> lic_error::Result<ActivateResponse> {
        self.post_json("/api/v1/activate", req).await
    }

    /// `POST /api/v1/validate`.
    pub async fn validate(&self, req: &ValidateRequest) -> lic_error::Result<ValidateResponse> {
        self.post_json("/api/v1/validate", req).await
    }

    /// `POST /api/v1/upgrade`.
    pub async fn upgrade(&self, req: &UpgradeRequest) -> lic_error::Result<UpgradeResponse> {
        self.post_json("/api/v1/upgrade", req).await
    }

    /// `GET /api/v1/public-key`, returned as PEM text.
    pub async fn fetch_public_key(&self) -> lic_error::Result<String> {
        self.get_text("/api/v1/public-key").await
    }

    /// `GET /api/v1/compose/{fingerprint}`, returned as Compose YAML text.
    pub async fn fetch_compose(&self, fingerprint: &str) -> lic_error::Result<String> {
        self.get_text(&format!("/api/v1/compose/{fingerprint}")).await
    }

    /// `POST /api/v1/heartbeat`, with a short timeout and no error path:
    /// an unreachable Issuer resolves to [`HeartbeatOutcome::Unreachable`]
    /// rather than `Err`.
    pub async fn heartbeat(&self, req: &HeartbeatRequest) -> HeartbeatOutcome {
        let result = self
            .http
            .post(self.url("/api/v1/heartbeat"))
            .timeout(HEARTBEAT_TIMEOUT)
            .json(req)
            .send()
            .await;
        let Ok(response) = result else {
            return HeartbeatOutcome::Unreachable;
        };
        match response.json::<HeartbeatResponse>().await {
            Ok(parsed) => HeartbeatOutcome::Reached(parsed),
            Err(_) => HeartbeatOutcome::Unreachable,
        }
    }

    /// `POST path` with `req` as the JSON body, retrying transport and
    /// parse failures [`MAX_ATTEMPTS`] times before giving up.
    async fn post_json<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        req: &Req,
    ) -> lic_error::Result<Resp> {
        let mut retry: RetryError<lic_error::Error> = RetryError::in_attempt_to(format!("POST {path}"));
        for attempt in 1..=MAX_ATTEMPTS {
            match self.post_json_once(path, req).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    retry.push(e);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(RETRY_BACKOFF).await;
                    }
                }
            }
        }
        Err(lic_error::Error::wrap(
            lic_error::ErrorKind::Network,
            format!("exhausted {MAX_ATTEMPTS} attempts"),
            retry,
        ))
    }

    async fn post_json_once<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        req: &Req,
    ) -> lic_error::Result<Resp> {
        let response = self
            .http
            .post(self.url(path))
            .json(req)
            .send()
            .await
            .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Network, format!("POST {path}"), e))?;
        response
            .json::<Resp>()
            .await
            .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Network, format!("parsing response from {path}"), e))
    }

    async fn get_text(&self, path: &str) -> lic_error::Result<String> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Network, format!("GET {path}"), e))?;
        response
            .text()
            .await
            .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Network, format!("reading response from {path}"), e))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn url_joins_base_and_path_without_double_slash() {
        let client = IssuerClient::new("https://issuer.example/").unwrap();
        assert_eq!(client.url("/api/v1/activate"), "https://issuer.example/api/v1/activate");
    }

    #[test]
    fn unreachable_heartbeat_falls_back_to_server_check_skipped() {
        let outcome = HeartbeatOutcome::Unreachable;
        let response = outcome.or_skipped();
        assert!(response.valid);
        assert_eq!(response.reason, HeartbeatReason::ServerCheckSkipped);
    }

    #[tokio::test]
    async fn activate_exhausts_retries_against_an_unreachable_issuer() {
        // Port 0 never accepts a connection, so every attempt fails fast.
        let client = IssuerClient::new("http://127.0.0.1:0").unwrap();
        let err = client
            .activate(&ActivateRequest {
                product_key: "k".to_string(),
                machine_fingerprint: "f".to_string(),
                hostname: "h".to_string(),
                os_info: "o".to_string(),
                app_version: "1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exhausted 3 attempts"));
    }
}
