//! The error-page listener bound to the protected service's configured
//! port (spec.md §7: "the Enforcer presents a static error page ... so
//! that web clients reaching the port learn why the application is
//! unavailable rather than getting a connection refusal").
//!
//! While the machine is `Running`/`Grace` this binary does not occupy the
//! port at all in a real deployment — the protected Compose stack itself
//! listens there. This fallback exists for the window before activation
//! and after a transition to `Invalid`/`Terminated`, and doubles as a
//! lightweight liveness probe for whatever's in front of it.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Router;

use lic_enforcer::{Agent, LoggingSupervisor};

/// Build the router served on [`crate::config::EnforcerConfig::protected_listen_addr`].
pub fn router(agent: Arc<Agent<LoggingSupervisor>>) -> Router {
    Router::new().fallback(status).with_state(agent)
}

async fn status(State(agent): State<Arc<Agent<LoggingSupervisor>>>) -> Response {
    if agent.current_state().await.serves_protected_traffic() {
        (StatusCode::OK, "licensed service is running").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Html(agent.error_page().await)).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use lic_enforcer::EnforcerConfig;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_config(dir: &std::path::Path) -> EnforcerConfig {
        EnforcerConfig {
            install_dir: dir.to_path_buf(),
            issuer_base_url: "https://issuer.invalid".to_string(),
            revalidation_interval: Duration::from_secs(3600),
            heartbeat_interval: Duration::from_secs(60),
            required_service: None,
        }
    }

    #[tokio::test]
    async fn unactivated_machine_serves_error_page() {
        let dir = tempfile::TempDir::new().unwrap();
        let agent = Arc::new(Agent::new(test_config(dir.path()), LoggingSupervisor).unwrap());
        agent.startup_check().await.unwrap();

        let app = router(agent);
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("not been activated"));
    }
}
