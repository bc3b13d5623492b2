//! Wires the bundle store, Issuer client, state machine, and
//! [`lic_rtcompat::Scheduler`] together into the thing `licentia-enforcer`
//! actually runs (spec.md §4.6, §5): a startup check that must complete
//! before protected services start, followed by a background
//! revalidation-and-heartbeat loop on a cancellable timer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;

use lic_fingerprint::{check_and_pin, PinOutcome, RealProbes};
use lic_rtcompat::{Scheduler, TaskType};
use lic_wire::{HeartbeatRequest, ValidationReason};

use crate::bundle::BundleStore;
use crate::client::IssuerClient;
use crate::state::{local_check, next_state, next_state_after_heartbeat, EnforcerState};
use crate::supervisor::ServiceSupervisor;

/// Static configuration for one running [`Agent`].
#[derive(Clone, Debug)]
pub struct EnforcerConfig {
    /// Root directory of the activation bundle (spec.md §6).
    pub install_dir: PathBuf,
    /// Base URL of the Issuer this Enforcer talks to.
    pub issuer_base_url: String,
    /// How often to re-run [`Agent::revalidate_once`] in the background.
    pub revalidation_interval: Duration,
    /// How often to run [`Agent::heartbeat_once`] in the background.
    pub heartbeat_interval: Duration,
    /// An application service name this installation requires, if any.
    pub required_service: Option<String>,
}

/// The mutable parts of the machine's current verdict, behind one lock so
/// a background tick and a status read never observe a torn update.
struct AgentInner {
    state: EnforcerState,
    last_reason: ValidationReason,
    fingerprint: Option<String>,
}

/// The running Enforcer agent for one installation.
pub struct Agent<S: ServiceSupervisor + 'static> {
    bundle: BundleStore,
    client: IssuerClient,
    supervisor: Arc<S>,
    scheduler: Scheduler,
    config: EnforcerConfig,
    inner: Arc<Mutex<AgentInner>>,
}

impl<S: ServiceSupervisor + 'static> Agent<S> {
    /// Build an agent for `config`, talking to its Issuer through a fresh
    /// [`IssuerClient`] and supervising services through `supervisor`.
    pub fn new(config: EnforcerConfig, supervisor: S) -> lic_error::Result<Self> {
        let client = IssuerClient::new(config.issuer_base_url.clone())?;
        Ok(Agent {
            bundle: BundleStore::new(config.install_dir.clone()),
            client,
            supervisor: Arc::new(supervisor),
            scheduler: Scheduler::new(),
            config,
            inner: Arc::new(Mutex::new(AgentInner {
                state: EnforcerState::Unactivated,
                last_reason: ValidationReason::NotActivated,
                fingerprint: None,
            })),
        })
    }

    /// The bundle store this agent reads and writes.
    pub fn bundle(&self) -> &BundleStore {
        &self.bundle
    }

    /// The Issuer client this agent calls.
    pub fn client(&self) -> &IssuerClient {
        &self.client
    }

    /// The machine's current state.
    pub async fn current_state(&self) -> EnforcerState {
        self.inner.lock().await.state
    }

    /// Render the static error page for the machine's last known reason.
    pub async fn error_page(&self) -> String {
        crate::errorpage::render(&self.inner.lock().await.last_reason)
    }

    /// The startup check (spec.md §5): reconcile the hardware fingerprint,
    /// load any existing bundle, and run the full local check before
    /// protected services are allowed to start.
    pub async fn startup_check(&self) -> lic_error::Result<EnforcerState> {
        let hostname = RealProbes.hostname().unwrap_or_else(|| "unknown".to_string());
        let pin_outcome = check_and_pin(&RealProbes, &self.bundle.machine_id_path(), &hostname, || {
            Utc::now().to_rfc3339()
        })
        .map_err(|e| lic_error::Error::wrap(lic_error::ErrorKind::Internal, "deriving hardware fingerprint", e))?;

        let fingerprint = match pin_outcome {
            PinOutcome::Mismatch { .. } => {
                return self.transition_to_invalid(ValidationReason::FingerprintMismatch).await;
            }
            PinOutcome::FirstPin { fingerprint } | PinOutcome::Match { fingerprint } => fingerprint,
        };
        self.inner.lock().await.fingerprint = Some(fingerprint.clone());

        if !self.bundle.exists() {
            return self.transition_to(EnforcerState::Unactivated, ValidationReason::NotActivated).await;
        }

        self.revalidate_once().await
    }

    /// Re-run the local check against the on-disk bundle (spec.md §4.6's
    /// periodic revalidation), updating state and the protected services
    /// accordingly.
    pub async fn revalidate_once(&self) -> lic_error::Result<EnforcerState> {
        let fingerprint = self.inner.lock().await.fingerprint.clone();
        let Some(fingerprint) = fingerprint else {
            return self.transition_to(EnforcerState::Unactivated, ValidationReason::NotActivated).await;
        };

        let Some(cert) = self.bundle.load_certificate().map_err(|e| {
            lic_error::Error::wrap(lic_error::ErrorKind::Persistence, "loading bundle certificate", e)
        })?
        else {
            return self.transition_to(EnforcerState::Unactivated, ValidationReason::NotActivated).await;
        };

        let Some(public_key_pem) = self.bundle.load_public_key_pem().map_err(|e| {
            lic_error::Error::wrap(lic_error::ErrorKind::Persistence, "loading bundle public key", e)
        })?
        else {
            return self.transition_to(EnforcerState::Unactivated, ValidationReason::NotActivated).await;
        };
        let public_key = lic_crypto::keypair::public_key_from_pem(&public_key_pem)?;

        let result = local_check(
            &cert,
            &public_key,
            &fingerprint,
            self.config.required_service.as_deref(),
            None,
            Utc::now(),
        );
        let reason = result.reason.clone();
        let state = next_state(&result);

        if state.serves_protected_traffic() {
            self.bring_services_up(&fingerprint).await?;
        }
        self.transition_to(state, reason).await
    }

    /// Send a heartbeat and fold its verdict into the current state
    /// (spec.md §4.6: best-effort, never itself an error).
    pub async fn heartbeat_once(&self) -> EnforcerState {
        let fingerprint = match self.inner.lock().await.fingerprint.clone() {
            Some(f) => f,
            None => return self.inner.lock().await.state,
        };
        let outcome = self
            .client
            .heartbeat(&HeartbeatRequest {
                machine_fingerprint: fingerprint,
                service_name: self.config.required_service.clone(),
            })
            .await;
        let response = outcome.or_skipped();

        let mut guard = self.inner.lock().await;
        let new_state = next_state_after_heartbeat(guard.state, &response);
        if new_state == EnforcerState::Invalid && guard.state != EnforcerState::Invalid {
            guard.state = EnforcerState::Invalid;
            guard.last_reason = ValidationReason::Revoked;
            let state = guard.state;
            drop(guard);
            let _ = self.supervisor.down();
            return state;
        }
        guard.state
    }

    /// Start the background revalidation and heartbeat loop on this
    /// agent's scheduler. Dropping every clone of the returned
    /// [`Scheduler`] handle (by dropping this `Agent`) cancels it.
    pub fn start_background_loop(self: &Arc<Self>) {
        let revalidation_interval = self.config.revalidation_interval;
        let agent = Arc::clone(self);
        self.scheduler.register_task(
            TaskType::Revalidation,
            Box::new(move || {
                let agent = Arc::clone(&agent);
                let interval = revalidation_interval;
                Box::pin(async move {
                    let _ = agent.revalidate_once().await;
                    Some(interval)
                })
            }),
            false,
            Some(Instant::now() + revalidation_interval),
        );

        let heartbeat_interval = self.config.heartbeat_interval;
        let agent = Arc::clone(self);
        self.scheduler.register_task(
            TaskType::Heartbeat,
            Box::new(move || {
                let agent = Arc::clone(&agent);
                let interval = heartbeat_interval;
                Box::pin(async move {
                    let _ = agent.heartbeat_once().await;
                    Some(interval)
                })
            }),
            false,
            Some(Instant::now() + heartbeat_interval),
        );
    }

    async fn bring_services_up(&self, fingerprint: &str) -> lic_error::Result<()> {
        if let Some(creds) = self.bundle.decrypt_docker_credentials(fingerprint).map_err(|e| {
            lic_error::Error::wrap(lic_error::ErrorKind::Crypto, "decrypting docker credentials", e)
        })? {
            self.supervisor.login(&creds.registry, &creds.username)?;
        }
        if let Some(compose) = self.bundle.load_compose().map_err(|e| {
            lic_error::Error::wrap(lic_error::ErrorKind::Persistence, "loading compose file", e)
        })? {
            self.supervisor.up(&compose)?;
        }
        Ok(())
    }

    async fn transition_to(&self, state: EnforcerState, reason: ValidationReason) -> lic_error::Result<EnforcerState> {
        let mut guard = self.inner.lock().await;
        let was_terminal = guard.state == EnforcerState::Invalid || guard.state == EnforcerState::Terminated;
        guard.state = state;
        guard.last_reason = reason;
        let became_invalid = state == EnforcerState::Invalid && !was_terminal;
        drop(guard);

        if became_invalid {
            self.supervisor.down()?;
            let mut guard = self.inner.lock().await;
            guard.state = EnforcerState::Terminated;
        }
        Ok(self.inner.lock().await.state)
    }

    async fn transition_to_invalid(&self, reason: ValidationReason) -> lic_error::Result<EnforcerState> {
        self.transition_to(EnforcerState::Invalid, reason).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::supervisor::LoggingSupervisor;

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
    async fn startup_with_no_bundle_is_unactivated() {
        let dir = tempfile::TempDir::new().unwrap();
        let agent = Agent::new(test_config(dir.path()), LoggingSupervisor).unwrap();
        let state = agent.startup_check().await.unwrap();
        assert_eq!(state, EnforcerState::Unactivated);
    }

    #[tokio::test]
    async fn startup_twice_reuses_the_same_pinned_fingerprint() {
        let dir = tempfile::TempDir::new().unwrap();
        let agent = Agent::new(test_config(dir.path()), LoggingSupervisor).unwrap();
        agent.startup_check().await.unwrap();
        let fp1 = agent.inner.lock().await.fingerprint.clone();
        agent.startup_check().await.unwrap();
        let fp2 = agent.inner.lock().await.fingerprint.clone();
        assert_eq!(fp1, fp2);
    }
}
