//! The Issuer engine: the six wire operations (spec.md §4.4) plus the
//! read-only admin accessors, all serialized per-customer (spec.md §5).

use base64ct::Encoding;
use chrono::{Datelike, Duration, Utc};
use rand_core::{OsRng, RngCore};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

use lic_cert::{mint, tier, types as keygen, verify, Certificate, Fingerprint, MintParams, ProductKey, Tier};
use lic_wire::{ActivationReason, Bundle, DockerCredentials, DockerCredentialsEnvelope, HeartbeatReason, ValidationReason};

use crate::compose::render_compose;
use crate::store::Store;
use crate::types::{Customer, Machine};

/// The outcome of [`Issuer::activate`].
#[derive(Debug)]
pub enum ActivateOutcome {
    /// Activation succeeded (freshly, or idempotently for an
    /// already-activated machine).
    Activated {
        /// The bundle to hand back to the Enforcer.
        bundle: Bundle,
        /// The certificate's tier, as a wire string.
        tier: String,
        /// The owning customer's display name.
        customer_name: String,
        /// The certificate's enabled application services.
        services_enabled: Vec<String>,
    },
    /// Activation was refused for a business reason (never an
    /// infrastructure [`lic_error::Error`]).
    Rejected {
        /// The machine-readable reason.
        reason: ActivationReason,
        /// Present on `machine_limit_exceeded`.
        current: Option<u32>,
        /// Present on `machine_limit_exceeded`.
        max: Option<u32>,
    },
}

/// The outcome of [`Issuer::validate`].
#[derive(Debug)]
pub struct ValidateOutcome {
    /// Whether the certificate currently grants access.
    pub valid: bool,
    /// The machine-readable reason.
    pub reason: ValidationReason,
    /// Present when `valid`.
    pub tier: Option<String>,
    /// Present when `valid`: RFC 3339 `valid_until`.
    pub expires_at: Option<String>,
    /// Present when `valid`.
    pub services_enabled: Option<Vec<String>>,
}

/// The outcome of [`Issuer::heartbeat`].
#[derive(Debug)]
pub struct HeartbeatOutcome {
    /// Whether the machine and its customer remain in good standing.
    pub valid: bool,
    /// The machine-readable reason.
    pub reason: HeartbeatReason,
    /// Present when `valid`.
    pub customer_name: Option<String>,
    /// Present when `valid`.
    pub tier: Option<String>,
}

/// Business-level rejections from [`Issuer::upgrade`].
///
/// spec.md §7 enumerates closed reason codes for activate/validate/
/// heartbeat but not for upgrade; this type is engine-internal rather than
/// a [`caret::caret_enum!`] because no wire contract promises its set is
/// stable across versions.
#[derive(Clone, Debug, thiserror::Error)]
pub enum UpgradeError {
    /// No machine matches the given fingerprint.
    #[error("no machine with this fingerprint")]
    MachineNotFound,
    /// The machine or its owning customer has been revoked.
    #[error("machine or customer revoked")]
    Revoked,
}

/// The result of a successful [`Issuer::upgrade`].
#[derive(Debug)]
pub struct UpgradeResult {
    /// The tier the machine was on before this call.
    pub old_tier: String,
    /// The tier the machine is on after this call.
    pub new_tier: String,
    /// The refreshed bundle.
    pub bundle: Bundle,
}

/// The requested options for an upgrade call (spec.md §4.4 `upgrade`).
#[derive(Clone, Debug, Default)]
pub struct UpgradeOptions {
    /// A new tier to move the machine's customer to.
    pub new_tier: Option<Tier>,
    /// Days to add to the certificate's *previous* `valid_until`.
    pub additional_days: Option<u32>,
    /// A new machine quota for the owning customer.
    pub new_machine_limit: Option<u32>,
    /// Service names to add to the certificate's existing enabled set.
    pub additional_services: Option<Vec<String>>,
    /// New image tags, keyed by service name.
    pub new_image_tags: Option<BTreeMap<String, String>>,
}

/// What to revoke (spec.md §4.4 `revoke`).
pub enum RevokeTarget<'a> {
    /// Revoke a single machine by id.
    Machine(&'a str),
    /// Revoke a customer (and, transitively, every one of its machines).
    Customer(&'a str),
}

/// The options accepted by [`Issuer::create_customer`], beyond the tier's
/// own defaults.
#[derive(Clone, Debug, Default)]
pub struct CreateCustomerOptions {
    /// Override the tier's default machine quota.
    pub max_machines: Option<u32>,
    /// Override the tier's default concurrent-session cap.
    pub concurrent_sessions: Option<Option<u32>>,
    /// Override the tier's default API rate limit.
    pub api_rate_limit: Option<Option<u32>>,
    /// Override the tier's default enabled-service set.
    pub services: Option<Vec<String>>,
}

/// The licensing authority: customers, machines, and the operations that
/// mutate them.
///
/// Per-customer mutations are serialized through a sharded map of locks
/// (spec.md §5: "operations touching the same customer never interleave";
/// operations on *different* customers run fully concurrently), the same
/// shape `tor-circmgr` uses to avoid a single global mutex across
/// independent circuit-build requests.
pub struct Issuer<S> {
    store: Arc<S>,
    keypair: Arc<lic_crypto::KeyPair>,
    docker_registry_url: String,
    customer_locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: Store> Issuer<S> {
    /// Construct an engine over `store`, signing certificates with
    /// `keypair` and stamping `docker_registry_url` into every minted
    /// certificate's Docker block.
    pub fn new(store: Arc<S>, keypair: Arc<lic_crypto::KeyPair>, docker_registry_url: impl Into<String>) -> Self {
        Issuer {
            store,
            keypair,
            docker_registry_url: docker_registry_url.into(),
            customer_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// The Issuer's public key, for distribution to Enforcers.
    pub fn public_key(&self) -> &rsa::RsaPublicKey {
        self.keypair.public_key()
    }

    /// The Issuer's public key, PEM-encoded (spec.md §6's `GET
    /// /api/v1/public-key`).
    pub fn public_key_pem(&self) -> lic_error::Result<String> {
        self.keypair.public_key_pem()
    }

    fn lock_for(&self, customer_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.customer_locks.lock().expect("customer lock map poisoned");
        locks
            .entry(customer_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a new customer account, generating its product key.
    pub async fn create_customer(
        &self,
        display_name: &str,
        tier: Tier,
        options: CreateCustomerOptions,
    ) -> lic_error::Result<Customer> {
        let defaults = tier::defaults(&tier);
        let product_key = keygen::generate_product_key(display_name, Utc::now().year() as u32, |buf| OsRng.fill_bytes(buf));

        let customer = Customer {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: display_name.to_string(),
            product_key,
            tier,
            max_machines: options.max_machines.unwrap_or(defaults.max_machines),
            concurrent_sessions: options.concurrent_sessions.unwrap_or(defaults.concurrent_sessions),
            api_rate_limit: options.api_rate_limit.unwrap_or(defaults.api_rate_limit),
            services: options
                .services
                .unwrap_or_else(|| defaults.services.iter().map(|s| s.to_string()).collect()),
            revoked: false,
            created_at: Utc::now(),
        };
        self.store.save_customer(&customer)?;
        Ok(customer)
    }

    fn seal_docker_credentials(&self, fingerprint: &Fingerprint, username: &str, token: &str) -> lic_error::Result<DockerCredentialsEnvelope> {
        let plaintext = DockerCredentials {
            registry: self.docker_registry_url.clone(),
            username: username.to_string(),
            token: token.to_string(),
        };
        let plaintext_json = serde_json::to_vec(&plaintext).map_err(|e| lic_error::internal!("encoding docker credentials: {e}"))?;
        let sealed = lic_crypto::aead::seal(fingerprint.as_str().as_bytes(), &plaintext_json)?;
        Ok(DockerCredentialsEnvelope {
            encrypted_credentials: base64ct::Base64::encode_string(&sealed),
            encryption_method: "AES-256-GCM".to_string(),
            key_derivation: "SHA-256(fingerprint)".to_string(),
        })
    }

    fn build_bundle(&self, machine: &Machine) -> lic_error::Result<Bundle> {
        let docker_credentials = self.seal_docker_credentials(&machine.fingerprint, &docker_username(&machine.customer_id), &machine.docker_token)?;
        Ok(Bundle {
            certificate: machine.certificate.clone(),
            docker_credentials,
            compose_file: render_compose(&machine.certificate),
            public_key: self.keypair.public_key_pem()?,
        })
    }

    /// `POST /api/v1/activate` (spec.md §4.4, §6).
    pub async fn activate(
        &self,
        product_key: &str,
        fingerprint: &str,
        hostname: &str,
        _os_info: &str,
        _app_version: &str,
    ) -> lic_error::Result<ActivateOutcome> {
        let product_key = ProductKey::new(product_key);
        let fingerprint = Fingerprint::new(fingerprint);

        let Some(customer) = self.store.get_customer_by_product_key(&product_key)? else {
            return Ok(ActivateOutcome::Rejected {
                reason: ActivationReason::ProductKeyNotFound,
                current: None,
                max: None,
            });
        };

        if customer.revoked {
            return Ok(ActivateOutcome::Rejected {
                reason: ActivationReason::CustomerRevoked,
                current: None,
                max: None,
            });
        }

        let lock = self.lock_for(&customer.id);
        let _guard = lock.lock().await;

        // Re-read inside the critical section: another activation for this
        // customer may have landed between the checks above and now.
        let customer = self
            .store
            .get_customer(&customer.id)?
            .ok_or_else(|| lic_error::internal!("customer {} vanished mid-activation", customer.id))?;

        if let Some(existing) = self.store.get_machine_by_fingerprint(&fingerprint)? {
            if existing.customer_id != customer.id {
                return Ok(ActivateOutcome::Rejected {
                    reason: ActivationReason::DifferentProductKey,
                    current: None,
                    max: None,
                });
            }
            // Idempotent reactivation: same machine, same product key.
            // Re-return the existing certificate unchanged (spec.md §4.4
            // step 2: "re-return the existing bundle, idempotently") --
            // minting a fresh one here would both break "same
            // certificate_id" (spec.md §8) and silently extend
            // valid_until on every reactivation.
            let machine = Machine {
                hostname: hostname.to_string(),
                last_seen: Utc::now(),
                ..existing
            };
            self.store.save_machine(&machine)?;
            let bundle = self.build_bundle(&machine)?;
            return Ok(ActivateOutcome::Activated {
                tier: machine.certificate.tier.as_str().to_string(),
                services_enabled: enabled_service_names(&machine.certificate),
                customer_name: customer.display_name.clone(),
                bundle,
            });
        }

        let active_count = self
            .store
            .list_machines_for_customer(&customer.id)?
            .iter()
            .filter(|m| !m.revoked)
            .count() as u32;
        if active_count >= customer.max_machines {
            return Ok(ActivateOutcome::Rejected {
                reason: ActivationReason::MachineLimitExceeded,
                current: Some(active_count),
                max: Some(customer.max_machines),
            });
        }

        let cert = mint_certificate(
            &self.keypair,
            &customer,
            None,
            None,
            0,
            active_count + 1,
            fingerprint.clone(),
            hostname.to_string(),
            &customer.services,
            &self.docker_registry_url,
            &docker_username(&customer.id),
            &BTreeMap::new(),
        )?;

        let mut token_bytes = [0u8; 24];
        OsRng.fill_bytes(&mut token_bytes);
        let now = Utc::now();
        let machine = Machine {
            id: cert.machine.machine_id.clone(),
            customer_id: customer.id.clone(),
            fingerprint,
            hostname: hostname.to_string(),
            machine_index: active_count + 1,
            certificate: cert,
            docker_token: hex_encode(&token_bytes),
            revoked: false,
            created_at: now,
            last_seen: now,
        };
        self.store.save_machine(&machine)?;
        let bundle = self.build_bundle(&machine)?;
        Ok(ActivateOutcome::Activated {
            tier: machine.certificate.tier.as_str().to_string(),
            services_enabled: enabled_service_names(&machine.certificate),
            customer_name: customer.display_name,
            bundle,
        })
    }

    /// `POST /api/v1/validate` (spec.md §4.4, §6).
    pub async fn validate(
        &self,
        certificate: &Certificate,
        fingerprint: &str,
        service: Option<&str>,
        docker_image: Option<&str>,
    ) -> lic_error::Result<ValidateOutcome> {
        fn rejected(reason: ValidationReason) -> ValidateOutcome {
            ValidateOutcome {
                valid: false,
                reason,
                tier: None,
                expires_at: None,
                services_enabled: None,
            }
        }

        if let Err(e) = verify::verify(certificate, self.keypair.public_key()) {
            let reason = match e {
                verify::VerifyError::MissingSignature | verify::VerifyError::MalformedBase64(_) => {
                    ValidationReason::CertificateCorrupt
                }
                verify::VerifyError::InvalidSignature => ValidationReason::InvalidSignature,
                verify::VerifyError::HmacMismatch => ValidationReason::HmacMismatch,
            };
            return Ok(rejected(reason));
        }

        if certificate.machine.machine_fingerprint.is_empty() {
            return Ok(rejected(ValidationReason::CertFingerprintMissing));
        }

        let Some(mut machine) = self.store.get_machine(&certificate.machine.machine_id)? else {
            return Ok(rejected(ValidationReason::MachineIdMissing));
        };

        if machine.fingerprint.as_str() != fingerprint || machine.fingerprint.as_str() != certificate.machine.machine_fingerprint {
            return Ok(rejected(ValidationReason::FingerprintMismatch));
        }

        if machine.revoked {
            return Ok(rejected(ValidationReason::Revoked));
        }
        let Some(customer) = self.store.get_customer(&machine.customer_id)? else {
            return Ok(rejected(ValidationReason::MachineIdMissing));
        };
        if customer.revoked {
            return Ok(rejected(ValidationReason::Revoked));
        }

        let Ok(time_status) = certificate.time_status(Utc::now()) else {
            return Ok(rejected(ValidationReason::NoExpiryDate));
        };
        if time_status == verify::TimeStatus::Expired {
            return Ok(rejected(ValidationReason::Expired));
        }

        if let Some(service) = service {
            if !certificate.allows_service(service) {
                return Ok(rejected(ValidationReason::ServiceNotAllowed));
            }
        }
        if let Some(image) = docker_image {
            if !certificate.allows_docker_image(image) {
                return Ok(rejected(ValidationReason::DockerImageNotAllowed));
            }
        }

        let reason = if time_status == verify::TimeStatus::Grace {
            ValidationReason::GracePeriod
        } else {
            ValidationReason::Ok
        };

        machine.last_seen = Utc::now();
        self.store.save_machine(&machine)?;

        Ok(ValidateOutcome {
            valid: true,
            reason,
            tier: Some(certificate.tier.as_str().to_string()),
            expires_at: Some(certificate.validity.valid_until.clone()),
            services_enabled: Some(enabled_service_names(certificate)),
        })
    }

    /// `POST /api/v1/heartbeat` (spec.md §4.4, §6).
    pub async fn heartbeat(&self, fingerprint: &str) -> lic_error::Result<HeartbeatOutcome> {
        let Some(mut machine) = self.store.get_machine_by_fingerprint(&Fingerprint::new(fingerprint))? else {
            return Ok(HeartbeatOutcome {
                valid: false,
                reason: HeartbeatReason::MachineNotFound,
                customer_name: None,
                tier: None,
            });
        };
        if machine.revoked {
            return Ok(HeartbeatOutcome {
                valid: false,
                reason: HeartbeatReason::MachineRevoked,
                customer_name: None,
                tier: None,
            });
        }
        let Some(customer) = self.store.get_customer(&machine.customer_id)? else {
            return Ok(HeartbeatOutcome {
                valid: false,
                reason: HeartbeatReason::MachineNotFound,
                customer_name: None,
                tier: None,
            });
        };
        if customer.revoked {
            return Ok(HeartbeatOutcome {
                valid: false,
                reason: HeartbeatReason::CustomerRevoked,
                customer_name: None,
                tier: None,
            });
        }

        machine.last_seen = Utc::now();
        self.store.save_machine(&machine)?;

        Ok(HeartbeatOutcome {
            valid: true,
            reason: HeartbeatReason::Ok,
            customer_name: Some(customer.display_name),
            tier: Some(machine.certificate.tier.as_str().to_string()),
        })
    }

    /// `POST /api/v1/upgrade` (spec.md §4.4, §6).
    pub async fn upgrade(&self, machine_fingerprint: &str, options: UpgradeOptions) -> lic_error::Result<Result<UpgradeResult, UpgradeError>> {
        let Some(machine) = self.store.get_machine_by_fingerprint(&Fingerprint::new(machine_fingerprint))? else {
            return Ok(Err(UpgradeError::MachineNotFound));
        };
        let Some(customer) = self.store.get_customer(&machine.customer_id)? else {
            return Ok(Err(UpgradeError::MachineNotFound));
        };

        let lock = self.lock_for(&customer.id);
        let _guard = lock.lock().await;

        let mut customer = self
            .store
            .get_customer(&customer.id)?
            .ok_or_else(|| lic_error::internal!("customer {} vanished mid-upgrade", customer.id))?;
        let mut machine = self
            .store
            .get_machine(&machine.id)?
            .ok_or_else(|| lic_error::internal!("machine {} vanished mid-upgrade", machine.id))?;

        if customer.revoked || machine.revoked {
            return Ok(Err(UpgradeError::Revoked));
        }

        let old_tier = machine.certificate.tier.clone();

        if let Some(new_tier) = options.new_tier.clone() {
            customer.tier = new_tier;
        }
        if let Some(limit) = options.new_machine_limit {
            customer.max_machines = limit;
        }
        // Services become a union, per spec.md §4.4: never dropped, only added.
        let mut services = customer.services.clone();
        if let Some(additional) = &options.additional_services {
            for s in additional {
                if !services.contains(s) {
                    services.push(s.clone());
                }
            }
        }
        customer.services = services.clone();
        self.store.save_customer(&customer)?;

        // Days add to the *previous* valid-until, not the current wall
        // clock (spec.md §4.4); omitting `additional_days` keeps the
        // existing window and only applies the tier/quota/service changes.
        let previous_valid_until = machine.certificate.valid_until().unwrap_or_else(|_| Utc::now());
        let valid_until = match options.additional_days {
            Some(days) => previous_valid_until + Duration::days(days as i64),
            None => previous_valid_until,
        };

        let cert = mint_certificate_with_validity(
            &self.keypair,
            &customer,
            Some(machine.certificate.clone()),
            Some(machine.id.clone()),
            machine.certificate.upgrade_count + 1,
            machine.machine_index,
            machine.fingerprint.clone(),
            machine.hostname.clone(),
            &services,
            &self.docker_registry_url,
            &docker_username(&customer.id),
            options.new_image_tags.clone().unwrap_or_default(),
            valid_until,
        )?;
        machine.certificate = cert;
        self.store.save_machine(&machine)?;

        let bundle = self.build_bundle(&machine)?;
        Ok(Ok(UpgradeResult {
            old_tier: old_tier.as_str().to_string(),
            new_tier: machine.certificate.tier.as_str().to_string(),
            bundle,
        }))
    }

    /// `POST /api/v1/revoke` (spec.md §4.4): revoke a single machine, or a
    /// whole customer and every machine it owns. Returns `false` if the
    /// target does not exist.
    pub async fn revoke(&self, target: RevokeTarget<'_>) -> lic_error::Result<bool> {
        match target {
            RevokeTarget::Machine(id) => {
                let Some(mut machine) = self.store.get_machine(id)? else {
                    return Ok(false);
                };
                machine.revoked = true;
                self.store.save_machine(&machine)?;
                Ok(true)
            }
            RevokeTarget::Customer(id) => {
                let Some(mut customer) = self.store.get_customer(id)? else {
                    return Ok(false);
                };
                let lock = self.lock_for(id);
                let _guard = lock.lock().await;
                customer.revoked = true;
                self.store.save_customer(&customer)?;
                for mut machine in self.store.list_machines_for_customer(id)? {
                    machine.revoked = true;
                    self.store.save_machine(&machine)?;
                }
                Ok(true)
            }
        }
    }

    /// Read-only accessor: list every customer (SPEC_FULL's admin surface).
    pub async fn list_customers(&self) -> lic_error::Result<Vec<Customer>> {
        self.store.list_customers()
    }

    /// Read-only accessor: fetch a single customer by id.
    pub async fn get_customer(&self, id: &str) -> lic_error::Result<Option<Customer>> {
        self.store.get_customer(id)
    }

    /// Read-only accessor: list every machine belonging to `customer_id`.
    pub async fn list_machines(&self, customer_id: &str) -> lic_error::Result<Vec<Machine>> {
        self.store.list_machines_for_customer(customer_id)
    }

    /// `GET /api/v1/compose/{fingerprint}` (spec.md §6): re-render a
    /// machine's Compose descriptor from its current certificate, without
    /// going through a fresh activation or upgrade.
    pub async fn compose_for_fingerprint(&self, fingerprint: &str) -> lic_error::Result<Option<String>> {
        let Some(machine) = self.store.get_machine_by_fingerprint(&Fingerprint::new(fingerprint))? else {
            return Ok(None);
        };
        Ok(Some(render_compose(&machine.certificate)))
    }
}

fn docker_username(customer_id: &str) -> String {
    format!("cust-{}", &customer_id[..customer_id.len().min(8)])
}

fn enabled_service_names(cert: &Certificate) -> Vec<String> {
    cert.services
        .iter()
        .filter(|(_, entry)| entry.enabled)
        .map(|(name, _)| name.clone())
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn mint_certificate(
    keypair: &lic_crypto::KeyPair,
    customer: &Customer,
    parent: Option<Certificate>,
    machine_id: Option<String>,
    upgrade_count: u32,
    machine_index: u32,
    fingerprint: Fingerprint,
    hostname: String,
    services: &[String],
    registry_url: &str,
    username: &str,
    image_tag_overrides: &BTreeMap<String, String>,
) -> lic_error::Result<Certificate> {
    let defaults = tier::defaults(&customer.tier);
    let now = Utc::now();
    let valid_until = now + Duration::days(defaults.valid_days as i64);
    mint_certificate_with_validity(
        keypair,
        customer,
        parent,
        machine_id,
        upgrade_count,
        machine_index,
        fingerprint,
        hostname,
        services,
        registry_url,
        username,
        image_tag_overrides.clone(),
        valid_until,
    )
}

#[allow(clippy::too_many_arguments)]
fn mint_certificate_with_validity(
    keypair: &lic_crypto::KeyPair,
    customer: &Customer,
    parent: Option<Certificate>,
    machine_id: Option<String>,
    upgrade_count: u32,
    machine_index: u32,
    fingerprint: Fingerprint,
    hostname: String,
    services: &[String],
    registry_url: &str,
    username: &str,
    image_tag_overrides: BTreeMap<String, String>,
    valid_until: chrono::DateTime<Utc>,
) -> lic_error::Result<Certificate> {
    let params = MintParams {
        certificate_id: None,
        parent_certificate_id: parent.map(|p| p.certificate_id),
        upgrade_count,
        tier: customer.tier.clone(),
        customer_id: customer.id.clone(),
        customer_name: customer.display_name.clone(),
        product_key: customer.product_key.as_str().to_string(),
        machine_id,
        fingerprint,
        hostname,
        issued_at: Utc::now(),
        valid_until,
        grace_period_days: tier::DEFAULT_GRACE_DAYS,
        max_machines: customer.max_machines,
        machine_index,
        concurrent_sessions: customer.concurrent_sessions,
        api_rate_limit: customer.api_rate_limit,
        services: services.to_vec(),
        docker_registry_url: registry_url.to_string(),
        docker_username: username.to_string(),
        image_tag_overrides,
    };
    mint::mint(params, keypair)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn test_keypair() -> lic_crypto::KeyPair {
        lic_crypto::KeyPair::generate().expect("keypair")
    }

    pub fn mint_test_certificate(kp: &lic_crypto::KeyPair, services: &[String]) -> Certificate {
        let customer = Customer {
            id: "cust-1".to_string(),
            display_name: "Acme".to_string(),
            product_key: ProductKey::new("ACME-2026-ABCDEFGH-XYZ"),
            tier: Tier::Pro,
            max_machines: 10,
            concurrent_sessions: Some(20),
            api_rate_limit: Some(5000),
            services: services.to_vec(),
            revoked: false,
            created_at: Utc::now(),
        };
        mint_certificate(
            kp,
            &customer,
            None,
            None,
            0,
            1,
            Fingerprint::new("deadbeefcafef00d"),
            "acme-1".to_string(),
            services,
            "registry.licentia.example",
            "acme",
            &BTreeMap::new(),
        )
        .expect("mint test certificate")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::StateMgrStore;
    use lic_persist::FsStateMgr;

    fn engine() -> Issuer<StateMgrStore<FsStateMgr>> {
        let dir = tempfile::TempDir::new().unwrap();
        let mgr = FsStateMgr::from_path(dir.path()).unwrap();
        mgr.try_lock().unwrap();
        std::mem::forget(dir);
        let store = Arc::new(StateMgrStore::new(Arc::new(mgr)));
        let keypair = Arc::new(lic_crypto::KeyPair::generate().unwrap());
        Issuer::new(store, keypair, "registry.licentia.example")
    }

    #[tokio::test]
    async fn first_activation_succeeds_and_is_idempotent() {
        let issuer = engine();
        let customer = issuer
            .create_customer("Acme", Tier::Pro, CreateCustomerOptions::default())
            .await
            .unwrap();

        let ActivateOutcome::Activated { bundle: first_bundle, .. } = issuer
            .activate(customer.product_key.as_str(), "fp-1", "host-1", "linux", "1.0")
            .await
            .unwrap()
        else {
            panic!("expected first activation to succeed");
        };

        let ActivateOutcome::Activated { bundle: second_bundle, .. } = issuer
            .activate(customer.product_key.as_str(), "fp-1", "host-1", "linux", "1.0")
            .await
            .unwrap()
        else {
            panic!("expected second activation to succeed");
        };

        // spec.md §8: "Activate(K, F, H) followed by Activate(K, F, H)
        // returns the same certificate id and does not increase the
        // customer's active-machine count" -- a repeat activation must
        // re-return the existing certificate, not mint (and so renew) a
        // fresh one.
        assert_eq!(first_bundle.certificate.certificate_id, second_bundle.certificate.certificate_id);
        assert_eq!(first_bundle.certificate.validity.valid_until, second_bundle.certificate.validity.valid_until);
        assert_eq!(issuer.list_machines(&customer.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_product_key_is_rejected() {
        let issuer = engine();
        let result = issuer
            .activate("NOPE-0000-00000000-000", "fp-1", "host", "linux", "1.0")
            .await
            .unwrap();
        assert!(matches!(
            result,
            ActivateOutcome::Rejected {
                reason: ActivationReason::ProductKeyNotFound,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn machine_limit_is_enforced() {
        let issuer = engine();
        let customer = issuer
            .create_customer(
                "Acme",
                Tier::Trial,
                CreateCustomerOptions {
                    max_machines: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        issuer
            .activate(customer.product_key.as_str(), "fp-1", "host-1", "linux", "1.0")
            .await
            .unwrap();
        let second = issuer
            .activate(customer.product_key.as_str(), "fp-2", "host-2", "linux", "1.0")
            .await
            .unwrap();
        assert!(matches!(
            second,
            ActivateOutcome::Rejected {
                reason: ActivationReason::MachineLimitExceeded,
                current: Some(1),
                max: Some(1),
            }
        ));
    }

    #[tokio::test]
    async fn different_product_key_on_same_fingerprint_is_rejected() {
        let issuer = engine();
        let a = issuer.create_customer("A", Tier::Pro, CreateCustomerOptions::default()).await.unwrap();
        let b = issuer.create_customer("B", Tier::Pro, CreateCustomerOptions::default()).await.unwrap();
        issuer
            .activate(a.product_key.as_str(), "shared-fp", "host", "linux", "1.0")
            .await
            .unwrap();
        let result = issuer
            .activate(b.product_key.as_str(), "shared-fp", "host", "linux", "1.0")
            .await
            .unwrap();
        assert!(matches!(
            result,
            ActivateOutcome::Rejected {
                reason: ActivationReason::DifferentProductKey,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn validate_succeeds_on_a_freshly_activated_certificate() {
        let issuer = engine();
        let customer = issuer.create_customer("Acme", Tier::Pro, CreateCustomerOptions::default()).await.unwrap();
        let ActivateOutcome::Activated { bundle, .. } = issuer
            .activate(customer.product_key.as_str(), "fp-1", "host-1", "linux", "1.0")
            .await
            .unwrap()
        else {
            panic!("expected activation to succeed");
        };
        let result = issuer.validate(&bundle.certificate, "fp-1", None, None).await.unwrap();
        assert!(result.valid);
        assert_eq!(result.reason, ValidationReason::Ok);
    }

    #[tokio::test]
    async fn successful_validate_and_heartbeat_touch_last_seen() {
        let issuer = engine();
        let customer = issuer.create_customer("Acme", Tier::Pro, CreateCustomerOptions::default()).await.unwrap();
        let ActivateOutcome::Activated { bundle, .. } = issuer
            .activate(customer.product_key.as_str(), "fp-1", "host-1", "linux", "1.0")
            .await
            .unwrap()
        else {
            panic!("expected activation to succeed");
        };
        let after_activate = issuer.list_machines(&customer.id).await.unwrap()[0].last_seen;

        std::thread::sleep(std::time::Duration::from_millis(5));
        issuer.validate(&bundle.certificate, "fp-1", None, None).await.unwrap();
        let after_validate = issuer.list_machines(&customer.id).await.unwrap()[0].last_seen;
        assert!(after_validate > after_activate);

        std::thread::sleep(std::time::Duration::from_millis(5));
        issuer.heartbeat("fp-1").await.unwrap();
        let after_heartbeat = issuer.list_machines(&customer.id).await.unwrap()[0].last_seen;
        assert!(after_heartbeat > after_validate);
    }

    #[tokio::test]
    async fn validate_rejects_fingerprint_mismatch() {
        let issuer = engine();
        let customer = issuer.create_customer("Acme", Tier::Pro, CreateCustomerOptions::default()).await.unwrap();
        let ActivateOutcome::Activated { bundle, .. } = issuer
            .activate(customer.product_key.as_str(), "fp-1", "host-1", "linux", "1.0")
            .await
            .unwrap()
        else {
            panic!("expected activation to succeed");
        };
        let result = issuer.validate(&bundle.certificate, "some-other-fp", None, None).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.reason, ValidationReason::FingerprintMismatch);
    }

    #[tokio::test]
    async fn heartbeat_reports_customer_revocation() {
        let issuer = engine();
        let customer = issuer.create_customer("Acme", Tier::Pro, CreateCustomerOptions::default()).await.unwrap();
        issuer
            .activate(customer.product_key.as_str(), "fp-1", "host-1", "linux", "1.0")
            .await
            .unwrap();
        issuer.revoke(RevokeTarget::Customer(&customer.id)).await.unwrap();
        let result = issuer.heartbeat("fp-1").await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.reason, HeartbeatReason::CustomerRevoked);
    }

    #[tokio::test]
    async fn upgrade_changes_tier_and_unions_services() {
        let issuer = engine();
        let customer = issuer.create_customer("Acme", Tier::Trial, CreateCustomerOptions::default()).await.unwrap();
        issuer
            .activate(customer.product_key.as_str(), "fp-1", "host-1", "linux", "1.0")
            .await
            .unwrap();
        let result = issuer
            .upgrade(
                "fp-1",
                UpgradeOptions {
                    new_tier: Some(Tier::Pro),
                    additional_services: Some(vec!["analytics".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.old_tier, "trial");
        assert_eq!(result.new_tier, "pro");
        assert!(result.bundle.certificate.allows_service("analytics"));
        assert!(result.bundle.certificate.allows_service("frontend"));
    }
}
