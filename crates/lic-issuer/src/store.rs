//! The domain-typed store the engine runs on, built atop
//! [`lic_persist::StateMgr`] the way a higher-level `arti` manager builds
//! typed state on top of `tor-persist::StateMgr` rather than reaching into
//! the filesystem itself.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use lic_cert::{Fingerprint, ProductKey};
use lic_persist::StateMgr;

use crate::types::{Customer, Machine};

/// A store of customer and machine rows.
///
/// Implementations need not provide cross-process transactional isolation
/// beyond what the underlying [`StateMgr`] gives; [`crate::Issuer`] adds the
/// logical per-customer critical section on top (spec.md §5's "serialize
/// concurrent calls touching the same customer").
pub trait Store: Send + Sync {
    /// Insert or overwrite a customer row, updating the customer index.
    fn save_customer(&self, customer: &Customer) -> lic_error::Result<()>;
    /// Look up a customer by id.
    fn get_customer(&self, id: &str) -> lic_error::Result<Option<Customer>>;
    /// Look up a customer by its product key.
    fn get_customer_by_product_key(&self, key: &ProductKey) -> lic_error::Result<Option<Customer>>;
    /// List every customer, in no particular order.
    fn list_customers(&self) -> lic_error::Result<Vec<Customer>>;

    /// Insert or overwrite a machine row, updating the customer's machine
    /// index and the global fingerprint index.
    fn save_machine(&self, machine: &Machine) -> lic_error::Result<()>;
    /// Look up a machine by id.
    fn get_machine(&self, id: &str) -> lic_error::Result<Option<Machine>>;
    /// Look up a machine by its fingerprint, across all customers.
    fn get_machine_by_fingerprint(&self, fingerprint: &Fingerprint) -> lic_error::Result<Option<Machine>>;
    /// List every machine belonging to `customer_id`.
    fn list_machines_for_customer(&self, customer_id: &str) -> lic_error::Result<Vec<Machine>>;
}

/// A `TOML` document can only hold a table at its root (see `lic-persist`'s
/// `FsStateMgr` Limitations note), so a bare `Vec<String>` or `String` index
/// value is wrapped in one of these small carrier structs before storage.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct IdList {
    ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct IdPointer {
    id: String,
}

fn customer_key(id: &str) -> String {
    format!("customer-{id}")
}

fn machine_key(id: &str) -> String {
    format!("machine-{id}")
}

fn product_key_index_key(key: &ProductKey) -> String {
    format!("idx-pkey-{}", key.as_str())
}

fn fingerprint_index_key(fp: &Fingerprint) -> String {
    format!("idx-fp-{}", fp.as_str())
}

fn customer_machines_index_key(customer_id: &str) -> String {
    format!("idx-machines-{customer_id}")
}

const CUSTOMER_INDEX_KEY: &str = "idx-customers";

/// A [`Store`] backed by a [`lic_persist::StateMgr`], storing each
/// customer/machine as its own document plus a handful of lookup indices.
///
/// This is the reference implementation used by the `licentia-issuer`
/// binary and by this crate's own test suite; a deployment that needs a
/// real relational store is expected to provide its own [`Store`] impl
/// (spec.md §1's Non-goals name an RDBMS as an external collaborator).
pub struct StateMgrStore<M> {
    mgr: Arc<M>,
}

impl<M: StateMgr> StateMgrStore<M> {
    /// Wrap an already-locked [`StateMgr`] for use by the engine.
    pub fn new(mgr: Arc<M>) -> Self {
        StateMgrStore { mgr }
    }

    fn load_id_list(&self, key: &str) -> lic_error::Result<IdList> {
        Ok(self.mgr.load::<IdList>(key)?.unwrap_or_default())
    }

    fn append_id(&self, key: &str, id: &str) -> lic_error::Result<()> {
        let mut list = self.load_id_list(key)?;
        if !list.ids.iter().any(|existing| existing == id) {
            list.ids.push(id.to_string());
            self.mgr.store(key, &list)?;
        }
        Ok(())
    }
}

impl<M: StateMgr + Send + Sync> Store for StateMgrStore<M> {
    fn save_customer(&self, customer: &Customer) -> lic_error::Result<()> {
        self.mgr.store(&customer_key(&customer.id), customer)?;
        self.mgr.store(
            &product_key_index_key(&customer.product_key),
            &IdPointer { id: customer.id.clone() },
        )?;
        self.append_id(CUSTOMER_INDEX_KEY, &customer.id)?;
        Ok(())
    }

    fn get_customer(&self, id: &str) -> lic_error::Result<Option<Customer>> {
        Ok(self.mgr.load(&customer_key(id))?)
    }

    fn get_customer_by_product_key(&self, key: &ProductKey) -> lic_error::Result<Option<Customer>> {
        let Some(pointer) = self.mgr.load::<IdPointer>(&product_key_index_key(key))? else {
            return Ok(None);
        };
        self.get_customer(&pointer.id)
    }

    fn list_customers(&self) -> lic_error::Result<Vec<Customer>> {
        let index = self.load_id_list(CUSTOMER_INDEX_KEY)?;
        let mut out = Vec::with_capacity(index.ids.len());
        for id in &index.ids {
            if let Some(c) = self.get_customer(id)? {
                out.push(c);
            }
        }
        Ok(out)
    }

    fn save_machine(&self, machine: &Machine) -> lic_error::Result<()> {
        self.mgr.store(&machine_key(&machine.id), machine)?;
        self.mgr.store(
            &fingerprint_index_key(&machine.fingerprint),
            &IdPointer { id: machine.id.clone() },
        )?;
        self.append_id(&customer_machines_index_key(&machine.customer_id), &machine.id)?;
        Ok(())
    }

    fn get_machine(&self, id: &str) -> lic_error::Result<Option<Machine>> {
        Ok(self.mgr.load(&machine_key(id))?)
    }

    fn get_machine_by_fingerprint(&self, fingerprint: &Fingerprint) -> lic_error::Result<Option<Machine>> {
        let Some(pointer) = self.mgr.load::<IdPointer>(&fingerprint_index_key(fingerprint))? else {
            return Ok(None);
        };
        self.get_machine(&pointer.id)
    }

    fn list_machines_for_customer(&self, customer_id: &str) -> lic_error::Result<Vec<Machine>> {
        let index = self.load_id_list(&customer_machines_index_key(customer_id))?;
        let mut out = Vec::with_capacity(index.ids.len());
        for id in &index.ids {
            if let Some(m) = self.get_machine(id)? {
                out.push(m);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use lic_cert::Tier;
    use lic_persist::FsStateMgr;

    fn store() -> StateMgrStore<FsStateMgr> {
        let dir = tempfile::TempDir::new().unwrap();
        let mgr = FsStateMgr::from_path(dir.path()).unwrap();
        assert!(mgr.try_lock().unwrap());
        std::mem::forget(dir); // keep the tempdir alive for the test's duration
        StateMgrStore::new(Arc::new(mgr))
    }

    fn sample_customer(id: &str, key: &str) -> Customer {
        Customer {
            id: id.to_string(),
            display_name: "Acme".to_string(),
            product_key: ProductKey::new(key),
            tier: Tier::Pro,
            max_machines: 10,
            concurrent_sessions: Some(20),
            api_rate_limit: Some(5000),
            services: vec!["frontend".to_string()],
            revoked: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn round_trips_customer_by_id_and_product_key() {
        let s = store();
        let customer = sample_customer("cust-1", "ACME-2026-ABCDEFGH-XYZ");
        s.save_customer(&customer).unwrap();

        let by_id = s.get_customer("cust-1").unwrap().unwrap();
        assert_eq!(by_id.display_name, "Acme");

        let by_key = s
            .get_customer_by_product_key(&ProductKey::new("ACME-2026-ABCDEFGH-XYZ"))
            .unwrap()
            .unwrap();
        assert_eq!(by_key.id, "cust-1");
    }

    #[test]
    fn list_customers_reflects_every_saved_row() {
        let s = store();
        s.save_customer(&sample_customer("cust-1", "A-2026-11111111-AAA")).unwrap();
        s.save_customer(&sample_customer("cust-2", "B-2026-22222222-BBB")).unwrap();
        let all = s.list_customers().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn unknown_product_key_returns_none() {
        let s = store();
        assert!(s
            .get_customer_by_product_key(&ProductKey::new("NOPE-0000-00000000-000"))
            .unwrap()
            .is_none());
    }
}
