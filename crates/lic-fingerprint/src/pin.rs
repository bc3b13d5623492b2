//! The on-disk fingerprint pin (spec.md §4.3, §3's `machine_id.json`):
//! written once at first activation, checked for byte-equality against a
//! freshly computed fingerprint on every subsequent start. A mismatch is
//! the hardware-substitution signal spec.md §8 scenario 5 walks through.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::derive::{derive_fingerprint, DeriveError};
use crate::probes::HardwareProbes;

/// The pinned-fingerprint record, written verbatim as `machine_id.json`
/// (spec.md §6's bundle layout).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinRecord {
    /// The fingerprint pinned at first activation.
    pub fingerprint: String,
    /// When the pin was written, RFC 3339 UTC.
    pub generated_at: String,
    /// The hostname observed when the pin was written.
    pub hostname: String,
}

/// An error produced while reading, deriving, or writing the pin.
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    /// Deriving a fresh fingerprint failed (see [`DeriveError`]).
    #[error(transparent)]
    Derive(#[from] DeriveError),
    /// The pin file could not be read or written.
    #[error("pin file I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The pin file's contents did not parse as [`PinRecord`] JSON.
    #[error("pin file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// The result of checking (and, on first run, creating) the fingerprint
/// pin against a freshly computed fingerprint.
#[derive(Clone, Debug, PartialEq)]
pub enum PinOutcome {
    /// No pin existed; `fingerprint` was computed fresh and has now been
    /// written as the new pin.
    FirstPin {
        /// The freshly computed and pinned fingerprint.
        fingerprint: String,
    },
    /// A pin existed and the freshly computed fingerprint matches it.
    Match {
        /// The matching fingerprint.
        fingerprint: String,
    },
    /// A pin existed, but the freshly computed fingerprint differs — the
    /// `fingerprint_mismatch` hard-violation condition.
    Mismatch {
        /// The fingerprint recorded in the pin file.
        pinned: String,
        /// The fingerprint just computed from current hardware.
        computed: String,
    },
}

/// Load a pin file, if one exists at `path`.
pub fn load_pin(path: &Path) -> Result<Option<PinRecord>, PinError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write `record` to `path` atomically (write-to-temp, then rename —
/// spec.md §5's "partial bundles must never be observable").
pub fn write_pin(path: &Path, record: &PinRecord) -> Result<(), PinError> {
    let body = serde_json::to_string_pretty(record)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Derive the current hardware fingerprint and reconcile it against the
/// pin file at `pin_path`, writing a fresh pin if (and only if) none
/// exists yet.
///
/// This is the single entry point `licentia-enforcer` calls on every
/// start and every periodic revalidation tick.
pub fn check_and_pin(
    probes: &dyn HardwareProbes,
    pin_path: &Path,
    hostname: &str,
    now_rfc3339: impl FnOnce() -> String,
) -> Result<PinOutcome, PinError> {
    let existing = load_pin(pin_path)?;
    let computed = derive_fingerprint(probes, existing.is_some())?;

    match existing {
        None => {
            let record = PinRecord {
                fingerprint: computed.clone(),
                generated_at: now_rfc3339(),
                hostname: hostname.to_string(),
            };
            write_pin(pin_path, &record)?;
            Ok(PinOutcome::FirstPin {
                fingerprint: computed,
            })
        }
        Some(record) if record.fingerprint == computed => Ok(PinOutcome::Match {
            fingerprint: computed,
        }),
        Some(record) => Ok(PinOutcome::Mismatch {
            pinned: record.fingerprint,
            computed,
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::probes::FixedProbes;

    fn probes() -> FixedProbes {
        FixedProbes {
            hostname: Some("box1".to_string()),
            system: Some("Linux".to_string()),
            machine_arch: Some("x86_64".to_string()),
            os_specific_tokens: vec!["machine_id:abc123".to_string()],
        }
    }

    #[test]
    fn first_run_creates_pin() {
        let dir = tempfile::TempDir::new().unwrap();
        let pin_path = dir.path().join("machine_id.json");
        let outcome = check_and_pin(&probes(), &pin_path, "box1", || "2026-01-01T00:00:00Z".to_string()).unwrap();
        match outcome {
            PinOutcome::FirstPin { fingerprint } => assert_eq!(fingerprint.len(), 128),
            other => panic!("expected FirstPin, got {other:?}"),
        }
        assert!(pin_path.exists());
    }

    #[test]
    fn second_run_matches_pin() {
        let dir = tempfile::TempDir::new().unwrap();
        let pin_path = dir.path().join("machine_id.json");
        check_and_pin(&probes(), &pin_path, "box1", || "2026-01-01T00:00:00Z".to_string()).unwrap();
        let outcome = check_and_pin(&probes(), &pin_path, "box1", || "2026-01-02T00:00:00Z".to_string()).unwrap();
        assert!(matches!(outcome, PinOutcome::Match { .. }));
    }

    #[test]
    fn hardware_swap_is_detected_as_mismatch() {
        let dir = tempfile::TempDir::new().unwrap();
        let pin_path = dir.path().join("machine_id.json");
        check_and_pin(&probes(), &pin_path, "box1", || "2026-01-01T00:00:00Z".to_string()).unwrap();

        let mut swapped = probes();
        swapped.hostname = Some("other-host".to_string());
        let outcome = check_and_pin(&swapped, &pin_path, "other-host", || "2026-01-02T00:00:00Z".to_string()).unwrap();
        match outcome {
            PinOutcome::Mismatch { pinned, computed } => assert_ne!(pinned, computed),
            other => panic!("expected Mismatch, got {other:?}"),
        }
    }

    #[test]
    fn pin_survives_across_reads_byte_exact() {
        let dir = tempfile::TempDir::new().unwrap();
        let pin_path = dir.path().join("machine_id.json");
        let first = check_and_pin(&probes(), &pin_path, "box1", || "2026-01-01T00:00:00Z".to_string()).unwrap();
        let record = load_pin(&pin_path).unwrap().unwrap();
        if let PinOutcome::FirstPin { fingerprint } = first {
            assert_eq!(record.fingerprint, fingerprint);
        } else {
            panic!("expected FirstPin");
        }
    }
}
