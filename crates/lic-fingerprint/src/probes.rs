//! Hardware probe collection, abstracted behind a trait so tests (and any
//! future platform port) can substitute fixed probe output instead of
//! reading real hardware — the same pattern `tor-rtcompat` uses to
//! trait-abstract OS-dependent facilities (sleeping, networking) behind a
//! swappable implementation (SPEC_FULL.md §4.3).

/// A source of the labeled hardware/OS tokens spec.md §4.3 combines into a
/// machine fingerprint.
///
/// Each method returns `None` (or an empty vec, for
/// [`HardwareProbes::os_specific_tokens`]) when that probe is unavailable
/// on the current host, rather than erroring — spec.md §4.3's fallback
/// rule only cares about *how many* tokens were collected, not which ones
/// failed.
pub trait HardwareProbes {
    /// The host's node name (`hostname:<...>`).
    fn hostname(&self) -> Option<String>;
    /// The OS kernel name (`system:<...>`), e.g. `Linux`, `Windows`.
    fn system(&self) -> Option<String>;
    /// The CPU architecture tag (`machine:<...>`), e.g. `x86_64`.
    fn machine_arch(&self) -> Option<String>;
    /// Already-labeled, OS-specific tokens beyond the three universal
    /// ones above (spec.md §4.3: `machine_guid`/`cpu` on Windows,
    /// `machine_id`/`product_uuid` on Linux).
    fn os_specific_tokens(&self) -> Vec<String>;
}

/// The real [`HardwareProbes`] implementation, reading actual host state.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealProbes;

impl HardwareProbes for RealProbes {
    fn hostname(&self) -> Option<String> {
        hostname_string()
    }

    fn system(&self) -> Option<String> {
        let os = std::env::consts::OS;
        if os.is_empty() {
            None
        } else {
            Some(os_kernel_name(os).to_string())
        }
    }

    fn machine_arch(&self) -> Option<String> {
        let arch = std::env::consts::ARCH;
        if arch.is_empty() {
            None
        } else {
            Some(arch.to_string())
        }
    }

    fn os_specific_tokens(&self) -> Vec<String> {
        os_specific::collect()
    }
}

/// Map Rust's `std::env::consts::OS` strings onto the kernel-name spelling
/// spec.md §4.3 expects (`Linux`, `Windows`, `Darwin`, ...).
fn os_kernel_name(os: &str) -> &'static str {
    match os {
        "linux" => "Linux",
        "windows" => "Windows",
        "macos" => "Darwin",
        "freebsd" => "FreeBSD",
        "openbsd" => "OpenBSD",
        "netbsd" => "NetBSD",
        _ => "Unknown",
    }
}

/// Read the local hostname without pulling in a whole `hostname` crate:
/// `gethostname(2)` on Unix, the `COMPUTERNAME` environment variable on
/// Windows (set unconditionally by the OS for every process).
fn hostname_string() -> Option<String> {
    #[cfg(unix)]
    {
        unix_hostname()
    }
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(any(unix, windows)))]
    {
        None
    }
}

#[cfg(unix)]
fn unix_hostname() -> Option<String> {
    // `gethostname(2)` via libc, matching the minimal-dependency spirit of
    // this workspace's other OS-probing code (`lic-fs-mistrust`'s
    // unix-only ownership checks).
    let mut buf = vec![0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    buf.truncate(end);
    String::from_utf8(buf).ok()
}

#[cfg(target_os = "linux")]
mod os_specific {
    pub fn collect() -> Vec<String> {
        let mut tokens = Vec::new();
        if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
            let id = id.trim();
            if !id.is_empty() {
                tokens.push(format!("machine_id:{id}"));
            }
        }
        if let Ok(uuid) = std::fs::read_to_string("/sys/class/dmi/id/product_uuid") {
            let uuid = uuid.trim();
            if !uuid.is_empty() {
                tokens.push(format!("product_uuid:{uuid}"));
            }
        }
        tokens
    }
}

#[cfg(target_os = "windows")]
mod os_specific {
    pub fn collect() -> Vec<String> {
        let mut tokens = Vec::new();
        if let Some(guid) = machine_guid() {
            tokens.push(format!("machine_guid:{guid}"));
        }
        if let Ok(id) = std::env::var("PROCESSOR_IDENTIFIER") {
            // A full `ProcessorId` read requires a WMI round-trip
            // (`Win32_Processor.ProcessorId`); the `PROCESSOR_IDENTIFIER`
            // environment variable the OS already sets for every process
            // is a lighter-weight stand-in with the same "identifies this
            // CPU model" property, at the cost of being the same across
            // identical-model machines rather than per-unit unique. Noted
            // in DESIGN.md as a deliberate simplification.
            tokens.push(format!("cpu:{id}"));
        }
        tokens
    }

    fn machine_guid() -> Option<String> {
        use winreg::enums::HKEY_LOCAL_MACHINE;
        use winreg::RegKey;
        let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
        let key = hklm.open_subkey("SOFTWARE\\Microsoft\\Cryptography").ok()?;
        key.get_value("MachineGuid").ok()
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
mod os_specific {
    pub fn collect() -> Vec<String> {
        Vec::new()
    }
}

/// A fixed, in-memory [`HardwareProbes`] for tests.
#[derive(Clone, Debug, Default)]
pub struct FixedProbes {
    /// See [`HardwareProbes::hostname`].
    pub hostname: Option<String>,
    /// See [`HardwareProbes::system`].
    pub system: Option<String>,
    /// See [`HardwareProbes::machine_arch`].
    pub machine_arch: Option<String>,
    /// See [`HardwareProbes::os_specific_tokens`].
    pub os_specific_tokens: Vec<String>,
}

impl HardwareProbes for FixedProbes {
    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }

    fn system(&self) -> Option<String> {
        self.system.clone()
    }

    fn machine_arch(&self) -> Option<String> {
        self.machine_arch.clone()
    }

    fn os_specific_tokens(&self) -> Vec<String> {
        self.os_specific_tokens.clone()
    }
}
