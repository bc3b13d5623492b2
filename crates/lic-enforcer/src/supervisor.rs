//! Starting, stopping, and authenticating the protected Docker Compose
//! stack (spec.md §9 Non-goals: actually invoking a container runtime is
//! out of scope, "modeled as a trait with a logging-only default
//! implementation").

/// Starts, stops, and authenticates the services a certificate entitles.
///
/// A real deployment supplies its own implementation that shells out to
/// `docker compose` (or an equivalent orchestrator); this crate ships
/// only [`LoggingSupervisor`], which records what it would have done.
pub trait ServiceSupervisor: Send + Sync {
    /// Log in to the Docker registry named in `compose_file`'s
    /// certificate, using the bundle's decrypted credentials.
    fn login(&self, registry: &str, username: &str) -> lic_error::Result<()>;

    /// Bring the stack described by `compose_file` up.
    fn up(&self, compose_file: &str) -> lic_error::Result<()>;

    /// Tear the stack down (spec.md §4.6: `INVALID` → `TERMINATED`).
    fn down(&self) -> lic_error::Result<()>;
}

/// A [`ServiceSupervisor`] that only logs its intended actions, never
/// actually invoking a container runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingSupervisor;

impl ServiceSupervisor for LoggingSupervisor {
    fn login(&self, registry: &str, username: &str) -> lic_error::Result<()> {
        tracing::info!(registry, username, "would log in to Docker registry");
        Ok(())
    }

    fn up(&self, compose_file: &str) -> lic_error::Result<()> {
        tracing::info!(bytes = compose_file.len(), "would bring Compose stack up");
        Ok(())
    }

    fn down(&self) -> lic_error::Result<()> {
        tracing::info!("would bring Compose stack down");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn logging_supervisor_never_fails() {
        let sup = LoggingSupervisor;
        assert!(sup.login("registry.example", "user").is_ok());
        assert!(sup.up("version: \"3.8\"\n").is_ok());
        assert!(sup.down().is_ok());
    }
}
