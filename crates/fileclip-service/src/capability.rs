use std::fmt;
use std::sync::Arc;

use crate::queue::JobBackend;

/// Which optional processing subsystems are present in this process.
///
/// Queried on every triggered save; implementations must be cheap and
/// must not fail. Absence is the normal case.
pub trait CapabilityRegistry: Send + Sync {
    /// A deferred-processing collaborator owns attachment processing.
    fn deferred_enabled(&self) -> bool;

    fn job_backend(&self) -> Option<Arc<dyn JobBackend>>;

    fn job_backend_enabled(&self) -> bool {
        self.job_backend().is_some()
    }
}

#[derive(Clone, Default)]
pub enum JobBackendSlot {
    #[default]
    NoJobBackend,
    JobBackend(Arc<dyn JobBackend>),
}

impl fmt::Debug for JobBackendSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobBackendSlot::NoJobBackend => f.write_str("NoJobBackend"),
            JobBackendSlot::JobBackend(backend) => {
                f.debug_tuple("JobBackend").field(&backend.name()).finish()
            }
        }
    }
}

/// Capabilities fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    deferred: bool,
    jobs: JobBackendSlot,
}

impl Capabilities {
    /// Neither deferred processing nor a job backend: everything runs inline.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_deferred(mut self, enabled: bool) -> Self {
        self.deferred = enabled;
        self
    }

    pub fn with_job_backend(mut self, backend: Arc<dyn JobBackend>) -> Self {
        self.jobs = JobBackendSlot::JobBackend(backend);
        self
    }
}

impl CapabilityRegistry for Capabilities {
    fn deferred_enabled(&self) -> bool {
        self.deferred
    }

    fn job_backend(&self) -> Option<Arc<dyn JobBackend>> {
        match &self.jobs {
            JobBackendSlot::NoJobBackend => None,
            JobBackendSlot::JobBackend(backend) => Some(backend.clone()),
        }
    }
}
