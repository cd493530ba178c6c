/* 📖 # Why does a request wait for the ready gate?

The document is built on a background thread while the HTTP server may already be accepting
connections. Serving whatever happens to be merged at that moment would hand out a partial
document, so every request first waits on the ready gate. The gate is assigned once: it opens
when the build finishes, or records the failure message when the build aborts, and from then on
waiting returns immediately.
*/

use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock, RwLockWriteGuard};
use serde_json::Value;

use swagdoc_base::SwagdocResult;

use crate::document::AggregateDocument;
use crate::validator::{SchemaValidator, Validity, ValidityCache, ValidityOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    Building,
    Ready,
    Failed(String),
}

/// Single-assignment readiness signal of the initial build.
#[derive(Debug)]
pub struct ReadyGate {
    status: Mutex<BuildStatus>,
    changed: Condvar,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(BuildStatus::Building),
            changed: Condvar::new(),
        }
    }

    /// Mark the build finished. Has no effect once the gate is settled.
    pub fn open(&self) {
        self.settle(BuildStatus::Ready);
    }

    /// Mark the build failed. Has no effect once the gate is settled.
    pub fn fail(&self, message: impl Into<String>) {
        self.settle(BuildStatus::Failed(message.into()));
    }

    fn settle(&self, outcome: BuildStatus) {
        let mut status = self.status.lock();
        if *status == BuildStatus::Building {
            *status = outcome;
            self.changed.notify_all();
        }
    }

    pub fn status(&self) -> BuildStatus {
        self.status.lock().clone()
    }

    /// Block until the gate is settled and return the final status.
    pub fn wait(&self) -> BuildStatus {
        let mut status = self.status.lock();
        while *status == BuildStatus::Building {
            self.changed.wait(&mut status);
        }
        status.clone()
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct DocsShared {
    document: RwLock<AggregateDocument>,
    ready: ReadyGate,
    validity: ValidityCache,
}

/// A thread-safe handle to the assembled document.
///
/// Cloning is cheap (Arc). Readers get copies; the only writer is the document builder.
#[derive(Debug, Clone)]
pub struct DocsHandle(Arc<DocsShared>);

impl DocsHandle {
    pub fn new(validator: Box<dyn SchemaValidator>) -> Self {
        Self(Arc::new(DocsShared {
            document: RwLock::new(AggregateDocument::new()),
            ready: ReadyGate::new(),
            validity: ValidityCache::new(validator),
        }))
    }

    /// Deep copy of the current document.
    pub fn snapshot(&self) -> Value {
        self.0.document.read().to_value()
    }

    pub fn epoch(&self) -> u64 {
        self.0.document.read().epoch()
    }

    pub fn validity(&self) -> Validity {
        self.0.document.read().validity().clone()
    }

    /// Cached or freshly computed validation outcome of the current document.
    pub fn ensure_valid(&self) -> ValidityOutcome {
        self.0.validity.ensure_valid(&self.0.document)
    }

    pub fn ready_gate(&self) -> &ReadyGate {
        &self.0.ready
    }

    /// Wait for the initial build and fail if it did.
    pub fn wait_ready(&self) -> SwagdocResult<()> {
        match self.0.ready.wait() {
            BuildStatus::Failed(message) => Err(swagdoc_base::err!(
                "Building the API document failed: {}",
                message
            )),
            BuildStatus::Ready | BuildStatus::Building => Ok(()),
        }
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, AggregateDocument> {
        self.0.document.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionKind;
    use crate::validator::SwaggerSchemaValidator;
    use std::time::Duration;

    #[test]
    fn test_gate_is_single_assignment() {
        let gate = ReadyGate::new();
        assert_eq!(gate.status(), BuildStatus::Building);

        gate.fail("boom");
        gate.open();
        assert_eq!(gate.wait(), BuildStatus::Failed("boom".to_string()));
    }

    #[test]
    fn test_waiters_are_released_when_gate_opens() {
        let gate = ReadyGate::new();

        let status = std::thread::scope(|scope| {
            let waiter = scope.spawn(|| gate.wait());
            std::thread::sleep(Duration::from_millis(20));
            gate.open();
            waiter.join().unwrap()
        });

        assert_eq!(status, BuildStatus::Ready);
    }

    #[test]
    fn test_wait_ready_reports_failure() {
        let docs = DocsHandle::new(Box::new(SwaggerSchemaValidator));
        docs.ready_gate().fail("Invalid Section SwaggerModels");

        let error = docs.wait_ready().unwrap_err();
        assert_eq!(
            error.to_string(),
            "Building the API document failed: Invalid Section SwaggerModels"
        );
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let docs = DocsHandle::new(Box::new(SwaggerSchemaValidator));
        let before = docs.snapshot();

        docs.write()
            .merge(SectionKind::Path, serde_json::Map::new())
            .unwrap();

        assert_eq!(before, docs.snapshot());
        assert_eq!(docs.epoch(), 1);
        assert_eq!(docs.validity(), Validity::Unknown);
    }
}
