//! In-process store.
//!
//! [`InMemoryStore`] runs the shared [`Dataset`] semantics inside the client
//! process. It backs the offline demo mode and the test suite, and supports
//! fault injection so failure paths can be exercised deterministically.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use kanban_proto::dataset::{Dataset, Provisioning};
use kanban_proto::model::User;
use kanban_proto::wire::{StoreOp, StoreValue};
use parking_lot::Mutex;

use super::{AuthBackend, RemoteStore, StoreError};

/// In-memory implementation of [`RemoteStore`] and [`AuthBackend`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// The tables.
    dataset: Mutex<Dataset>,
    /// User of the current session, if signed in.
    session: Mutex<Option<User>>,
    /// When set, every read fails with [`StoreError::Unavailable`].
    fail_reads: AtomicBool,
    /// When set, every write fails with [`StoreError::Unavailable`].
    fail_writes: AtomicBool,
    /// Number of write operations attempted, including failed ones.
    writes: AtomicUsize,
}

impl InMemoryStore {
    /// Creates an empty store with the default provisioning template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that provisions new users from `provisioning`.
    #[must_use]
    pub fn with_provisioning(provisioning: Provisioning) -> Self {
        Self {
            dataset: Mutex::new(Dataset::with_provisioning(provisioning)),
            ..Self::default()
        }
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of write operations attempted so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn run(&self, op: StoreOp) -> Result<StoreValue, StoreError> {
        let session = self.session.lock().clone();
        let Some(user) = session else {
            return Err(StoreError::Forbidden("not signed in".to_string()));
        };

        if op.is_read() {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("reads disabled".to_string()));
            }
            return self.dataset.lock().query(&user, &op).map_err(Into::into);
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        self.dataset.lock().execute(&user, op).map_err(Into::into)
    }
}

impl RemoteStore for InMemoryStore {
    async fn execute(&self, op: StoreOp) -> Result<StoreValue, StoreError> {
        // Every store call is a suspension point, as with a real network store.
        tokio::task::yield_now().await;
        match op {
            StoreOp::SignIn {
                email,
                display_name,
            } => self.sign_in(&email, display_name).await.map(StoreValue::User),
            StoreOp::SignOut => self.sign_out().await.map(|()| StoreValue::Done),
            op => self.run(op),
        }
    }
}

impl AuthBackend for InMemoryStore {
    async fn sign_in(&self, email: &str, display_name: Option<String>) -> Result<User, StoreError> {
        let user = self.dataset.lock().sign_in(email, display_name)?;
        *self.session.lock() = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        self.session.lock().take();
        Ok(())
    }
}
