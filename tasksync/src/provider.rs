//! Buffering of translated commands and pushing them to the remote service.
//!
//! A [`Provider`] owns the lookup store and the transport. Hook events add
//! their batches to an in-memory buffer; [`Provider::push`] sends the whole
//! buffer as one Sync request and reports which local tasks need their new
//! remote id written back. [`Provider::pull`] refreshes an on-disk cache.
//!
//! Until the cache catches up, the provider remembers what its own
//! commands created: tasks whose `item_add` is buffered, and projects and
//! sections created by buffered or pushed commands.

use chrono_tz::Tz;
use tasksync_proto::command::{Command, ItemRef, OrderError, check_order};
use tasksync_proto::sync::PullRequest;
use uuid::Uuid;

use crate::model::TaskSnapshot;
use crate::store::{CacheStore, Collection, LookupStore, StoreError};
use crate::transport::{SyncTransport, TransportError};
use crate::translate::{
    Batch, Created, CreatedObjects, DEFAULT_PROJECT, TranslateError, Translator,
};

/// Errors raised by the provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// A batch could not be built.
    #[error(transparent)]
    Translate(#[from] TranslateError),

    /// The buffered commands reference a temp id out of order.
    #[error("refusing to push misordered batch: {0}")]
    Order(#[from] OrderError),

    /// The request failed; the buffer is kept.
    #[error("sync request failed: {0}")]
    Transport(#[from] TransportError),

    /// Pulled changes could not be saved.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Settings that shape translation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Zone for tasks that do not record one.
    pub timezone: Tz,
    /// Project that tasks fall back to when their project is removed.
    pub default_project: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            default_project: DEFAULT_PROJECT.to_string(),
        }
    }
}

/// A remote id to record on a local task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Writeback {
    /// Host task uuid.
    pub task: Uuid,
    /// Id assigned by the remote service.
    pub remote_id: String,
}

/// A command the remote service did not accept.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFailure {
    /// Command uuid.
    pub uuid: String,
    /// Error payload returned by the service.
    pub error: serde_json::Value,
}

/// Result of a successful push.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushOutcome {
    /// Number of commands sent.
    pub pushed: usize,
    /// Remote ids to write back to created tasks.
    pub writebacks: Vec<Writeback>,
    /// Commands rejected individually by the service.
    pub failures: Vec<CommandFailure>,
}

/// Buffers commands across hook events and pushes them in one batch.
#[derive(Debug)]
pub struct Provider<S, T> {
    store: S,
    transport: T,
    settings: SyncSettings,
    pending: Vec<Command>,
    created: Vec<Created>,
    objects: CreatedObjects,
}

impl<S: LookupStore, T: SyncTransport> Provider<S, T> {
    /// Creates a provider with an empty buffer.
    pub fn new(store: S, transport: T, settings: SyncSettings) -> Self {
        Self {
            store,
            transport,
            settings,
            pending: Vec::new(),
            created: Vec::new(),
            objects: CreatedObjects::new(),
        }
    }

    /// Translator over this provider's store, settings and created objects.
    #[must_use]
    pub fn translator(&self) -> Translator<'_, S> {
        Translator::new(&self.store, self.settings.timezone)
            .with_default_project(self.settings.default_project.clone())
            .with_created(&self.objects)
    }

    /// Translates and buffers an added task.
    pub fn on_add(&mut self, task: &TaskSnapshot) -> Batch {
        let batch = self.translator().on_add(task);
        self.enqueue(&batch);
        batch
    }

    /// Translates and buffers a modified task.
    ///
    /// A task whose `item_add` is still buffered is edited through that
    /// command's temp id instead of being created a second time.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Translate`]; nothing is buffered in that case.
    pub fn on_modify(&mut self, old: &TaskSnapshot, new: &TaskSnapshot) -> Result<Batch, ProviderError> {
        let batch = match self.buffered_item(new) {
            Some(id) => {
                tracing::debug!(task = %new.uuid(), %id, "task creation still buffered");
                let old = old.clone().with_remote_id(id.clone());
                let new = new.clone().with_remote_id(id);
                self.translator().on_modify(&old, &new)?
            }
            None => self.translator().on_modify(old, new)?,
        };
        self.enqueue(&batch);
        Ok(batch)
    }

    /// Temp id of the buffered `item_add` for a task the host has not yet
    /// recorded a remote id on.
    fn buffered_item(&self, task: &TaskSnapshot) -> Option<ItemRef> {
        if task.remote_id().is_some() {
            return None;
        }
        self.created
            .iter()
            .find(|created| created.task == task.uuid())
            .map(|created| ItemRef::Pending(created.temp_id.clone()))
    }

    fn enqueue(&mut self, batch: &Batch) {
        for command in &batch.commands {
            self.objects.record(command);
        }
        self.pending.extend(batch.commands.iter().cloned());
        if let Some(created) = &batch.created {
            self.created.push(created.clone());
        }
        tracing::debug!(
            added = batch.commands.len(),
            pending = self.pending.len(),
            "buffered commands"
        );
    }

    /// Number of buffered commands.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Buffered commands in send order.
    #[must_use]
    pub fn pending_commands(&self) -> &[Command] {
        &self.pending
    }

    /// Sends every buffered command as one batch.
    ///
    /// On success the buffer is cleared. Commands the service rejects
    /// individually are reported, not retried.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Order`] if the buffer is misordered, or
    /// [`ProviderError::Transport`] if the push fails. The buffer is kept
    /// in both cases.
    pub async fn push(&mut self) -> Result<PushOutcome, ProviderError> {
        if self.pending.is_empty() {
            return Ok(PushOutcome::default());
        }
        check_order(&self.pending)?;

        let response = self.transport.push(&self.pending).await?;
        let pushed = self.pending.len();
        self.pending.clear();
        self.objects.settle(&response);

        let mut writebacks = Vec::new();
        for created in self.created.drain(..) {
            if let Some(id) = response.resolve(&created.temp_id) {
                writebacks.push(Writeback {
                    task: created.task,
                    remote_id: id.to_string(),
                });
            } else {
                tracing::warn!(task = %created.task, temp_id = %created.temp_id, "no id assigned for created task");
            }
        }

        let failures: Vec<CommandFailure> = response
            .failures()
            .into_iter()
            .map(|(uuid, error)| CommandFailure {
                uuid: uuid.to_string(),
                error: error.clone(),
            })
            .collect();
        for failure in &failures {
            tracing::warn!(command = %failure.uuid, error = %failure.error, "command rejected");
        }

        tracing::info!(pushed, writebacks = writebacks.len(), "pushed sync batch");
        Ok(PushOutcome {
            pushed,
            writebacks,
            failures,
        })
    }

    /// Projects and sections created by this provider's commands that the
    /// cache may not list yet.
    #[must_use]
    pub const fn created_objects(&self) -> &CreatedObjects {
        &self.objects
    }

    /// Settings in use.
    #[must_use]
    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Lookup store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Mutable lookup store, for reloading.
    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: SyncTransport> Provider<CacheStore, T> {
    /// Pulls remote changes into the cache.
    ///
    /// With `full` set the sync token is discarded first, so every object
    /// is fetched again. Created objects the pull has made visible are
    /// forgotten; those still in the buffer are kept.
    ///
    /// Returns the number of cached objects added, changed or removed.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] if the pull fails, or
    /// [`ProviderError::Store`] if the changes cannot be saved. Cached
    /// objects are unchanged when the pull fails.
    pub async fn pull(&mut self, full: bool) -> Result<usize, ProviderError> {
        if full {
            self.store.reset_token();
        }
        let resource_types = Collection::ALL.map(Collection::name);
        let request = PullRequest {
            sync_token: self.store.sync_token(),
            resource_types: &resource_types,
        };
        let response = self.transport.pull(&request).await?;
        let changed = self.store.apply(&response)?;
        self.objects.forget_settled();
        tracing::info!(
            changed,
            full_sync = response.full_sync,
            "pulled remote changes"
        );
        Ok(changed)
    }
}
