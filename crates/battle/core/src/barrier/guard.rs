//! RAII helpers for the presentation barrier.
use tracing::warn;

use super::{BatchHandle, OperationHandle, PresentationBarrier};
use crate::error::BarrierError;

/// Registers an operation on creation and unregisters it on drop or
/// [`complete`](Self::complete), whichever comes first.
pub struct ScopedOperation {
    barrier: PresentationBarrier,
    handle: Option<OperationHandle>,
}

impl ScopedOperation {
    pub fn new(
        barrier: &PresentationBarrier,
        label: impl Into<String>,
        batch: Option<BatchHandle>,
    ) -> Result<Self, BarrierError> {
        let handle = barrier.register_operation(label, batch)?;
        Ok(Self {
            barrier: barrier.clone(),
            handle: Some(handle),
        })
    }

    /// Finishes the operation early. Later calls do nothing.
    pub fn complete(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(error) = self.barrier.unregister_operation(handle) {
            warn!(%error, "scoped operation could not be unregistered");
        }
    }

    pub fn handle(&self) -> Option<OperationHandle> {
        self.handle
    }

    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for ScopedOperation {
    fn drop(&mut self) {
        self.complete();
    }
}

/// Opens a batch and makes it the target for operations registered without
/// an explicit batch. Dropping the guard seals the batch.
pub struct ScopedBatch {
    barrier: PresentationBarrier,
    handle: BatchHandle,
}

impl ScopedBatch {
    pub fn new(barrier: &PresentationBarrier, name: impl Into<String>) -> Self {
        let handle = barrier.begin_batch(name);
        barrier.push_active_batch(handle);
        Self {
            barrier: barrier.clone(),
            handle,
        }
    }

    pub fn handle(&self) -> BatchHandle {
        self.handle
    }

    /// Registers an operation in this batch. The caller owns unregistering it.
    pub fn register(&self, label: impl Into<String>) -> Result<OperationHandle, BarrierError> {
        self.barrier.register_operation(label, Some(self.handle))
    }

    /// Registers an operation in this batch, tied to the returned guard.
    pub fn scoped_operation(
        &self,
        label: impl Into<String>,
    ) -> Result<ScopedOperation, BarrierError> {
        ScopedOperation::new(&self.barrier, label, Some(self.handle))
    }
}

impl Drop for ScopedBatch {
    fn drop(&mut self) {
        self.barrier.pop_active_batch(self.handle);
        if let Err(error) = self.barrier.end_batch(self.handle) {
            warn!(%error, batch = %self.handle, "scoped batch could not be ended");
        }
    }
}
