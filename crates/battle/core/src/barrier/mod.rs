//! Presentation barrier: turns many independently-arriving "finished"
//! callbacks into one debounced "everything finished" signal.
//!
//! Work is tracked as *operations* grouped into *batches*. A batch completes
//! once it has been ended and its last operation unregistered. The barrier is
//! idle when every batch except the implicit default batch is complete.
//!
//! # Deferred idle
//!
//! A completion callback may arrive in the same scheduling step that starts
//! new work. Going idle is therefore only *provisional*: the
//! all-operations-complete listeners fire from [`PresentationBarrier::tick`],
//! and only if the barrier is still idle at that point. Work started in the
//! meantime cancels the broadcast; it fires once that work completes instead.
//!
//! The barrier is a cheap `Rc` handle shared between every site that starts
//! presentation work. It is deliberately `!Send`.
mod guard;
mod handle;

pub use guard::{ScopedBatch, ScopedOperation};
pub use handle::{BatchHandle, OperationHandle};

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use tracing::{debug, info, trace, warn};

use crate::error::BarrierError;

#[derive(Debug)]
struct Operation {
    label: String,
    batch: BatchHandle,
}

#[derive(Debug)]
struct Batch {
    name: String,
    pending: HashSet<OperationHandle>,
    ended: bool,
}

impl Batch {
    fn new(name: String) -> Self {
        Self {
            name,
            pending: HashSet::new(),
            ended: false,
        }
    }

    fn is_complete(&self) -> bool {
        self.ended && self.pending.is_empty()
    }
}

struct CompletedBatch {
    handle: BatchHandle,
    name: String,
}

/// Bookkeeping behind the barrier. Never calls out to listeners itself.
#[derive(Debug)]
struct Ledger {
    batches: HashMap<BatchHandle, Batch>,
    operations: HashMap<OperationHandle, Operation>,
    active_stack: Vec<BatchHandle>,
    next_id: u64,
    idle_provisional: bool,
}

impl Ledger {
    const DEFAULT_BATCH_NAME: &'static str = "default";

    fn new() -> Self {
        let mut batches = HashMap::new();
        batches.insert(
            BatchHandle::DEFAULT,
            Batch::new(Self::DEFAULT_BATCH_NAME.to_owned()),
        );
        Self {
            batches,
            operations: HashMap::new(),
            active_stack: Vec::new(),
            next_id: 0,
            idle_provisional: false,
        }
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Innermost open scoped batch, or the default batch.
    fn current_batch(&self) -> BatchHandle {
        self.active_stack
            .iter()
            .rev()
            .copied()
            .find(|handle| self.batches.contains_key(handle))
            .unwrap_or(BatchHandle::DEFAULT)
    }

    fn begin(&mut self, name: String) -> BatchHandle {
        let handle = BatchHandle::from_raw(self.allocate());
        debug!(%handle, name = %name, open = self.batches.len(), "batch begun");
        self.batches.insert(handle, Batch::new(name));
        handle
    }

    fn end(&mut self, handle: BatchHandle) -> Result<Option<CompletedBatch>, BarrierError> {
        if handle.is_default() {
            warn!("attempted to end the default batch");
            return Err(BarrierError::DefaultBatchCannotEnd);
        }
        let Some(batch) = self.batches.get_mut(&handle) else {
            warn!(%handle, "attempted to end unknown batch");
            return Err(BarrierError::BatchNotFound { batch: handle });
        };
        if batch.ended {
            debug!(%handle, name = %batch.name, "batch already ended");
            return Ok(None);
        }
        batch.ended = true;
        debug!(%handle, name = %batch.name, pending = batch.pending.len(), "batch ended");
        Ok(self.take_if_complete(handle))
    }

    fn register(
        &mut self,
        label: String,
        batch: Option<BatchHandle>,
    ) -> Result<OperationHandle, BarrierError> {
        let target = batch.unwrap_or_else(|| self.current_batch());
        if !self.batches.contains_key(&target) {
            warn!(batch = %target, label = %label, "cannot register operation: batch not found");
            return Err(BarrierError::BatchNotFound { batch: target });
        }

        let handle = OperationHandle::from_raw(self.allocate());
        if let Some(owner) = self.batches.get_mut(&target) {
            owner.pending.insert(handle);
            trace!(
                operation = %handle,
                label = %label,
                batch = %owner.name,
                total = self.operations.len() + 1,
                "operation registered"
            );
        }
        self.operations.insert(
            handle,
            Operation {
                label,
                batch: target,
            },
        );
        Ok(handle)
    }

    fn unregister(
        &mut self,
        handle: OperationHandle,
    ) -> Result<Option<CompletedBatch>, BarrierError> {
        let Some(operation) = self.operations.remove(&handle) else {
            warn!(operation = %handle, "operation not found; already unregistered?");
            return Err(BarrierError::OperationNotFound { operation: handle });
        };
        if let Some(batch) = self.batches.get_mut(&operation.batch) {
            batch.pending.remove(&handle);
        }
        trace!(
            operation = %handle,
            label = %operation.label,
            remaining = self.operations.len(),
            "operation unregistered"
        );
        Ok(self.take_if_complete(operation.batch))
    }

    fn take_if_complete(&mut self, handle: BatchHandle) -> Option<CompletedBatch> {
        if handle.is_default() {
            return None;
        }
        if !self.batches.get(&handle).is_some_and(Batch::is_complete) {
            return None;
        }
        let batch = self.batches.remove(&handle)?;
        debug!(%handle, name = %batch.name, "batch completed");
        Some(CompletedBatch {
            handle,
            name: batch.name,
        })
    }

    fn is_idle(&self) -> bool {
        self.batches
            .iter()
            .all(|(handle, batch)| handle.is_default() || batch.is_complete())
    }
}

type IdleListener = Box<dyn FnMut()>;
type BatchListener = Box<dyn FnMut(BatchHandle, &str)>;

struct Shared {
    ledger: RefCell<Ledger>,
    idle_listeners: RefCell<Vec<IdleListener>>,
    batch_listeners: RefCell<Vec<BatchListener>>,
    /// Completions raised while batch listeners run, drained by the outer call.
    completed: RefCell<VecDeque<CompletedBatch>>,
    dispatching: Cell<bool>,
}

/// Shared handle to the presentation barrier.
#[derive(Clone)]
pub struct PresentationBarrier {
    shared: Rc<Shared>,
}

impl PresentationBarrier {
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared {
                ledger: RefCell::new(Ledger::new()),
                idle_listeners: RefCell::new(Vec::new()),
                batch_listeners: RefCell::new(Vec::new()),
                completed: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
            }),
        }
    }

    /// Opens a named batch.
    pub fn begin_batch(&self, name: impl Into<String>) -> BatchHandle {
        self.shared.ledger.borrow_mut().begin(name.into())
    }

    /// Seals a batch. A sealed batch with nothing pending completes at once.
    pub fn end_batch(&self, handle: BatchHandle) -> Result<(), BarrierError> {
        let completed = self.shared.ledger.borrow_mut().end(handle)?;
        if let Some(completed) = completed {
            self.batch_completed(completed);
        }
        Ok(())
    }

    /// Registers an operation in `batch`, or in the innermost scoped batch,
    /// or in the default batch.
    pub fn register_operation(
        &self,
        label: impl Into<String>,
        batch: Option<BatchHandle>,
    ) -> Result<OperationHandle, BarrierError> {
        self.shared.ledger.borrow_mut().register(label.into(), batch)
    }

    /// Marks an operation finished. Unregistering twice is a logged no-op.
    pub fn unregister_operation(&self, handle: OperationHandle) -> Result<(), BarrierError> {
        let completed = self.shared.ledger.borrow_mut().unregister(handle)?;
        if let Some(completed) = completed {
            self.batch_completed(completed);
        }
        Ok(())
    }

    /// True when every batch except the default one is complete.
    pub fn is_idle(&self) -> bool {
        self.shared.ledger.borrow().is_idle()
    }

    /// Unknown (already completed) batches count as complete.
    pub fn is_batch_complete(&self, handle: BatchHandle) -> bool {
        self.shared
            .ledger
            .borrow()
            .batches
            .get(&handle)
            .is_none_or(Batch::is_complete)
    }

    /// True between a provisional idle transition and the next [`tick`](Self::tick).
    pub fn is_idle_pending(&self) -> bool {
        self.shared.ledger.borrow().idle_provisional
    }

    /// Advances the barrier by one scheduling step.
    ///
    /// Confirms a provisional idle transition and fires the
    /// all-operations-complete listeners. Returns whether they fired.
    pub fn tick(&self) -> bool {
        let confirmed = {
            let mut ledger = self.shared.ledger.borrow_mut();
            if !ledger.idle_provisional {
                return false;
            }
            ledger.idle_provisional = false;
            ledger.is_idle()
        };

        if !confirmed {
            debug!("provisional idle cancelled by work started in the same step");
            return false;
        }

        info!("all presentation operations complete");
        let mut listeners = std::mem::take(&mut *self.shared.idle_listeners.borrow_mut());
        for listener in &mut listeners {
            listener();
        }
        restore(&self.shared.idle_listeners, listeners);
        true
    }

    /// Subscribe to the debounced all-operations-complete signal.
    pub fn on_all_complete(&self, listener: impl FnMut() + 'static) {
        self.shared
            .idle_listeners
            .borrow_mut()
            .push(Box::new(listener));
    }

    /// Subscribe to per-batch completion, fired synchronously.
    pub fn on_batch_complete(&self, listener: impl FnMut(BatchHandle, &str) + 'static) {
        self.shared
            .batch_listeners
            .borrow_mut()
            .push(Box::new(listener));
    }

    pub fn pending_operations(&self) -> usize {
        self.shared.ledger.borrow().operations.len()
    }

    pub fn operation_label(&self, handle: OperationHandle) -> Option<String> {
        self.shared
            .ledger
            .borrow()
            .operations
            .get(&handle)
            .map(|operation| operation.label.clone())
    }

    pub(crate) fn push_active_batch(&self, handle: BatchHandle) {
        self.shared.ledger.borrow_mut().active_stack.push(handle);
    }

    /// Removes `handle` from the active stack wherever it sits, so guards may
    /// be dropped out of order.
    pub(crate) fn pop_active_batch(&self, handle: BatchHandle) {
        let mut ledger = self.shared.ledger.borrow_mut();
        if let Some(index) = ledger.active_stack.iter().rposition(|open| *open == handle) {
            ledger.active_stack.remove(index);
        }
    }

    fn batch_completed(&self, completed: CompletedBatch) {
        self.shared.completed.borrow_mut().push_back(completed);
        if self.shared.dispatching.replace(true) {
            trace!("batch completed during dispatch; queued");
            return;
        }

        loop {
            let next = self.shared.completed.borrow_mut().pop_front();
            let Some(completed) = next else {
                break;
            };
            let mut listeners = std::mem::take(&mut *self.shared.batch_listeners.borrow_mut());
            for listener in &mut listeners {
                listener(completed.handle, &completed.name);
            }
            restore(&self.shared.batch_listeners, listeners);
        }
        self.shared.dispatching.set(false);

        let mut ledger = self.shared.ledger.borrow_mut();
        if ledger.is_idle() && !ledger.idle_provisional {
            trace!("barrier provisionally idle");
            ledger.idle_provisional = true;
        }
    }
}

impl Default for PresentationBarrier {
    fn default() -> Self {
        Self::new()
    }
}

/// Puts dispatched listeners back, keeping any subscribed during dispatch.
fn restore<T>(slot: &RefCell<Vec<T>>, mut listeners: Vec<T>) {
    let mut slot = slot.borrow_mut();
    listeners.append(&mut slot);
    *slot = listeners;
}
