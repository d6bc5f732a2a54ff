//! Session engine
//!
//! The protocol routines are written as blocking send/receive conversations.
//! Hosts instead want a step-driven API they can pump from an event loop.
//! This module bridges the two: each session runs its protocol routine on a
//! private worker thread and rendezvouses with the driving thread at every
//! I/O boundary through one mutex + condvar.
//!
//! Driving contract, per `step(inbound)` call:
//! - a supplied inbound message is queued for the worker's next `recv`;
//!   an empty byte string is a real message, distinct from `None`;
//! - at most one outbound message is returned, in the order the worker
//!   produced them;
//! - `StepState::Done` is reported once the protocol routine has returned.
//!
//! If the worker produces a second message before the driver drained the
//! first, the worker blocks until the slot is free; outbound messages are
//! never dropped or overwritten.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::mpc::Transport;
use crate::types::StepState;

#[derive(Default, Debug)]
struct Inner {
    /// Messages supplied by the driver, not yet consumed by the worker
    inbound: VecDeque<Vec<u8>>,
    /// At most one message produced by the worker, not yet taken
    outbound: Option<Vec<u8>>,
    /// Worker is parked in a transport receive
    waiting_for_inbound: bool,
    /// Worker is parked waiting for the sign message
    waiting_for_message: bool,
    /// Bumped once per receive blocking episode; lets `step` tell "parked
    /// again for input we do not have" apart from "was parked when we
    /// arrived"
    wait_request_id: u64,
    worker_done: bool,
    fatal: Option<Error>,
    aborted: bool,
    /// Sign-only: the message to sign, handed over exactly once
    message: Option<Zeroizing<Vec<u8>>>,
    message_set: bool,
}

#[derive(Debug)]
pub(crate) struct Engine {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl Engine {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn closed() -> Error {
        Error::Io("session aborted".into())
    }

    /// Driver side: the rendezvous described in the module docs
    fn step(&self, inbound: Option<&[u8]>) -> Result<(StepState, Option<Vec<u8>>)> {
        let mut inner = self.lock();

        // If the worker was already starved on a receive when we arrived
        // and we bring nothing new, there is nothing to wait for.
        let snapshot = if inbound.is_none()
            && inner.waiting_for_inbound
            && inner.inbound.is_empty()
        {
            inner.wait_request_id.wrapping_sub(1)
        } else {
            inner.wait_request_id
        };

        if let Some(msg) = inbound {
            inner.inbound.push_back(msg.to_vec());
            self.cond.notify_all();
        }

        loop {
            if let Some(err) = inner.fatal.clone() {
                return Err(err);
            }
            if let Some(out) = inner.outbound.take() {
                let state = if inner.worker_done {
                    StepState::Done
                } else {
                    StepState::Continue
                };
                // a worker blocked in send may move on now
                self.cond.notify_all();
                return Ok((state, Some(out)));
            }
            if inner.worker_done {
                return Ok((StepState::Done, None));
            }
            // a worker parked on the sign message cannot be advanced by
            // stepping, only by set_message
            if inner.waiting_for_message && inner.message.is_none() {
                return Ok((StepState::Continue, None));
            }
            // the worker went (back) to a receive we have nothing for
            if inner.waiting_for_inbound
                && inner.inbound.is_empty()
                && inner.wait_request_id != snapshot
            {
                return Ok((StepState::Continue, None));
            }
            inner = self
                .cond
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Driver side: hand the sign message to a waiting worker
    fn set_message(&self, msg: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.message_set {
            return Err(Error::ProtocolState("message already set".into()));
        }
        inner.message_set = true;
        inner.message = Some(Zeroizing::new(msg.to_vec()));
        self.cond.notify_all();
        Ok(())
    }

    /// Driver side: non-blocking completion check used by finalize
    fn completion(&self) -> Result<()> {
        let inner = self.lock();
        if let Some(err) = inner.fatal.clone() {
            return Err(err);
        }
        if !inner.worker_done {
            return Err(Error::ProtocolState("session is not complete".into()));
        }
        Ok(())
    }

    fn abort(&self) {
        let mut inner = self.lock();
        inner.aborted = true;
        self.cond.notify_all();
    }

    /// Worker side: record the first failure; it is sticky from then on
    fn fail(&self, err: Error) {
        let mut inner = self.lock();
        if inner.fatal.is_none() {
            inner.fatal = Some(err);
        }
        self.cond.notify_all();
    }

    fn mark_done(&self) {
        let mut inner = self.lock();
        inner.worker_done = true;
        self.cond.notify_all();
    }

    /// Worker side: publish one outbound message, blocking while the slot
    /// is still occupied
    fn send_blocking(&self, msg: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        while inner.outbound.is_some() && inner.fatal.is_none() && !inner.aborted {
            inner = self
                .cond
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if inner.fatal.is_some() || inner.aborted {
            return Err(Self::closed());
        }
        inner.outbound = Some(msg.to_vec());
        self.cond.notify_all();
        Ok(())
    }

    /// Worker side: take the next inbound message, parking until one
    /// arrives. The wait counter is bumped once per blocking episode.
    fn recv_blocking(&self) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        if inner.inbound.is_empty() && inner.fatal.is_none() && !inner.aborted {
            inner.waiting_for_inbound = true;
            inner.wait_request_id = inner.wait_request_id.wrapping_add(1);
            self.cond.notify_all();
            while inner.inbound.is_empty() && inner.fatal.is_none() && !inner.aborted {
                inner = self
                    .cond
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            inner.waiting_for_inbound = false;
        }
        if inner.fatal.is_some() || inner.aborted {
            return Err(Self::closed());
        }
        inner.inbound.pop_front().ok_or_else(Self::closed)
    }

    /// Worker side: wait for the sign message. Announced through its own
    /// flag so drivers stepping before `set_message` observe
    /// `(Continue, None)` instead of blocking.
    fn wait_message(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut inner = self.lock();
        if inner.message.is_none() && inner.fatal.is_none() && !inner.aborted {
            inner.waiting_for_message = true;
            self.cond.notify_all();
            while inner.message.is_none() && inner.fatal.is_none() && !inner.aborted {
                inner = self
                    .cond
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            inner.waiting_for_message = false;
        }
        if inner.fatal.is_some() || inner.aborted {
            return Err(Self::closed());
        }
        inner.message.take().ok_or_else(Self::closed)
    }
}

/// The worker's view of its session: a [`Transport`] whose endpoints are
/// the driver's step calls
pub(crate) struct SessionChannel {
    engine: Arc<Engine>,
}

impl Transport for SessionChannel {
    fn send(&self, msg: &[u8]) -> Result<()> {
        self.engine.send_blocking(msg)
    }

    fn recv(&self) -> Result<Vec<u8>> {
        self.engine.recv_blocking()
    }
}

impl SessionChannel {
    pub(crate) fn wait_message(&self) -> Result<Zeroizing<Vec<u8>>> {
        self.engine.wait_message()
    }
}

/// A protocol routine running on its own worker thread, driven one message
/// at a time. `T` is the finalized output of the flow.
#[derive(Debug)]
pub(crate) struct Session<T> {
    engine: Arc<Engine>,
    result: Arc<Mutex<Option<T>>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Session<T> {
    pub(crate) fn spawn<F>(name: &str, routine: F) -> Result<Self>
    where
        F: FnOnce(&SessionChannel) -> Result<T> + Send + 'static,
    {
        let engine = Arc::new(Engine::new());
        let result: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));

        let worker_engine = engine.clone();
        let worker_result = result.clone();
        let worker = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let channel = SessionChannel {
                    engine: worker_engine.clone(),
                };
                let outcome = catch_unwind(AssertUnwindSafe(|| routine(&channel)));
                match outcome {
                    Ok(Ok(value)) => {
                        *worker_result
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner) = Some(value);
                    }
                    Ok(Err(err)) => worker_engine.fail(err),
                    Err(_) => worker_engine.fail(Error::General("session worker panicked".into())),
                }
                worker_engine.mark_done();
            })
            .map_err(|e| Error::General(format!("failed to spawn session worker: {e}")))?;

        Ok(Self {
            engine,
            result,
            worker: Some(worker),
        })
    }

    /// Advance the session. Not reentrant; enforced by `&mut self`.
    pub(crate) fn step(&mut self, inbound: Option<&[u8]>) -> Result<(StepState, Option<Vec<u8>>)> {
        self.engine.step(inbound)
    }

    pub(crate) fn set_message(&self, msg: &[u8]) -> Result<()> {
        self.engine.set_message(msg)
    }

    /// Consume the finalized value. Fails with the sticky fatal error, with
    /// ProtocolState before completion, and with ProtocolState again on a
    /// second call.
    pub(crate) fn take_result(&mut self) -> Result<T> {
        self.engine.completion()?;
        self.result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::ProtocolState("session already finalized".into()))
    }

    /// Borrow the finalized value without consuming it
    pub(crate) fn with_result<R>(&self, f: impl FnOnce(&T) -> Result<R>) -> Result<R> {
        self.engine.completion()?;
        let guard = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(value) => f(value),
            None => Err(Error::ProtocolState("session already finalized".into())),
        }
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        self.engine.abort();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
