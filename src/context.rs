use std::{
    thread::{self, ThreadId},
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::debug;

use crate::error::ContextError;

type Deferred = Box<dyn FnOnce() + Send>;

pub struct MainContext {
    sender: Sender<Deferred>,
    receiver: Receiver<Deferred>,
    owner: ThreadId,
}

#[derive(Clone)]
pub struct ContextHandle {
    sender: Sender<Deferred>,
}

impl MainContext {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            owner: thread::current().id(),
        }
    }

    pub fn handle(&self) -> ContextHandle {
        ContextHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    pub fn dispatch_pending(&self) -> usize {
        self.assert_owner();
        let mut ran = 0;
        while let Ok(deferred) = self.receiver.try_recv() {
            deferred();
            ran += 1;
        }
        if ran > 0 {
            debug!("Dispatched {} deferred call(s).", ran);
        }
        ran
    }

    pub fn dispatch_timeout(&self, timeout: Duration) -> bool {
        self.assert_owner();
        match self.receiver.recv_timeout(timeout) {
            Ok(deferred) => {
                deferred();
                self.dispatch_pending();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    pub fn run_until<F>(&self, mut done: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.dispatch_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.dispatch_timeout(deadline - now);
        }
    }

    fn assert_owner(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "MainContext pumped off its owning thread"
        );
    }
}

impl Default for MainContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextHandle {
    pub fn invoke<F>(&self, f: F) -> Result<(), ContextError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(Box::new(f))
            .map_err(|_| ContextError::Closed)
    }
}
