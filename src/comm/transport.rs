//! Host-to-host transport abstraction for the partition build.
//!
//! The partitioner only needs tagged, sender-identified byte buffers:
//! `send`, a non-blocking `recv_tagged`, `flush`, and a per-host phase
//! counter that namespaces exchange rounds. Messages between two hosts
//! with the same tag are FIFO per sender; different senders interleave
//! freely and receivers dispatch on the returned sender id.
//!
//! Two implementations are provided: [`NoTransport`] for single-host
//! builds and [`LocalCluster`], an in-process mailbox that runs one
//! "host" per thread, which is how the multi-host tests execute.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Tagged send/receive between cooperating hosts.
pub trait Transport: Send + Sync {
    /// Rank of this host (`0..num_hosts`).
    fn host(&self) -> usize;

    /// Total number of cooperating hosts.
    fn num_hosts(&self) -> usize;

    /// Queue `payload` for delivery to `target`. May block only if the
    /// implementation's buffers are full; never fails.
    fn send(&self, target: usize, tag: u32, payload: Vec<u8>);

    /// Take the next pending message carrying `tag`, from any sender.
    /// Non-blocking; callers spin (yielding) when a round must complete.
    fn recv_tagged(&self, tag: u32) -> Option<(usize, Vec<u8>)>;

    /// Push out any buffered sends.
    fn flush(&self) {}

    /// Current phase counter of this host.
    fn phase(&self) -> u32;

    /// Bump the phase counter. Called exactly once per exchange round, in
    /// lock-step across hosts; a host must finish its round first or a
    /// later round's messages will collide with this one.
    fn increment_phase(&self);
}

/// Block until a message with `tag` arrives.
pub(crate) fn recv_blocking<T: Transport + ?Sized>(net: &T, tag: u32) -> (usize, Vec<u8>) {
    loop {
        if let Some(p) = net.recv_tagged(tag) {
            return p;
        }
        std::thread::yield_now();
    }
}

/// Transport for a single-host build: nothing to send, nothing arrives.
#[derive(Debug, Default)]
pub struct NoTransport {
    phase: AtomicU32,
}

impl NoTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for NoTransport {
    fn host(&self) -> usize {
        0
    }

    fn num_hosts(&self) -> usize {
        1
    }

    fn send(&self, target: usize, _tag: u32, _payload: Vec<u8>) {
        unreachable!("single-host build sent to host {target}");
    }

    fn recv_tagged(&self, _tag: u32) -> Option<(usize, Vec<u8>)> {
        None
    }

    fn phase(&self) -> u32 {
        self.phase.load(Ordering::SeqCst)
    }

    fn increment_phase(&self) {
        self.phase.fetch_add(1, Ordering::SeqCst);
    }
}

struct Message {
    sender: usize,
    tag: u32,
    payload: Vec<u8>,
}

/// Shared state of one in-process cluster: a queue per destination host
/// and a phase counter per host.
struct Mailbox {
    queues: Vec<Mutex<VecDeque<Message>>>,
    phases: Vec<AtomicU32>,
}

/// In-process cluster of `size` hosts sharing a mailbox.
///
/// Each host's handle is cheap to clone and is typically moved into its
/// own thread. State is per-cluster (not process-global) so independent
/// clusters (e.g. concurrently running tests) cannot cross-talk.
#[derive(Clone)]
pub struct LocalCluster {
    inner: Arc<Mailbox>,
    size: usize,
}

impl LocalCluster {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "cluster needs at least one host");
        let inner = Arc::new(Mailbox {
            queues: (0..size).map(|_| Mutex::new(VecDeque::new())).collect(),
            phases: (0..size).map(|_| AtomicU32::new(0)).collect(),
        });
        Self { inner, size }
    }

    /// Transport handle for `host`.
    pub fn transport(&self, host: usize) -> LocalTransport {
        assert!(host < self.size, "host {host} out of range");
        LocalTransport {
            inner: Arc::clone(&self.inner),
            host,
            size: self.size,
        }
    }

    /// All handles at once, in host order.
    pub fn transports(&self) -> Vec<LocalTransport> {
        (0..self.size).map(|h| self.transport(h)).collect()
    }
}

/// One host's endpoint of a [`LocalCluster`].
#[derive(Clone)]
pub struct LocalTransport {
    inner: Arc<Mailbox>,
    host: usize,
    size: usize,
}

impl Transport for LocalTransport {
    fn host(&self) -> usize {
        self.host
    }

    fn num_hosts(&self) -> usize {
        self.size
    }

    fn send(&self, target: usize, tag: u32, payload: Vec<u8>) {
        assert!(target < self.size, "send to unknown host {target}");
        self.inner.queues[target].lock().push_back(Message {
            sender: self.host,
            tag,
            payload,
        });
    }

    fn recv_tagged(&self, tag: u32) -> Option<(usize, Vec<u8>)> {
        let mut q = self.inner.queues[self.host].lock();
        // Take the first message of this round; other tags stay queued in
        // order, so per-sender FIFO within a tag is preserved.
        let idx = q.iter().position(|m| m.tag == tag)?;
        let m = q.remove(idx).expect("position just found");
        Some((m.sender, m.payload))
    }

    fn phase(&self) -> u32 {
        self.inner.phases[self.host].load(Ordering::SeqCst)
    }

    fn increment_phase(&self) {
        self.inner.phases[self.host].fetch_add(1, Ordering::SeqCst);
    }
}
