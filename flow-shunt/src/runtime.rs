//! The shunt runtime: one `mio::Poll` watched by a single background
//! thread, shared by every socket and pipe shunt in the process.
//!
//! Registration (`Registry::register`) is thread-safe independent of the
//! poll loop, so only the sink table needs a lock; the `Poll`/`Events` pair
//! lives entirely inside the watcher thread and is never shared.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use mio::{Events, Interest, Poll, Token, Waker};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

const WAKE_TOKEN: Token = Token(usize::MAX);

/// Implemented by a shunt's shared, cross-thread-visible state so the
/// watcher thread can notify it without knowing its concrete type.
pub trait ReadinessSink: Send + Sync {
    fn on_readable(&self);
    fn on_writable(&self);
    fn on_closed(&self);
}

struct Shared {
    registry: mio::Registry,
    waker: Waker,
    next_token: AtomicUsize,
    sinks: Mutex<HashMap<Token, Arc<dyn ReadinessSink>>>,
}

/// Handle to the process-wide watcher thread and its readiness registry.
pub struct Runtime {
    shared: Arc<Shared>,
}

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

impl Runtime {
    /// Returns the single process-wide runtime, spawning the watcher thread
    /// on first use.
    pub fn global() -> &'static Runtime {
        RUNTIME.get_or_init(|| Runtime::start().expect("failed to start flow-shunt watcher thread"))
    }

    fn start() -> io::Result<Self> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;
        let shared = Arc::new(Shared {
            registry,
            waker,
            next_token: AtomicUsize::new(0),
            sinks: Mutex::new(HashMap::new()),
        });

        let watcher_shared = shared.clone();
        std::thread::Builder::new()
            .name("flow-shunt-watcher".into())
            .spawn(move || watch_loop(poll, watcher_shared))?;

        Ok(Self { shared })
    }

    /// Registers an I/O source and associates it with `sink`, returning the
    /// token the watcher thread will report readiness under.
    pub fn register(
        &self,
        source: &mut impl mio::event::Source,
        interest: Interest,
        sink: Arc<dyn ReadinessSink>,
    ) -> io::Result<Token> {
        let token = Token(self.shared.next_token.fetch_add(1, Ordering::Relaxed));
        self.shared.sinks.lock().insert(token, sink);
        if let Err(e) = self.shared.registry.register(source, token, interest) {
            self.shared.sinks.lock().remove(&token);
            return Err(e);
        }
        Ok(token)
    }

    pub fn reregister(&self, source: &mut impl mio::event::Source, token: Token, interest: Interest) -> io::Result<()> {
        self.shared.registry.reregister(source, token, interest)
    }

    pub fn deregister(&self, source: &mut impl mio::event::Source, token: Token) -> io::Result<()> {
        self.shared.sinks.lock().remove(&token);
        self.shared.registry.deregister(source)
    }

    /// Wakes the watcher thread immediately — used after registering a new
    /// source so it is picked up without waiting for the next natural
    /// readiness event (epoll/kqueue already handle this safely on their
    /// own, but the explicit wake keeps behavior uniform across platforms).
    pub fn wake(&self) {
        if let Err(e) = self.shared.waker.wake() {
            warn!(error = %e, "failed to wake flow-shunt watcher thread");
        }
    }
}

fn watch_loop(mut poll: Poll, shared: Arc<Shared>) {
    let mut events = Events::with_capacity(256);
    debug!("flow-shunt watcher thread started");
    loop {
        if let Err(e) = poll.poll(&mut events, Some(Duration::from_secs(1))) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            warn!(error = %e, "poll() failed in flow-shunt watcher thread");
            continue;
        }

        for event in events.iter() {
            if event.token() == WAKE_TOKEN {
                continue;
            }
            let sink = shared.sinks.lock().get(&event.token()).cloned();
            let Some(sink) = sink else {
                trace!(?event, "readiness event for an already-deregistered token");
                continue;
            };
            if event.is_readable() {
                sink.on_readable();
            }
            if event.is_writable() {
                sink.on_writable();
            }
            if event.is_read_closed() || event.is_write_closed() || event.is_error() {
                sink.on_closed();
            }
        }
    }
}
