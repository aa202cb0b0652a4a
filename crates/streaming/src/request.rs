use foundation::ids::Generation;
use tracing::debug;

/// Identifies one in-flight request of a [`FetchStream`].
///
/// A small copyable value captured before the request suspends and checked
/// again after it resumes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub stream: &'static str,
    pub generation: Generation,
}

/// Latest-issued-wins guard for one independent stream of fetches.
///
/// `begin` bumps the generation synchronously, before any I/O starts. A result
/// may only touch UI state if its ticket is still current when it arrives;
/// older tickets are dropped whole, errors included. Streams never share a
/// counter, so a slow stats query cannot invalidate a viewport fetch.
#[derive(Debug, Clone)]
pub struct FetchStream {
    name: &'static str,
    current: Generation,
    issued: u64,
    dropped: u64,
}

impl FetchStream {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            current: Generation::ZERO,
            issued: 0,
            dropped: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn current(&self) -> Generation {
        self.current
    }

    pub fn begin(&mut self) -> Ticket {
        self.current = self.current.next();
        self.issued += 1;
        Ticket {
            stream: self.name,
            generation: self.current,
        }
    }

    /// Supersedes every in-flight ticket without issuing a new request.
    pub fn invalidate(&mut self) {
        self.current = self.current.next();
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.stream == self.name && ticket.generation == self.current
    }

    /// Hands `value` back only if `ticket` is still current.
    pub fn settle<T>(&mut self, ticket: Ticket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            return Some(value);
        }
        self.dropped += 1;
        debug!(
            stream = self.name,
            stale = %ticket.generation,
            current = %self.current,
            "dropping stale result"
        );
        None
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
