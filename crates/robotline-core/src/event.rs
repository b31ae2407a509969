//! Typed line events with pre-allocated ring buffers.
//!
//! Events are emitted while a line advances and delivered in batch at the end
//! of the advance. Each event kind has its own [`EventBuffer`] ring buffer
//! with a configurable capacity; when full, the oldest event is dropped.
//!
//! Listeners are passive: they observe events (for logging, dashboards,
//! audit trails) and cannot change the simulation.
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which prevents
//! any allocation or recording for that kind.

use crate::fixed::Ticks;
use crate::id::PartId;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A line event. All events carry the simulated time at the end of the
/// advance in which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A part left the input backlog for the first stage's backlog.
    PartAdmitted { part: PartId, time: Ticks },
    /// A stage pulled a part from its backlog and began its cycle.
    WorkStarted {
        stage: usize,
        part: PartId,
        time: Ticks,
    },
    /// A stage finished its cycle on a part.
    WorkCompleted {
        stage: usize,
        part: PartId,
        time: Ticks,
    },
    /// A completed part moved into the next stage's backlog.
    PartHandedOff {
        from: usize,
        to: usize,
        part: PartId,
        time: Ticks,
    },
    /// A part left the last stage into the finished collection.
    PartFinished { part: PartId, time: Ticks },
    InspectionPassed {
        stage: usize,
        part: PartId,
        time: Ticks,
    },
    /// A quality gate scrapped the part; it is no longer tracked.
    InspectionFailed {
        stage: usize,
        part: PartId,
        time: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PartAdmitted,
    WorkStarted,
    WorkCompleted,
    PartHandedOff,
    PartFinished,
    InspectionPassed,
    InspectionFailed,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 7;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PartAdmitted { .. } => EventKind::PartAdmitted,
            Event::WorkStarted { .. } => EventKind::WorkStarted,
            Event::WorkCompleted { .. } => EventKind::WorkCompleted,
            Event::PartHandedOff { .. } => EventKind::PartHandedOff,
            Event::PartFinished { .. } => EventKind::PartFinished,
            Event::InspectionPassed { .. } => EventKind::InspectionPassed,
            Event::InspectionFailed { .. } => EventKind::InspectionFailed,
        }
    }

    pub fn part(&self) -> &PartId {
        match self {
            Event::PartAdmitted { part, .. }
            | Event::WorkStarted { part, .. }
            | Event::WorkCompleted { part, .. }
            | Event::PartHandedOff { part, .. }
            | Event::PartFinished { part, .. }
            | Event::InspectionPassed { part, .. }
            | Event::InspectionFailed { part, .. } => part,
        }
    }

    pub fn time(&self) -> Ticks {
        match self {
            Event::PartAdmitted { time, .. }
            | Event::WorkStarted { time, .. }
            | Event::WorkCompleted { time, .. }
            | Event::PartHandedOff { time, .. }
            | Event::PartFinished { time, .. }
            | Event::InspectionPassed { time, .. }
            | Event::InspectionFailed { time, .. } => *time,
        }
    }
}

impl EventKind {
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::PartAdmitted,
        EventKind::WorkStarted,
        EventKind::WorkCompleted,
        EventKind::PartHandedOff,
        EventKind::PartFinished,
        EventKind::InspectionPassed,
        EventKind::InspectionFailed,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
    dropped: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
            dropped: 0,
        }
    }

    /// Push an event. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        if self.len == self.capacity() {
            self.dropped += 1;
        } else {
            self.len += 1;
        }
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events overwritten because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Iterate over events from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        let start = (self.head + self.capacity() - self.len) % self.capacity();
        (0..self.len).filter_map(move |i| self.events[(start + i) % self.capacity()].as_ref())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Optional predicate that filters events for a listener.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

struct ListenerEntry {
    listener: PassiveListener,
    filter: Option<EventFilter>,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Holds one ring buffer per event kind, listener lists, and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<ListenerEntry>; EVENT_KIND_COUNT],
    default_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listener_counts: Vec<usize> = self.listeners.iter().map(Vec::len).collect();
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("listeners", &listener_counts)
            .field("default_capacity", &self.default_capacity)
            .finish()
    }
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            default_capacity,
        }
    }

    /// Suppress an event kind. Suppressed events are never allocated or buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Record an event. No-ops if its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Register a listener for an event kind. Listeners run in registration
    /// order during delivery.
    pub fn on(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_filtered(kind, None, listener);
    }

    /// Register a listener that only sees events accepted by `filter`.
    pub fn on_filtered(
        &mut self,
        kind: EventKind,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        self.listeners[kind.index()].push(ListenerEntry { listener, filter });
    }

    /// Deliver every buffered event to its listeners, oldest first, then
    /// clear the buffers.
    ///
    /// Kinds without listeners keep their events buffered so callers can
    /// read them with [`EventBus::buffer`] or [`EventBus::drain`].
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            if self.listeners[idx].is_empty() {
                continue;
            }
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }

            for event in buffer.iter() {
                for entry in &mut self.listeners[idx] {
                    if let Some(filter) = &entry.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    (entry.listener)(event);
                }
            }
            buffer.clear();
        }
    }

    /// Take every buffered event of a kind, oldest first.
    pub fn drain(&mut self, kind: EventKind) -> Vec<Event> {
        let Some(buffer) = self.buffers[kind.index()].as_mut() else {
            return Vec::new();
        };
        let events = buffer.iter().cloned().collect();
        buffer.clear();
        events
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, EventBuffer::len)
    }

    /// Total events ever emitted for a kind (including dropped).
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, EventBuffer::total_written)
    }

    /// Clear all buffers. Does not remove listeners or suppression settings.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
