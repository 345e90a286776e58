//! Engine events and service plumbing
//!
//! State changes are published as typed [`EngineEvent`]s to every
//! subscriber's bounded crossbeam channel. Producers never block: a
//! subscriber that stops draining misses new events, with a warning.

use crate::buffer::BufferId;
use crate::types::StemKind;
use crossbeam::channel::{Receiver, SendError, Sender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default event bus capacity
pub const EVENT_BUS_CAPACITY: usize = 1024;

/// Events broadcast by the controller and its services
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StemLoaded {
        kind: StemKind,
        buffer_id: BufferId,
        frames: usize,
    },
    StemUnloaded {
        kind: StemKind,
    },
    /// The pool refused a stem; the caller should skip it or free others
    AllocationFailed {
        kind: StemKind,
        requested_bytes: usize,
    },
    PresetApplied {
        name: String,
        reconnected: bool,
    },
    EffectPresetApplied {
        stem: StemKind,
        name: String,
        rebuilt: bool,
    },
    RecordingFinished {
        cells_with_keyframes: usize,
    },
    PoolMaintenance {
        destroyed: usize,
        defragmented: usize,
    },
    /// A command to the audio thread was dropped
    CommandQueueFull,
    ServiceStarted {
        service_name: String,
    },
    ServiceStopped {
        service_name: String,
    },
}

/// Non-blocking fan-out of engine events
///
/// Every subscriber gets its own bounded channel and sees every event
/// published after it subscribed. Clones share the subscriber list.
#[derive(Clone)]
pub struct EventBus {
    capacity: usize,
    subscribers: Arc<Mutex<Vec<Sender<EngineEvent>>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Sender<EngineEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// New receiver holding up to `capacity` undrained events
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (sender, receiver) = crossbeam::channel::bounded(self.capacity);
        self.lock().push(sender);
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Publish without blocking
    ///
    /// Returns false if any subscriber's channel was full and missed the
    /// event. Subscribers whose receiver is gone are dropped.
    pub fn publish(&self, event: EngineEvent) -> bool {
        let mut delivered = true;
        self.lock().retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("EventBus subscriber full, dropping {:?}", event);
                delivered = false;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        delivered
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}

/// Handle to a background service thread
pub struct ServiceHandle<Cmd> {
    pub command_tx: Sender<Cmd>,
    pub thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl<Cmd> ServiceHandle<Cmd> {
    pub fn send(&self, cmd: Cmd) -> Result<(), SendError<Cmd>> {
        self.command_tx.send(cmd)
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the service thread to exit
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Service thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_receive() {
        let bus = EventBus::new(4);
        let rx = bus.subscribe();
        assert!(bus.publish(EngineEvent::StemUnloaded { kind: StemKind::Bass }));
        assert_eq!(rx.recv().unwrap(), EngineEvent::StemUnloaded { kind: StemKind::Bass });
    }

    #[test]
    fn test_every_subscriber_sees_every_event() {
        let bus = EventBus::new(8);
        let first = bus.subscribe();
        let second = bus.clone().subscribe();
        for kind in StemKind::ALL {
            bus.publish(EngineEvent::StemUnloaded { kind });
        }
        assert_eq!(first.try_iter().count(), StemKind::ALL.len());
        assert_eq!(second.try_iter().count(), StemKind::ALL.len());
    }

    #[test]
    fn test_full_subscriber_drops_instead_of_blocking() {
        let bus = EventBus::new(2);
        let rx = bus.subscribe();
        assert!(bus.publish(EngineEvent::CommandQueueFull));
        assert!(bus.publish(EngineEvent::CommandQueueFull));
        assert!(!bus.publish(EngineEvent::CommandQueueFull));
        assert_eq!(rx.try_iter().count(), 2);
        assert!(bus.publish(EngineEvent::CommandQueueFull));
    }

    #[test]
    fn test_closed_subscribers_are_pruned() {
        let bus = EventBus::new(2);
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);
        assert!(bus.publish(EngineEvent::CommandQueueFull));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_iter().count(), 1);
    }
}
