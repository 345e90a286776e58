//! ControlClock - background thread driving control-rate work
//!
//! Ticks the shared [`StemController`] at the automation resolution
//! (matrix and effect automation, recording, buffer reclamation) and runs
//! pool maintenance whenever its interval has elapsed. The audio thread
//! never touches the controller mutex, so a slow tick here can only delay
//! automation, never the callback.

use super::controller::StemController;
use crate::config::EngineConfig;
use crate::events::{EngineEvent, EventBus, ServiceHandle};
use crossbeam::channel::{Receiver, RecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const SERVICE_NAME: &str = "ControlClock";

/// Commands accepted by the clock thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockCommand {
    /// Run pool maintenance now instead of waiting for the interval
    MaintainNow,
    Shutdown,
}

pub struct ControlClock {
    controller: Arc<Mutex<StemController>>,
    command_rx: Receiver<ClockCommand>,
    events: EventBus,
    interval: Duration,
}

impl ControlClock {
    /// Spawn the clock in a background thread
    pub fn spawn(
        controller: Arc<Mutex<StemController>>,
        config: &EngineConfig,
        events: EventBus,
    ) -> std::io::Result<ServiceHandle<ClockCommand>> {
        let (command_tx, command_rx) = crossbeam::channel::unbounded();
        let clock = ControlClock {
            controller,
            command_rx,
            events: events.clone(),
            interval: Duration::from_secs_f64(config.automation.tick_interval()),
        };

        let handle = thread::Builder::new()
            .name("control-clock".into())
            .spawn(move || clock.run())?;

        events.publish(EngineEvent::ServiceStarted {
            service_name: SERVICE_NAME.to_string(),
        });

        Ok(ServiceHandle {
            command_tx,
            thread_handle: Some(handle),
        })
    }

    fn run(self) {
        log::info!("ControlClock started ({:?} per tick)", self.interval);
        let origin = Instant::now();
        let ticker = crossbeam::channel::tick(self.interval);

        loop {
            crossbeam::select! {
                recv(self.command_rx) -> cmd => match cmd {
                    Ok(ClockCommand::Shutdown) | Err(RecvError) => {
                        log::info!("ControlClock shutting down");
                        break;
                    }
                    Ok(ClockCommand::MaintainNow) => {
                        let now = origin.elapsed().as_secs_f64();
                        if !self.with_controller(|c| {
                            c.maintain(now);
                        }) {
                            break;
                        }
                    }
                },
                recv(ticker) -> _ => {
                    let now = origin.elapsed().as_secs_f64();
                    if !self.with_controller(|c| {
                        c.control_tick(now);
                        c.maintain_if_due(now);
                    }) {
                        break;
                    }
                }
            }
        }

        self.events.publish(EngineEvent::ServiceStopped {
            service_name: SERVICE_NAME.to_string(),
        });
        log::info!("ControlClock stopped");
    }

    /// Run `f` under the controller lock; false if the lock is poisoned
    fn with_controller(&self, f: impl FnOnce(&mut StemController)) -> bool {
        match self.controller.lock() {
            Ok(mut controller) => {
                f(&mut controller);
                true
            }
            Err(_) => {
                log::error!("ControlClock: controller lock poisoned");
                false
            }
        }
    }
}
