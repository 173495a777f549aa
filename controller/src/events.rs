use std::sync::{Mutex, PoisonError};

use climate_common::ThermostatEvent;
use tokio::sync::mpsc;

pub type EventStream = mpsc::UnboundedReceiver<ThermostatEvent>;

#[derive(Debug, Default)]
pub struct EventBus {
    listeners: Mutex<Vec<mpsc::UnboundedSender<ThermostatEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: ThermostatEvent) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn complete(&self) {
        self.lock().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<ThermostatEvent>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
