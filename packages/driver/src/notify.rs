use crossbeam_channel::{Receiver, Sender};
use std::sync::Mutex;
use zmesh_core::notification::Notification;

pub type WatcherCallback = Box<dyn Fn(&Notification) + Send + Sync>;

/// The consumer-facing fan-out. Callbacks run on the driver thread at its
/// flush points and must not block; channel subscribers receive the same
/// stream for channel-oriented consumers and tests.
#[derive(Default)]
pub struct Watchers {
    callbacks: Mutex<Vec<WatcherCallback>>,
    subscribers: Mutex<Vec<Sender<Notification>>>,
}

impl Watchers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_watcher(&self, callback: WatcherCallback) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.push(callback);
        }
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub fn notify(&self, notification: &Notification) {
        if let Ok(callbacks) = self.callbacks.lock() {
            for callback in callbacks.iter() {
                callback(notification);
            }
        }
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(notification.clone()).is_ok());
        }
    }
}
