//! One-shot per-message-type subscriber registry.
//!
//! Each command gets its own list of handlers that fire exactly once: a
//! caller interested in continuing delivery re-subscribes from inside its
//! own handler. `subscribe_raw` bypasses decoding entirely (useful for
//! commands this workspace has no schema for yet); `subscribe_stop` fires
//! once, when the channel transitions to `Stopped`.

use std::collections::HashMap;
use std::sync::Mutex;

use satoshi_wire::{FrameHeader, Message};

use crate::error::NetError;

/// A handler invoked once with the outcome of a single delivery.
pub type Handler<T> = Box<dyn FnOnce(Result<T, NetError>) + Send>;

/// A one-shot subscriber list for a single value type. Subscribing is
/// thread-safe; `notify` drains and invokes every registered handler,
/// clearing the list.
struct OneShot<T> {
    handlers: Mutex<Vec<Handler<T>>>,
}

impl<T> OneShot<T> {
    fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self, handler: Handler<T>) {
        self.handlers.lock().unwrap().push(handler);
    }

    fn notify(&self, result: Result<T, NetError>)
    where
        T: Clone,
    {
        let handlers = std::mem::take(&mut *self.handlers.lock().unwrap());
        for handler in handlers {
            handler(result.clone());
        }
    }

    fn drain_with(&self, err: NetError) {
        let handlers = std::mem::take(&mut *self.handlers.lock().unwrap());
        for handler in handlers {
            handler(Err(err.clone()));
        }
    }
}

/// The full set of subscriber lists a single channel maintains: one
/// one-shot list per command, plus the raw (undecoded) and stop lists.
pub struct ChannelSubscribers {
    typed: Mutex<HashMap<&'static str, OneShot<Message>>>,
    raw: OneShot<(FrameHeader, Vec<u8>)>,
    stop: OneShot<NetError>,
    /// Set once the channel stops; further `subscribe_*` calls short-circuit
    /// straight to the handler instead of queueing.
    stopped: Mutex<Option<NetError>>,
}

impl ChannelSubscribers {
    /// A fresh, empty registry.
    pub fn new() -> Self {
        Self {
            typed: Mutex::new(HashMap::new()),
            raw: OneShot::new(),
            stop: OneShot::new(),
            stopped: Mutex::new(None),
        }
    }

    /// Register a one-shot handler for `command`'s next decoded delivery.
    pub fn subscribe(&self, command: &'static str, handler: Handler<Message>) {
        if let Some(err) = self.stopped.lock().unwrap().clone() {
            handler(Err(err));
            return;
        }
        self.typed
            .lock()
            .unwrap()
            .entry(command)
            .or_insert_with(OneShot::new)
            .subscribe(handler);
    }

    /// Register a one-shot handler for the next frame, decoded or not.
    pub fn subscribe_raw(&self, handler: Handler<(FrameHeader, Vec<u8>)>) {
        if let Some(err) = self.stopped.lock().unwrap().clone() {
            handler(Err(err));
            return;
        }
        self.raw.subscribe(handler);
    }

    /// Register a one-shot handler for the channel's transition to `Stopped`.
    pub fn subscribe_stop(&self, handler: Handler<NetError>) {
        if let Some(err) = self.stopped.lock().unwrap().clone() {
            handler(Err(err));
            return;
        }
        self.stop.subscribe(handler);
    }

    /// Deliver a successfully decoded message to `command`'s subscribers.
    pub fn notify(&self, command: &'static str, message: Message) {
        if let Some(list) = self.typed.lock().unwrap().get(command) {
            list.notify(Ok(message));
        }
    }

    /// Deliver a frame's header and raw payload to the raw subscribers,
    /// regardless of whether its command was recognized.
    pub fn notify_raw(&self, header: FrameHeader, payload: Vec<u8>) {
        self.raw.notify(Ok((header, payload)));
    }

    /// Transition to stopped: flush every pending subscriber (typed and raw)
    /// with `service_stopped`, then fire the stop handlers with the actual
    /// cause. Idempotent — a second call is a no-op.
    pub fn fire_stop(&self, cause: NetError) {
        let mut stopped = self.stopped.lock().unwrap();
        if stopped.is_some() {
            return;
        }
        *stopped = Some(NetError::ServiceStopped);
        drop(stopped);

        for list in self.typed.lock().unwrap().values() {
            list.drain_with(NetError::ServiceStopped);
        }
        self.raw.drain_with(NetError::ServiceStopped);
        self.stop.notify(Ok(cause));
    }
}

impl Default for ChannelSubscribers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn typed_subscriber_fires_once() {
        let registry = ChannelSubscribers::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        registry.subscribe(
            "ping",
            Box::new(move |_| fired2.store(true, Ordering::SeqCst)),
        );
        registry.notify("ping", Message::VerAck);
        assert!(fired.load(Ordering::SeqCst));
        // Second delivery with nobody subscribed is simply dropped.
        registry.notify("ping", Message::VerAck);
    }

    #[test]
    fn stop_flushes_pending_subscribers_with_service_stopped() {
        let registry = ChannelSubscribers::new();
        let (tx, rx) = std::sync::mpsc::channel();
        registry.subscribe(
            "ping",
            Box::new(move |result| {
                tx.send(result).unwrap();
            }),
        );
        registry.fire_stop(NetError::ChannelTimeout);
        assert_eq!(rx.recv().unwrap(), Err(NetError::ServiceStopped));
    }

    #[test]
    fn subscribing_after_stop_fires_immediately() {
        let registry = ChannelSubscribers::new();
        registry.fire_stop(NetError::BadStream);
        let (tx, rx) = std::sync::mpsc::channel();
        registry.subscribe(
            "ping",
            Box::new(move |result| {
                tx.send(result).unwrap();
            }),
        );
        assert_eq!(rx.recv().unwrap(), Err(NetError::ServiceStopped));
    }
}
