//! Structured request events.
//!
//! A small publish mechanism: payloads are built under a category name and
//! handed synchronously to every subscriber registered for that name.

use crate::response::Response;
use chrono::{DateTime, Utc};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Category name of the event emitted once per observed response.
pub const REQUEST_EVENT: &str = "request.detailed";

/// Payload filled in by the emitter.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub method: Method,
    pub path: String,
    pub response: Option<Response>,
    pub data: Vec<serde_json::Value>,
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: String::new(),
            response: None,
            data: Vec::new(),
        }
    }
}

/// An emitted event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub emitted_at: DateTime<Utc>,
    pub payload: Payload,
}

/// Receives events for the categories it was subscribed to.
pub trait Subscriber: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> Subscriber for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

/// Event publisher.
#[derive(Default, Clone)]
pub struct Instrumenter {
    subscribers: Arc<RwLock<HashMap<String, Vec<Arc<dyn Subscriber>>>>>,
}

impl Instrumenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for one category name.
    pub fn subscribe(&self, name: impl Into<String>, subscriber: Arc<dyn Subscriber>) {
        let mut subscribers = match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.entry(name.into()).or_default().push(subscriber);
    }

    /// Build a payload with `fill` and deliver the resulting event to every
    /// subscriber of `name`. Returns the emitted event.
    pub fn instrument<F>(&self, name: &str, fill: F) -> Event
    where
        F: FnOnce(&mut Payload),
    {
        let mut payload = Payload::default();
        fill(&mut payload);

        let event = Event {
            name: name.to_string(),
            emitted_at: Utc::now(),
            payload,
        };

        // Clone the list so subscribers may subscribe from inside a callback.
        let targets = {
            let subscribers = match self.subscribers.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            subscribers.get(name).cloned().unwrap_or_default()
        };

        for subscriber in targets {
            subscriber.on_event(&event);
        }

        event
    }
}
