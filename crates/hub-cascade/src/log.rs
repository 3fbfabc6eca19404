// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The bounded cascade event log and its synchronous subscribers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

const MAX_LOG: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct CascadeEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub target: String,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

impl CascadeEvent {
    pub fn new(event_type: &str, source: impl Into<String>, target: impl Into<String>, details: Value) -> Self {
        Self {
            id: crate::new_id(),
            event_type: event_type.to_string(),
            source: source.into(),
            target: target.into(),
            details,
            timestamp: crate::clock_now(),
        }
    }
}

/// Receives cascade events as they're published. Failures to notify (e.g.
/// a closed channel behind a subscriber) are swallowed —
/// one subscriber's trouble must never block or fail another's delivery.
pub trait CascadeSubscriber: Send + Sync {
    fn notify(&self, event: &CascadeEvent);
}

impl<F> CascadeSubscriber for F
where
    F: Fn(&CascadeEvent) + Send + Sync,
{
    fn notify(&self, event: &CascadeEvent) {
        self(event);
    }
}

#[derive(Default)]
pub struct CascadeLog {
    events: VecDeque<CascadeEvent>,
    subscribers: Vec<Box<dyn CascadeSubscriber>>,
}

impl CascadeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn CascadeSubscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Append `event` and notify subscribers synchronously, in
    /// registration order.
    pub fn publish(&mut self, event: CascadeEvent) {
        if self.events.len() >= MAX_LOG {
            self.events.pop_front();
        }
        self.events.push_back(event.clone());
        for subscriber in &self.subscribers {
            subscriber.notify(&event);
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<&CascadeEvent> {
        self.events.iter().rev().take(limit).collect()
    }

    pub fn last(&self) -> Option<&CascadeEvent> {
        self.events.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn log_caps_at_one_hundred() {
        let mut log = CascadeLog::new();
        for i in 0..150 {
            log.publish(CascadeEvent::new(
                "tick",
                "test",
                "test",
                serde_json::json!({"i": i}),
            ));
        }
        assert_eq!(log.recent(1000).len(), MAX_LOG);
    }

    #[test]
    fn subscribers_are_notified_in_order() {
        let mut log = CascadeLog::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        log.subscribe(Box::new(move |_e: &CascadeEvent| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        log.publish(CascadeEvent::new("x", "a", "b", Value::Null));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
