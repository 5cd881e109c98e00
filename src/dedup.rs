//! Memory of content fragments already used, so a headline (or a mention id)
//! is not acted on twice.
//!
//! Keys are compared after whitespace collapsing and case folding. With a
//! capacity the set behaves as an LRU: re-marking an entry refreshes it, and
//! the least recently marked entry is dropped first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenHeadline {
    pub text: String,
    pub first_seen: DateTime<Utc>,
}

pub struct DedupTracker {
    inner: Mutex<Inner>,
    capacity: Option<usize>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct Inner {
    seen: HashMap<String, SeenHeadline>,
    /// Keys from least to most recently marked.
    order: VecDeque<String>,
}

fn dedup_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl DedupTracker {
    /// Unbounded tracker on the system clock.
    pub fn unbounded() -> Self {
        Self::new(None, Arc::new(SystemClock))
    }

    /// `capacity` of `Some(0)` is treated as unbounded.
    pub fn new(capacity: Option<usize>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.filter(|c| *c > 0),
            clock,
        }
    }

    pub fn is_new(&self, text: &str) -> bool {
        let g = self.inner.lock().expect("dedup mutex poisoned");
        !g.seen.contains_key(&dedup_key(text))
    }

    /// Idempotent: marking twice keeps the first `first_seen`.
    pub fn mark_seen(&self, text: &str) {
        let key = dedup_key(text);
        if key.is_empty() {
            return;
        }
        let now = self.clock.now();
        let mut g = self.inner.lock().expect("dedup mutex poisoned");
        if g.seen.contains_key(&key) {
            if let Some(pos) = g.order.iter().position(|k| k == &key) {
                g.order.remove(pos);
            }
        } else {
            g.seen.insert(
                key.clone(),
                SeenHeadline {
                    text: text.trim().to_string(),
                    first_seen: now,
                },
            );
        }
        g.order.push_back(key);

        if let Some(cap) = self.capacity {
            while g.order.len() > cap {
                if let Some(old) = g.order.pop_front() {
                    g.seen.remove(&old);
                }
            }
        }
    }

    /// Items not seen before, in input order, without duplicates inside the
    /// batch itself. Nothing is marked.
    pub fn retain_new<S: AsRef<str>>(&self, items: &[S]) -> Vec<String> {
        let g = self.inner.lock().expect("dedup mutex poisoned");
        let mut batch = HashSet::new();
        let mut out = Vec::new();
        let mut dropped = 0u64;
        for it in items {
            let text = it.as_ref();
            let key = dedup_key(text);
            if key.is_empty() || g.seen.contains_key(&key) || !batch.insert(key) {
                dropped += 1;
                continue;
            }
            out.push(text.to_string());
        }
        counter!("dedup_skipped_total").increment(dropped);
        out
    }

    pub fn get(&self, text: &str) -> Option<SeenHeadline> {
        let g = self.inner.lock().expect("dedup mutex poisoned");
        g.seen.get(&dedup_key(text)).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("dedup mutex poisoned").seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
