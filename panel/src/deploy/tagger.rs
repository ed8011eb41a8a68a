//! Image tag allocation

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::models::application::AppId;

/// Hands out `<app-id>:<timestamp>` tags.
///
/// Timestamps are unix seconds but never repeat within the process: a tag
/// requested in the same second as the previous one gets `last + 1`.
#[derive(Debug, Default)]
pub struct ImageTagger {
    last: AtomicI64,
}

impl ImageTagger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unique timestamp
    pub fn next_stamp(&self) -> i64 {
        self.next_stamp_at(Utc::now().timestamp())
    }

    fn next_stamp_at(&self, now: i64) -> i64 {
        let mut issued = now;
        // fetch_update only errs when the closure returns None
        let _ = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                issued = now.max(last + 1);
                Some(issued)
            });
        issued
    }

    /// Allocate a stamp and return `(tag, stamp)` for `app_id`
    pub fn next_tag(&self, app_id: AppId) -> (String, i64) {
        let stamp = self.next_stamp();
        (format_tag(app_id, stamp), stamp)
    }
}

pub fn format_tag(app_id: AppId, stamp: i64) -> String {
    format!("{}:{}", app_id, stamp)
}
