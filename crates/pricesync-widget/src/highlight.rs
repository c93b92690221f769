//! # Highlight Scheduler
//!
//! Flashes a class on a field after it was written and removes it later.
//! Time is virtual: nothing happens until the page advances its clock.
//!
//! ```text
//!  t=0    highlight(#price_helper)  → class added, removal due at 500
//!  t=300  highlight(#price_helper)  → earlier removal cancelled, due at 800
//!  t=500  advance(200)              → nothing due
//!  t=800  advance(300)              → class removed
//! ```

use serde::Serialize;
use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::error::WidgetResult;

/// A queued class removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTimer {
    pub id: u64,
    pub node: NodeId,
    pub class_name: String,
    pub due_at: u64,
}

/// Virtual clock plus the queue of class removals.
#[derive(Debug, Clone, Default)]
pub struct HighlightScheduler {
    now_ms: u64,
    next_id: u64,
    queue: Vec<PendingTimer>,
}

impl HighlightScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Adds `class_name` to `node` and schedules its removal in `duration_ms`.
    ///
    /// A removal already queued for the same node and class is cancelled, so
    /// the class stays until `duration_ms` after the last highlight.
    pub fn highlight(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        class_name: &str,
        duration_ms: u64,
    ) -> WidgetResult<()> {
        doc.add_class(node, class_name)?;

        self.queue
            .retain(|timer| !(timer.node == node && timer.class_name == class_name));

        self.next_id += 1;
        self.queue.push(PendingTimer {
            id: self.next_id,
            node,
            class_name: class_name.to_string(),
            due_at: self.now_ms.saturating_add(duration_ms),
        });
        Ok(())
    }

    /// Moves the clock forward and runs every removal that became due.
    /// Returns how many ran.
    pub fn advance(&mut self, doc: &mut Document, delta_ms: u64) -> WidgetResult<usize> {
        let from = self.now_ms;
        self.now_ms = self.now_ms.saturating_add(delta_ms);
        let ran = self.run_due(doc)?;
        debug!(from, to = self.now_ms, ran, "highlight clock advanced");
        Ok(ran)
    }

    /// Runs every queued removal, moving the clock to the last due time.
    pub fn flush(&mut self, doc: &mut Document) -> WidgetResult<usize> {
        if let Some(last) = self.queue.iter().map(|timer| timer.due_at).max() {
            self.now_ms = self.now_ms.max(last);
        }
        self.run_due(doc)
    }

    /// Snapshot of queued removals, soonest first.
    pub fn pending(&self) -> Vec<PendingTimer> {
        let mut timers = self.queue.clone();
        timers.sort_by_key(|timer| (timer.due_at, timer.id));
        timers
    }

    fn run_due(&mut self, doc: &mut Document) -> WidgetResult<usize> {
        let now = self.now_ms;
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|timer| timer.due_at <= now);
        self.queue = waiting;

        let mut due = due;
        due.sort_by_key(|timer| (timer.due_at, timer.id));
        for timer in &due {
            doc.remove_class(timer.node, &timer.class_name)?;
        }
        Ok(due.len())
    }
}
