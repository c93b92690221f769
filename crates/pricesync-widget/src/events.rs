//! # Event Listeners
//!
//! Namespaced `keyup`/`change` listeners, the way a page binds and unbinds
//! a plugin's handlers as one group.
//!
//! ```text
//!  node        event    namespace     widget   action
//!  #price      keyup    pricesync-0   0        PriceEdited(notax)
//!  #price      change   pricesync-0   0        PriceEdited(notax)
//!  #vat        keyup    pricesync-0   0        TaxRateEdited
//!  ...
//! ```

use std::fmt;

use pricesync_core::PriceKind;

use crate::dom::NodeId;
use crate::page::WidgetId;

/// Events the widget listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyUp,
    Change,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::KeyUp, EventKind::Change];

    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::KeyUp => "keyup",
            EventKind::Change => "change",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a listener does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    /// A price input changed: cache it and recompute the other price.
    PriceEdited(PriceKind),
    /// The tax rate input changed: recompute the tax-inclusive price.
    TaxRateEdited,
}

#[derive(Debug, Clone)]
struct Listener {
    node: NodeId,
    kind: EventKind,
    namespace: String,
    widget: WidgetId,
    action: ListenerAction,
}

/// Every listener bound on a page, in binding order.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    listeners: Vec<Listener>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(
        &mut self,
        node: NodeId,
        kind: EventKind,
        namespace: &str,
        widget: WidgetId,
        action: ListenerAction,
    ) {
        self.listeners.push(Listener {
            node,
            kind,
            namespace: namespace.to_string(),
            widget,
            action,
        });
    }

    /// Removes every listener of a namespace; returns how many were removed.
    pub fn unbind_namespace(&mut self, namespace: &str) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.namespace != namespace);
        before - self.listeners.len()
    }

    /// Listeners to run for an event, in binding order.
    pub fn matching(&self, node: NodeId, kind: EventKind) -> Vec<(WidgetId, ListenerAction)> {
        self.listeners
            .iter()
            .filter(|listener| listener.node == node && listener.kind == kind)
            .map(|listener| (listener.widget, listener.action))
            .collect()
    }

    /// Number of listeners bound on a node.
    pub fn count_on(&self, node: NodeId) -> usize {
        self.listeners.iter().filter(|l| l.node == node).count()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
