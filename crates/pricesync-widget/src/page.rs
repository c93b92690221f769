//! # Page
//!
//! The in-memory stand-in for a browser page: it owns the document, the
//! activated widgets, their listeners, the highlight clock and the inbox of
//! remote calculation outcomes. Every method runs on the caller's thread.
//!
//! ## Activation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attach(node, overrides, hooks)                                         │
//! │                                                                         │
//! │  already bound? ──yes──► existing WidgetId                              │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  built-in ◄ page defaults ◄ data-* attributes ◄ caller overrides        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PriceSync::new (checks) ──Err──► warn!, document untouched             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  reserve slot, setup (markup, cache, first sync) ─► listeners, on_init  │
//! │       │                                                                 │
//! │       └──Err──► error!, document and clock restored, slot stays taken   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use pricesync_core::{ConfigOverrides, FieldRole};
//! use pricesync_widget::{Hooks, Page};
//!
//! let mut page = Page::new();
//! let doc = page.document_mut();
//! let input = doc.create_element_with("input", &[("id", "price"), ("type", "number")]);
//! let root = doc.root();
//! doc.append_child(root, input).unwrap();
//!
//! let overrides = ConfigOverrides { tax_rate: Some(0.2), ..Default::default() };
//! let widget = page.attach(input, &overrides, Hooks::new()).unwrap();
//!
//! page.input(input, "100").unwrap();
//! let tax = page.field(widget, FieldRole::Tax).unwrap();
//! assert_eq!(page.document().value(tax), "120.00");
//! ```

use std::collections::HashMap;
use std::fmt;

use pricesync_core::{ConfigOverrides, FieldRole, ResolvedTaxRate, WidgetConfig};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::dom::{Document, NodeId};
use crate::error::{WidgetError, WidgetResult};
use crate::events::{EventKind, ListenerAction, ListenerRegistry};
use crate::highlight::{HighlightScheduler, PendingTimer};
use crate::remote::{RemoteCalculator, RemoteDispatcher, RemoteOutcome};
use crate::sync::SyncContext;
use crate::widget::{Hooks, PriceSync};

/// Identifier of a widget on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WidgetId(usize);

impl WidgetId {
    pub const fn new(index: usize) -> Self {
        WidgetId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Also the namespace of the widget's listeners.
impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pricesync-{}", self.0)
    }
}

/// A document with price helpers attached to it.
#[derive(Debug, Default)]
pub struct Page {
    document: Document,
    widgets: Vec<Option<PriceSync>>,
    bound: HashMap<NodeId, WidgetId>,
    listeners: ListenerRegistry,
    timers: HighlightScheduler,
    remote: RemoteDispatcher,
    defaults: ConfigOverrides,
    http: Option<reqwest::Client>,
}

impl Page {
    /// Creates an empty page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty page whose widgets start from `defaults`.
    pub fn with_defaults(defaults: ConfigOverrides) -> Self {
        Page {
            defaults,
            ..Self::default()
        }
    }

    /// Wraps an existing document.
    pub fn from_document(document: Document) -> Self {
        Page {
            document,
            ..Self::default()
        }
    }

    pub fn defaults(&self) -> &ConfigOverrides {
        &self.defaults
    }

    pub fn set_defaults(&mut self, defaults: ConfigOverrides) {
        self.defaults = defaults;
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    // =========================================================================
    // Activation
    // =========================================================================

    /// Activates a price helper on `node`.
    ///
    /// Attaching to an element that already has a helper returns the
    /// existing id and changes nothing.
    pub fn attach(
        &mut self,
        node: NodeId,
        overrides: &ConfigOverrides,
        hooks: Hooks,
    ) -> WidgetResult<WidgetId> {
        if let Some(&id) = self.bound.get(&node) {
            debug!(widget = %id, %node, "element already has a price helper");
            return Ok(id);
        }

        let id = WidgetId(self.widgets.len());
        let widget = match self.prepare(id, node, overrides, hooks) {
            Ok(widget) => widget,
            Err(err) => {
                warn!(widget = %id, %node, error = %err, "price helper not initialized");
                return Err(err);
            }
        };

        self.activate(node, widget)
    }

    /// Activates a helper on every element matching `selector`.
    ///
    /// Elements that fail activation are logged and skipped.
    pub fn attach_all(
        &mut self,
        selector: &str,
        overrides: &ConfigOverrides,
    ) -> WidgetResult<Vec<WidgetId>> {
        let nodes = self.document.query_selector_all(selector)?;
        Ok(nodes
            .into_iter()
            .filter_map(|node| self.attach(node, overrides, Hooks::new()).ok())
            .collect())
    }

    /// Removes a widget's listeners. Its markup stays in place.
    pub fn detach(&mut self, id: WidgetId) -> WidgetResult<()> {
        let widget = self
            .widgets
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(WidgetError::UnknownWidget(id))?;

        let removed = self.listeners.unbind_namespace(&id.to_string());
        self.bound.remove(&widget.bound);
        info!(widget = %id, removed, "price helper detached");
        Ok(())
    }

    fn prepare(
        &mut self,
        id: WidgetId,
        node: NodeId,
        overrides: &ConfigOverrides,
        hooks: Hooks,
    ) -> WidgetResult<PriceSync> {
        if self.document.tag_name(node).is_none() {
            return Err(WidgetError::NotAnElement(node));
        }
        let data = ConfigOverrides::from_data_attributes(self.document.data_attributes(node))?;
        let config = WidgetConfig::layered([&self.defaults, &data, overrides]);

        let http = &mut self.http;
        PriceSync::new(id, config, hooks, &self.document, node, || shared_client(http))
    }

    /// Runs setup for a checked widget and registers it.
    ///
    /// The widget's slot is reserved first and stays taken even when setup
    /// fails, so the id is never handed out twice. A failed setup restores
    /// the document and the highlight clock.
    fn activate(&mut self, node: NodeId, mut widget: PriceSync) -> WidgetResult<WidgetId> {
        let id = widget.id;
        self.widgets.push(None);
        let snapshot = (self.document.clone(), self.timers.clone());

        let mut cx = SyncContext {
            document: &mut self.document,
            timers: &mut self.timers,
            remote: &mut self.remote,
        };
        if let Err(err) = widget.setup(&mut cx) {
            error!(widget = %id, %node, error = %err, "price helper setup failed");
            (self.document, self.timers) = snapshot;
            return Err(err);
        }

        self.bind_listeners(&widget);
        widget.notify_init();

        info!(
            widget = %id,
            %node,
            price_type = %widget.config.price_type,
            remote = widget.is_remote(),
            "price helper initialized"
        );
        let slot = self
            .widgets
            .get_mut(id.0)
            .ok_or(WidgetError::UnknownWidget(id))?;
        *slot = Some(widget);
        self.bound.insert(node, id);
        Ok(id)
    }

    fn bind_listeners(&mut self, widget: &PriceSync) {
        let namespace = widget.id.to_string();
        for (role, state) in widget.fields.iter() {
            let action = match role.price_kind() {
                Some(kind) => ListenerAction::PriceEdited(kind),
                None if role == FieldRole::TaxRate => ListenerAction::TaxRateEdited,
                None => continue,
            };
            for kind in EventKind::ALL {
                self.listeners
                    .bind(state.node, kind, &namespace, widget.id, action);
            }
        }
    }

    // =========================================================================
    // User Interaction
    // =========================================================================

    /// Fires `kind` on `node`; returns how many listeners ran.
    pub fn dispatch(&mut self, node: NodeId, kind: EventKind) -> WidgetResult<usize> {
        if self.document.tag_name(node).is_none() {
            return Err(WidgetError::NotAnElement(node));
        }

        let matched = self.listeners.matching(node, kind);
        for (id, action) in &matched {
            let Some(widget) = self.widgets.get_mut(id.0).and_then(Option::as_mut) else {
                continue;
            };
            debug!(widget = %id, %node, event = %kind, "dispatching");
            let mut cx = SyncContext {
                document: &mut self.document,
                timers: &mut self.timers,
                remote: &mut self.remote,
            };
            if let Err(err) = widget.handle(&mut cx, *action) {
                error!(widget = %id, %node, event = %kind, error = %err, "listener failed");
            }
        }
        Ok(matched.len())
    }

    /// Types `text` into an input: sets its value and fires `keyup`.
    pub fn input(&mut self, node: NodeId, text: &str) -> WidgetResult<usize> {
        self.document.set_value(node, text)?;
        self.dispatch(node, EventKind::KeyUp)
    }

    /// Sets an input's value and fires `change`.
    pub fn change(&mut self, node: NodeId, text: &str) -> WidgetResult<usize> {
        self.document.set_value(node, text)?;
        self.dispatch(node, EventKind::Change)
    }

    // =========================================================================
    // Highlight Clock
    // =========================================================================

    /// Moves the virtual clock forward; returns how many timers ran.
    pub fn advance_time(&mut self, delta_ms: u64) -> WidgetResult<usize> {
        self.timers.advance(&mut self.document, delta_ms)
    }

    /// Runs every pending timer.
    pub fn flush_timers(&mut self) -> WidgetResult<usize> {
        self.timers.flush(&mut self.document)
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        self.timers.pending()
    }

    pub fn now_ms(&self) -> u64 {
        self.timers.now_ms()
    }

    // =========================================================================
    // Remote Calculations
    // =========================================================================

    /// Applies every outcome delivered so far without waiting.
    pub fn apply_remote_responses(&mut self) -> usize {
        let outcomes = self.remote.drain();
        let count = outcomes.len();
        for outcome in outcomes {
            self.apply_outcome(outcome);
        }
        count
    }

    /// Waits for every in-flight request and applies the outcomes in
    /// arrival order.
    pub async fn settle(&mut self) -> usize {
        let mut count = 0;
        while let Some(outcome) = self.remote.next().await {
            self.apply_outcome(outcome);
            count += 1;
        }
        count
    }

    /// Requests whose outcome has not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.remote.in_flight()
    }

    fn apply_outcome(&mut self, outcome: RemoteOutcome) {
        let id = outcome.widget;
        let Some(widget) = self.widgets.get_mut(id.0).and_then(Option::as_mut) else {
            debug!(widget = %id, "remote response for a detached widget dropped");
            return;
        };
        let mut cx = SyncContext {
            document: &mut self.document,
            timers: &mut self.timers,
            remote: &mut self.remote,
        };
        if let Err(err) = widget.apply_remote(&mut cx, outcome) {
            error!(widget = %id, error = %err, "remote response not applied");
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn widget(&self, id: WidgetId) -> WidgetResult<&PriceSync> {
        self.widgets
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(WidgetError::UnknownWidget(id))
    }

    /// Widget bound to `node`, if any.
    pub fn widget_for(&self, node: NodeId) -> Option<WidgetId> {
        self.bound.get(&node).copied()
    }

    /// Number of active widgets.
    pub fn widget_count(&self) -> usize {
        self.widgets.iter().flatten().count()
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Node playing `role` in a widget.
    pub fn field(&self, id: WidgetId, role: FieldRole) -> Option<NodeId> {
        self.widget(id).ok()?.field(role)
    }

    /// Cached, unrounded value of a field.
    pub fn value(&self, id: WidgetId, role: FieldRole) -> Option<f64> {
        self.widget(id).ok()?.value(role)
    }

    /// Text currently shown in a field.
    pub fn display(&self, id: WidgetId, role: FieldRole) -> Option<&str> {
        let node = self.field(id, role)?;
        Some(self.document.value(node))
    }

    pub fn tax_rate(&self, id: WidgetId) -> WidgetResult<ResolvedTaxRate> {
        Ok(self.widget(id)?.tax_rate(&self.document))
    }

    pub fn tax_amount(&self, id: WidgetId) -> WidgetResult<Option<f64>> {
        Ok(self.widget(id)?.tax_amount())
    }

    /// Tax rate as the display shows it, e.g. `20.00% (default)`.
    pub fn display_tax_rate(&self, id: WidgetId) -> WidgetResult<String> {
        Ok(self.widget(id)?.tax_rate_text(&self.document))
    }
}

fn shared_client(slot: &mut Option<reqwest::Client>) -> WidgetResult<reqwest::Client> {
    if let Some(client) = slot {
        return Ok(client.clone());
    }
    let client = RemoteCalculator::default_client()?;
    *slot = Some(client.clone());
    Ok(client)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use httpmock::prelude::*;
    use pricesync_core::{PriceKind, TaxRateOrigin};

    use super::*;
    use crate::widget::FieldUpdate;

    /// `<label for="price">Price (EUR)</label><input id="price" ...>` in a form.
    fn price_page(attrs: &[(&str, &str)]) -> (Page, NodeId) {
        let mut page = Page::new();
        let doc = page.document_mut();
        let form = doc.create_element("form");
        let label = doc.create_element_with("label", &[("for", "price")]);
        let text = doc.create_text("Price (EUR)");
        let mut input_attrs = vec![("id", "price"), ("type", "number"), ("name", "price")];
        input_attrs.extend_from_slice(attrs);
        let input = doc.create_element_with("input", &input_attrs);

        let root = doc.root();
        doc.append_child(root, form).unwrap();
        doc.append_child(label, text).unwrap();
        doc.append_child(form, label).unwrap();
        doc.append_child(form, input).unwrap();
        (page, input)
    }

    fn rate(value: f64) -> ConfigOverrides {
        ConfigOverrides {
            tax_rate: Some(value),
            ..Default::default()
        }
    }

    #[test]
    fn test_notax_scenario() {
        let (mut page, input) = price_page(&[]);
        let widget = page.attach(input, &rate(0.2), Hooks::new()).unwrap();

        page.input(input, "100").unwrap();

        assert_eq!(page.display(widget, FieldRole::Tax), Some("120.00"));
        assert_eq!(page.display(widget, FieldRole::TaxAmount), Some("20.00"));
        assert_eq!(page.value(widget, FieldRole::NoTax), Some(100.0));
        assert!((page.value(widget, FieldRole::Tax).unwrap() - 120.0).abs() < 1e-9);
        assert_eq!(page.tax_amount(widget).unwrap().map(|v| v.round()), Some(20.0));
    }

    #[test]
    fn test_halfway_tax_amount_rounds_up() {
        let (mut page, input) = price_page(&[]);
        let widget = page.attach(input, &rate(0.2), Hooks::new()).unwrap();

        page.input(input, "0.625").unwrap();

        assert_eq!(page.display(widget, FieldRole::Tax), Some("0.75"));
        assert_eq!(page.tax_amount(widget).unwrap(), Some(0.125));
        assert_eq!(page.display(widget, FieldRole::TaxAmount), Some("0.13"));
    }

    #[test]
    fn test_tax_scenario_converts_back() {
        let (mut page, input) = price_page(&[("data-price-type", "tax")]);
        let widget = page.attach(input, &rate(0.2), Hooks::new()).unwrap();

        page.change(input, "120").unwrap();
        assert_eq!(page.display(widget, FieldRole::NoTax), Some("100.00"));

        // Editing the generated companion flows the other way.
        let companion = page.field(widget, FieldRole::NoTax).unwrap();
        page.input(companion, "50").unwrap();
        assert_eq!(page.document().value(input), "60.00");
    }

    #[test]
    fn test_clearing_source_empties_targets() {
        let (mut page, input) = price_page(&[("value", "100")]);
        let widget = page.attach(input, &rate(0.2), Hooks::new()).unwrap();
        assert_eq!(page.display(widget, FieldRole::Tax), Some("120.00"));

        page.input(input, "").unwrap();
        assert_eq!(page.display(widget, FieldRole::Tax), Some(""));
        assert_eq!(page.display(widget, FieldRole::TaxAmount), Some(""));
        assert_eq!(page.value(widget, FieldRole::Tax), None);

        page.input(input, "abc").unwrap();
        assert_eq!(page.display(widget, FieldRole::Tax), Some(""));
    }

    #[test]
    fn test_generated_markup() {
        let (mut page, input) = price_page(&[("required", ""), ("min", "0")]);
        let widget = page.attach(input, &rate(0.2), Hooks::new()).unwrap();
        let doc = page.document();

        let helper = doc.get_element_by_id("price_helper").unwrap();
        assert_eq!(page.field(widget, FieldRole::Tax), Some(helper));
        assert!(!doc.has_attribute(helper, "name"));
        assert!(!doc.has_attribute(helper, "required"));
        assert_eq!(doc.attribute(helper, "min"), Some("0"));

        let amount = doc.get_element_by_id("price_tax_amount").unwrap();
        assert_eq!(doc.attribute(amount, "type"), Some("text"));
        assert!(doc.has_attribute(amount, "readonly"));
        assert!(doc.has_attribute(amount, "disabled"));
        assert!(!doc.has_attribute(amount, "min"));

        let wrapper = doc.parent(input).unwrap();
        assert_eq!(doc.attribute(wrapper, "class"), Some("price price_notax"));
        assert!(doc.has_class(input, "price__input"));
        assert!(doc.has_class(doc.parent(helper).unwrap(), "price_tax"));

        let labels = doc.labels_for("price");
        assert_eq!(labels.len(), 2);
        assert_eq!(doc.text_content(labels[0]), "Price");
        assert_eq!(doc.text_content(labels[1]), "Pre-tax");

        let display = page.widget(widget).unwrap().tax_rate_display().unwrap();
        assert_eq!(doc.text_content(display), "20.00% (default)");
        let amount_label = doc.labels_for("price_tax_amount")[0];
        assert_eq!(doc.text_content(amount_label), "Tax20.00% (default)");
    }

    #[test]
    fn test_without_tax_amount() {
        let (mut page, input) = price_page(&[("data-display-tax-amount", "false")]);
        let widget = page.attach(input, &rate(0.2), Hooks::new()).unwrap();

        assert_eq!(page.field(widget, FieldRole::TaxAmount), None);
        assert!(page.document().get_element_by_id("price_tax_amount").is_none());
        page.input(input, "10").unwrap();
        assert_eq!(page.display(widget, FieldRole::Tax), Some("12.00"));
    }

    #[test]
    fn test_external_companion() {
        let (mut page, input) = price_page(&[]);
        let doc = page.document_mut();
        let other = doc.create_element_with("input", &[("id", "gross"), ("value", "240")]);
        let form = doc.parent(input).unwrap();
        doc.append_child(form, other).unwrap();
        let before = doc.children(form).len();

        let overrides = ConfigOverrides {
            other_price_input: Some("#gross".into()),
            tax_rate: Some(0.2),
            ..Default::default()
        };
        let widget = page.attach(input, &overrides, Hooks::new()).unwrap();

        // No markup, and the companion is recomputed from the empty main input.
        assert_eq!(page.document().children(form).len(), before);
        assert_eq!(page.field(widget, FieldRole::Tax), Some(other));
        assert_eq!(page.document().value(other), "");

        page.input(other, "240").unwrap();
        assert_eq!(page.document().value(input), "200.00");
        page.input(input, "10").unwrap();
        assert_eq!(page.document().value(other), "12.00");
        assert_eq!(page.field(widget, FieldRole::TaxAmount), None);
    }

    #[test]
    fn test_live_tax_rate_input() {
        let (mut page, input) = price_page(&[("value", "100")]);
        let doc = page.document_mut();
        let vat = doc.create_element_with("input", &[("id", "vat"), ("value", "20")]);
        let form = doc.parent(input).unwrap();
        doc.append_child(form, vat).unwrap();

        let overrides = ConfigOverrides {
            tax_rate_input: Some("#vat".into()),
            tax_rate_in_percent: Some(true),
            ..Default::default()
        };
        let widget = page.attach(input, &overrides, Hooks::new()).unwrap();

        assert!(page.document().has_class(page.document().parent(vat).unwrap(), "price_tax-rate"));
        assert_eq!(page.display_tax_rate(widget).unwrap(), "20.00%");
        assert_eq!(page.tax_rate(widget).unwrap().origin, TaxRateOrigin::Live);

        page.input(vat, "10").unwrap();
        let display = page.widget(widget).unwrap().tax_rate_display().unwrap();
        assert_eq!(page.document().text_content(display), "10.00%");
        assert_eq!(page.value(widget, FieldRole::TaxRate), Some(10.0));

        // Empty input without a fallback.
        page.input(vat, "").unwrap();
        assert_eq!(page.tax_rate(widget).unwrap().origin, TaxRateOrigin::Zero);
        assert_eq!(page.document().text_content(display), "0.00%");
    }

    #[test]
    fn test_percent_formula_asymmetry() {
        let (mut page, input) = price_page(&[]);
        let overrides = ConfigOverrides {
            tax_rate: Some(20.0),
            tax_rate_in_percent: Some(true),
            ..Default::default()
        };
        let widget = page.attach(input, &overrides, Hooks::new()).unwrap();

        page.input(input, "100").unwrap();
        assert_eq!(page.display(widget, FieldRole::Tax), Some("1200000.00"));
        assert_eq!(page.display_tax_rate(widget).unwrap(), "20.00% (default)");
    }

    #[test]
    fn test_validation_failure_leaves_document_untouched() {
        let (mut page, input) = price_page(&[]);
        let before = page.document().outer_html(page.document().root());

        let err = page.attach(input, &ConfigOverrides::new(), Hooks::new()).unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(page.document().outer_html(page.document().root()), before);
        assert!(page.listeners().is_empty());
        assert_eq!(page.widget_count(), 0);

        // Nothing was registered, so a corrected attempt goes through.
        assert!(page.attach(input, &rate(0.2), Hooks::new()).is_ok());
    }

    #[test]
    fn test_rejects_unsupported_elements() {
        let mut page = Page::new();
        let doc = page.document_mut();
        let select = doc.create_element("select");
        let checkbox = doc.create_element_with("input", &[("type", "checkbox")]);
        let root = doc.root();
        doc.append_child(root, select).unwrap();
        doc.append_child(root, checkbox).unwrap();

        for node in [select, checkbox] {
            let err = page.attach(node, &rate(0.2), Hooks::new()).unwrap_err();
            assert!(matches!(err, WidgetError::Validation(_)));
        }

        let bad_url = ConfigOverrides {
            url_calculate: Some("ftp://shop.example/calc".into()),
            ..rate(0.2)
        };
        let (mut page, input) = price_page(&[]);
        assert!(page.attach(input, &bad_url, Hooks::new()).is_err());
    }

    #[test]
    fn test_relative_endpoint_needs_page_url() {
        let relative = ConfigOverrides {
            url_calculate: Some("calc.php".into()),
            ..rate(0.2)
        };

        let (mut page, input) = price_page(&[]);
        let err = page.attach(input, &relative, Hooks::new()).unwrap_err();
        assert!(err.is_validation_error());

        let (mut page, input) = price_page(&[]);
        let url = url::Url::parse("https://shop.example/admin/product.html").unwrap();
        page.document_mut().set_url(url);
        let widget = page.attach(input, &relative, Hooks::new()).unwrap();

        let calculator = page.widget(widget).unwrap().calculator().unwrap();
        assert_eq!(calculator.endpoint().as_str(), "https://shop.example/admin/calc.php");
    }

    #[test]
    fn test_failed_setup_restores_document() {
        let (mut page, input) = price_page(&[]);
        let loose = page.document_mut().create_element("input");
        let before = page.document().outer_html(page.document().root());

        // A rate input outside the tree makes the builder fail halfway.
        let mut widget = page
            .prepare(WidgetId::new(0), input, &rate(0.2), Hooks::new())
            .unwrap();
        widget.fields.insert(FieldRole::TaxRate, loose);
        assert!(page.activate(input, widget).is_err());

        assert_eq!(page.document().outer_html(page.document().root()), before);
        assert!(page.listeners().is_empty());
        assert_eq!(page.widget_count(), 0);
        assert!(page.widget(WidgetId::new(0)).is_err());

        // The failed id stays reserved and the markup is built once.
        let widget = page.attach(input, &rate(0.2), Hooks::new()).unwrap();
        assert_eq!(widget, WidgetId::new(1));
        let helpers = page.document().query_selector_all("#price_helper").unwrap();
        assert_eq!(helpers.len(), 1);
    }

    #[test]
    fn test_zero_fallback_rate_is_accepted() {
        let (mut page, input) = price_page(&[]);
        let widget = page.attach(input, &rate(0.0), Hooks::new()).unwrap();
        page.input(input, "0").unwrap();
        assert_eq!(page.display(widget, FieldRole::Tax), Some("0.00"));
    }

    #[test]
    fn test_attach_is_idempotent() {
        let (mut page, input) = price_page(&[]);
        let first = page.attach(input, &rate(0.2), Hooks::new()).unwrap();
        let html = page.document().outer_html(page.document().root());
        let listeners = page.listeners().len();

        let second = page.attach(input, &rate(0.5), Hooks::new()).unwrap();
        assert_eq!(first, second);
        assert_eq!(page.document().outer_html(page.document().root()), html);
        assert_eq!(page.listeners().len(), listeners);
        assert_eq!(page.widget(first).unwrap().config().tax_rate, Some(0.2));
    }

    #[test]
    fn test_detach_removes_listeners() {
        let (mut page, input) = price_page(&[]);
        let widget = page.attach(input, &rate(0.2), Hooks::new()).unwrap();
        assert_eq!(page.listeners().len(), 4);

        page.detach(widget).unwrap();
        assert!(page.listeners().is_empty());
        assert_eq!(page.input(input, "100").unwrap(), 0);
        assert!(matches!(
            page.detach(widget),
            Err(WidgetError::UnknownWidget(_))
        ));
        assert_eq!(page.widget_for(input), None);
    }

    #[test]
    fn test_data_attributes_layering() {
        let mut page = Page::with_defaults(ConfigOverrides {
            tax_rate: Some(0.1),
            precision: Some(3),
            price_tax_label: Some("TTC".into()),
            ..Default::default()
        });
        let doc = page.document_mut();
        let input = doc.create_element_with(
            "input",
            &[("id", "p"), ("data-tax-rate", "0.2"), ("data-precision", "1")],
        );
        let root = doc.root();
        doc.append_child(root, input).unwrap();

        let caller = ConfigOverrides {
            precision: Some(0),
            ..Default::default()
        };
        let widget = page.attach(input, &caller, Hooks::new()).unwrap();
        let config = page.widget(widget).unwrap().config();
        assert_eq!(config.tax_rate, Some(0.2));
        assert_eq!(config.precision, 0);
        assert_eq!(config.labels.price_tax, "TTC");

        // The helper does not inherit the data attributes.
        let helper = page.field(widget, FieldRole::Tax).unwrap();
        assert!(page.document().data_attributes(helper).is_empty());
    }

    #[test]
    fn test_malformed_data_attribute_halts_activation() {
        let (mut page, input) = price_page(&[("data-precision", "many")]);
        let err = page.attach(input, &rate(0.2), Hooks::new()).unwrap_err();
        assert!(matches!(err, WidgetError::Config(_)));
        assert!(page.document().get_element_by_id("price_helper").is_none());
    }

    #[test]
    fn test_attach_all_skips_failures() {
        let mut page = Page::new();
        let doc = page.document_mut();
        let root = doc.root();
        for (id, kind) in [("a", "number"), ("b", "checkbox"), ("c", "text")] {
            let node = doc.create_element_with("input", &[("id", id), ("type", kind), ("class", "js-price")]);
            doc.append_child(root, node).unwrap();
        }

        let ids = page.attach_all(".js-price", &rate(0.2)).unwrap();
        assert_eq!(ids.len(), 2);
        assert!(page.document().get_element_by_id("a_helper").is_some());
        assert!(page.document().get_element_by_id("b_helper").is_none());
        assert_ne!(ids[0].to_string(), ids[1].to_string());

        assert!(page.attach_all("input:first", &rate(0.2)).is_err());
    }

    #[test]
    fn test_hooks() {
        let (mut page, input) = price_page(&[]);
        let inits = Rc::new(RefCell::new(Vec::new()));
        let updates: Rc<RefCell<Vec<FieldUpdate>>> = Rc::new(RefCell::new(Vec::new()));

        let hooks = Hooks::new()
            .on_init({
                let inits = Rc::clone(&inits);
                move |id| inits.borrow_mut().push(id)
            })
            .on_update({
                let updates = Rc::clone(&updates);
                move |update| updates.borrow_mut().push(*update)
            });
        let widget = page.attach(input, &rate(0.2), hooks).unwrap();
        assert_eq!(*inits.borrow(), vec![widget]);

        updates.borrow_mut().clear();
        page.input(input, "100").unwrap();
        let roles: Vec<FieldRole> = updates.borrow().iter().map(|u| u.role).collect();
        assert_eq!(roles, vec![FieldRole::Tax]);
        assert_eq!(updates.borrow()[0].value.map(f64::round), Some(120.0));
        assert_eq!(updates.borrow()[0].node, page.field(widget, FieldRole::Tax).unwrap());

        // Clearing still reports the price field, with no value.
        updates.borrow_mut().clear();
        page.input(input, "").unwrap();
        let roles: Vec<FieldRole> = updates.borrow().iter().map(|u| u.role).collect();
        assert_eq!(roles, vec![FieldRole::Tax]);
        assert_eq!(updates.borrow()[0].value, None);
    }

    #[test]
    fn test_highlight_follows_last_write() {
        let (mut page, input) = price_page(&[]);
        let widget = page.attach(input, &rate(0.2), Hooks::new()).unwrap();
        let helper = page.field(widget, FieldRole::Tax).unwrap();
        page.flush_timers().unwrap();
        assert!(!page.document().has_class(helper, "highlight"));

        page.input(input, "1").unwrap();
        assert!(page.document().has_class(helper, "highlight"));
        page.advance_time(400).unwrap();
        page.input(input, "2").unwrap();
        page.advance_time(400).unwrap();
        assert!(page.document().has_class(helper, "highlight"));

        page.advance_time(100).unwrap();
        assert!(!page.document().has_class(helper, "highlight"));
        assert!(page.pending_timers().is_empty());
    }

    #[test]
    fn test_outer_html_after_setup() {
        let mut page = Page::new();
        let doc = page.document_mut();
        let input = doc.create_element_with("input", &[("id", "p"), ("type", "text")]);
        let root = doc.root();
        doc.append_child(root, input).unwrap();
        let overrides = ConfigOverrides {
            display_tax_amount: Some(false),
            ..rate(0.2)
        };
        page.attach(input, &overrides, Hooks::new()).unwrap();
        page.flush_timers().unwrap();

        assert_eq!(
            page.document().outer_html(root),
            "<span class=\"price price_notax\">\
             <label for=\"p\" class=\"price__label\">Pre-tax</label>\
             <input id=\"p\" type=\"text\" class=\"price__input\">\
             </span>\
             <span class=\"price price_tax\">\
             <label for=\"p_helper\" class=\"price__label\">All taxes included</label>\
             <input id=\"p_helper\" type=\"text\" value class=\"price__input\">\
             </span>"
        );
    }

    // =========================================================================
    // Remote Calculation
    // =========================================================================

    fn remote(server: &MockServer, discard_stale: bool) -> ConfigOverrides {
        ConfigOverrides {
            url_calculate: Some(server.url("/calc")),
            discard_stale_responses: Some(discard_stale),
            ..rate(0.2)
        }
    }

    #[tokio::test]
    async fn test_remote_calculation() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/calc")
                .query_param("price", "100")
                .query_param("priceType", "notax")
                .query_param("taxRate", "0.2");
            then.status(200).body("120");
        });

        let (mut page, input) = price_page(&[]);
        let widget = page.attach(input, &remote(&server, false), Hooks::new()).unwrap();
        assert!(page.widget(widget).unwrap().is_remote());

        page.input(input, "100").unwrap();
        assert_eq!(page.in_flight(), 1);
        assert_eq!(page.display(widget, FieldRole::Tax), Some(""));

        assert_eq!(page.settle().await, 1);
        assert_eq!(page.display(widget, FieldRole::Tax), Some("120.00"));
        assert_eq!(page.display(widget, FieldRole::TaxAmount), Some("20.00"));
        mock.assert();
    }

    #[tokio::test]
    async fn test_remote_relative_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/shop/calc.php").query_param("price", "100");
            then.status(200).body("120");
        });

        let (mut page, input) = price_page(&[]);
        let url = url::Url::parse(&server.url("/shop/edit.html")).unwrap();
        page.document_mut().set_url(url);
        let overrides = ConfigOverrides {
            url_calculate: Some("calc.php".into()),
            ..rate(0.2)
        };
        let widget = page.attach(input, &overrides, Hooks::new()).unwrap();

        page.input(input, "100").unwrap();
        assert_eq!(page.settle().await, 1);
        assert_eq!(page.display(widget, FieldRole::Tax), Some("120.00"));
        mock.assert();
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_previous_value() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/calc").query_param("price", "100");
            then.status(200).body("120");
        });
        server.mock(|when, then| {
            when.method(GET).path("/calc").query_param("price", "5");
            then.status(500).body("boom");
        });

        let (mut page, input) = price_page(&[]);
        let widget = page.attach(input, &remote(&server, false), Hooks::new()).unwrap();

        page.input(input, "100").unwrap();
        page.settle().await;
        page.input(input, "5").unwrap();
        page.settle().await;

        assert_eq!(page.display(widget, FieldRole::Tax), Some("120.00"));
    }

    #[tokio::test]
    async fn test_remote_last_response_wins() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/calc").query_param("price", "100");
            then.status(200).body("120").delay(Duration::from_millis(300));
        });
        server.mock(|when, then| {
            when.method(GET).path("/calc").query_param("price", "200");
            then.status(200).body("240");
        });

        let (mut page, input) = price_page(&[]);
        let widget = page.attach(input, &remote(&server, false), Hooks::new()).unwrap();

        page.input(input, "100").unwrap();
        page.input(input, "200").unwrap();
        assert_eq!(page.settle().await, 2);

        // The slow response for the older edit arrived last and won.
        assert_eq!(page.display(widget, FieldRole::Tax), Some("120.00"));
        assert_eq!(page.value(widget, FieldRole::NoTax), Some(200.0));
    }

    #[tokio::test]
    async fn test_remote_stale_response_discarded() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/calc").query_param("price", "100");
            then.status(200).body("120").delay(Duration::from_millis(300));
        });
        server.mock(|when, then| {
            when.method(GET).path("/calc").query_param("price", "200");
            then.status(200).body("240");
        });

        let (mut page, input) = price_page(&[]);
        let widget = page.attach(input, &remote(&server, true), Hooks::new()).unwrap();

        page.input(input, "100").unwrap();
        page.input(input, "200").unwrap();
        assert_eq!(page.settle().await, 2);

        assert_eq!(page.display(widget, FieldRole::Tax), Some("240.00"));
    }

    #[test]
    fn test_remote_without_runtime_is_skipped() {
        let (mut page, input) = price_page(&[]);
        let overrides = ConfigOverrides {
            url_calculate: Some("http://127.0.0.1:9/calc".into()),
            ..rate(0.2)
        };
        let widget = page.attach(input, &overrides, Hooks::new()).unwrap();

        page.input(input, "100").unwrap();
        assert_eq!(page.in_flight(), 0);
        assert_eq!(page.apply_remote_responses(), 0);
        assert_eq!(page.display(widget, FieldRole::Tax), Some(""));
        assert_eq!(page.widget(widget).unwrap().config().price_type, PriceKind::NoTax);
    }
}
