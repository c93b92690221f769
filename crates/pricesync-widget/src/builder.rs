//! # Markup Builder
//!
//! Generates the companion inputs when the page only has one price input.
//!
//! ## Generated Markup
//! ```text
//! before                         after (priceType = notax)
//! ──────                         ─────────────────────────
//! <label for="price">            <label for="price">Price</label>
//!   Price (EUR)</label>          <span class="price price_notax">
//! <input id="price"                <label for="price" class="price__label">Pre-tax</label>
//!   type="number"                  <input id="price" class="price__input" ...>
//!   name="price">                </span>
//!                                <span class="price price_tax">
//!                                  <label for="price_helper" ...>All taxes included</label>
//!                                  <input id="price_helper" class="price__input" value="">
//!                                </span>
//!                                <span class="price price_tax-amount">
//!                                  <label for="price_tax_amount" ...>Tax
//!                                    <span class="price__tax-rate">20.00% (default)</span>
//!                                  </label>
//!                                  <input id="price_tax_amount" type="text" disabled readonly>
//!                                </span>
//! ```
//! The companion is a copy of the bound input that is not meant to be
//! submitted, hence no `name` and no `required`.

use pricesync_core::FieldRole;

use crate::dom::{Document, NodeId};
use crate::error::WidgetResult;
use crate::widget::PriceSync;

impl PriceSync {
    pub(crate) fn build_markup(&mut self, doc: &mut Document) -> WidgetResult<()> {
        let bound = self.bound;
        let kind = self.config.price_type;
        let other = kind.other();

        let base_id = match doc.attribute(bound, "id") {
            Some(id) => id.to_string(),
            None => {
                let id = self.id.to_string();
                doc.set_attribute(bound, "id", &id)?;
                id
            }
        };
        // Looked up before our own labels point at the same id.
        let main_label = doc.labels_for(&base_id).into_iter().next();

        let companion = doc.clone_node(bound)?;
        doc.set_attribute(companion, "value", "")?;
        strip_attributes(doc, companion, &["name", "required"])?;
        strip_data_attributes(doc, companion)?;
        doc.set_attribute(companion, "id", &format!("{base_id}_helper"))?;
        doc.insert_after(bound, companion)?;
        self.fields.insert(other.into(), companion);

        let tax_amount = if self.config.display_tax_amount {
            let node = doc.clone_node(companion)?;
            strip_attributes(doc, node, &["min", "max", "step"])?;
            doc.set_attribute(node, "type", "text")?;
            doc.set_attribute(node, "disabled", "")?;
            doc.set_attribute(node, "readonly", "")?;
            doc.set_attribute(node, "id", &format!("{base_id}_tax_amount"))?;
            doc.insert_after(companion, node)?;
            self.fields.insert(FieldRole::TaxAmount, node);
            Some(node)
        } else {
            None
        };

        let classes = &self.config.classes;
        let labels = &self.config.labels;

        wrap_field(
            doc,
            bound,
            &classes.input,
            self.config.price_class(kind),
            Some((self.config.price_label(kind), classes.label.as_str())),
        )?;
        if let Some(rate_input) = self.fields.node(FieldRole::TaxRate) {
            wrap_field(doc, rate_input, &classes.input, &classes.tax_rate, None)?;
        }
        wrap_field(
            doc,
            companion,
            &classes.input,
            self.config.price_class(other),
            Some((self.config.price_label(other), classes.label.as_str())),
        )?;

        if let Some(node) = tax_amount {
            let label = wrap_field(
                doc,
                node,
                &classes.input,
                &classes.tax_amount,
                Some((labels.tax_amount.as_str(), classes.label.as_str())),
            )?;
            if let Some(label) = label {
                let display = doc.create_element("span");
                doc.add_class(display, &classes.tax_rate_display)?;
                doc.append_child(label, display)?;
                self.tax_rate_display = Some(display);
            }
        }

        if let Some(label) = main_label {
            if !labels.main.is_empty() {
                doc.replace_first_text(label, &labels.main)?;
            }
        }

        self.refresh_tax_rate_display(doc)
    }
}

/// Wraps an input in a classed `<span>` and puts a label before it.
/// Returns the label, if one was created.
fn wrap_field(
    doc: &mut Document,
    input: NodeId,
    input_class: &str,
    wrapper_class: &str,
    label: Option<(&str, &str)>,
) -> WidgetResult<Option<NodeId>> {
    doc.add_class(input, input_class)?;
    let wrapper = doc.create_element("span");
    doc.add_class(wrapper, wrapper_class)?;
    doc.wrap(input, wrapper)?;

    let Some((text, label_class)) = label.filter(|(text, _)| !text.is_empty()) else {
        return Ok(None);
    };

    let node = doc.create_element("label");
    if let Some(id) = doc.attribute(input, "id").map(ToOwned::to_owned) {
        doc.set_attribute(node, "for", &id)?;
    }
    doc.add_class(node, label_class)?;
    doc.set_text(node, text)?;
    doc.insert_before(input, node)?;
    Ok(Some(node))
}

fn strip_attributes(doc: &mut Document, node: NodeId, names: &[&str]) -> WidgetResult<()> {
    for name in names {
        doc.remove_attribute(node, name)?;
    }
    Ok(())
}

fn strip_data_attributes(doc: &mut Document, node: NodeId) -> WidgetResult<()> {
    let names: Vec<String> = doc
        .data_attributes(node)
        .into_iter()
        .map(|(name, _)| name.to_string())
        .collect();
    for name in names {
        doc.remove_attribute(node, &name)?;
    }
    Ok(())
}
