//! # PriceSync Demo
//!
//! Replays price edits against a widget and prints what the page shows.
//!
//! ## Usage
//! ```text
//! PRICESYNC_TAX_RATE=0.2 pricesync-demo 100 250.5
//!
//! edit "100"   → notax 100.00 | tax 120.00 | tax amount 20.00 | rate 20.00% (default)
//! edit "250.5" → notax 250.50 | tax 300.60 | tax amount 50.10 | rate 20.00% (default)
//! ```
//! `RUST_LOG` controls logging (default `info,pricesync=debug`).

mod config;

use pricesync_core::FieldRole;
use pricesync_widget::{Hooks, NodeId, Page, WidgetId};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::DemoConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = DemoConfig::load()?;
    let defaults = config.page_defaults()?;
    info!(edits = config.edits.len(), "Starting PriceSync demo");

    let mut page = Page::with_defaults(defaults);
    if let Some(url) = config.page_url.clone() {
        page.document_mut().set_url(url);
    }
    let input = build_form(&mut page)?;

    let widget = match page.attach(input, &config.overrides, Hooks::new()) {
        Ok(widget) => widget,
        Err(err) => {
            error!(error = %err, "widget could not be attached");
            return Err(err.into());
        }
    };

    for edit in &config.edits {
        page.input(input, edit)?;
        page.settle().await;
        println!("edit {:?} → {}", edit, summary(&page, widget)?);
    }

    page.flush_timers()?;
    println!();
    println!("{}", page.document().outer_html(page.document().root()));
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `info`: activation, detach
/// - `debug`: edits, syncs, remote requests
/// - `warn`/`error`: failed activation, failed remote calculation
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pricesync=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `<form><label for="price">Price</label><input id="price" type="number" name="price"></form>`
fn build_form(page: &mut Page) -> pricesync_widget::WidgetResult<NodeId> {
    let doc = page.document_mut();
    let form = doc.create_element("form");
    let label = doc.create_element_with("label", &[("for", "price")]);
    let text = doc.create_text("Price");
    let input = doc.create_element_with(
        "input",
        &[("id", "price"), ("type", "number"), ("name", "price"), ("step", "0.01")],
    );

    let root = doc.root();
    doc.append_child(root, form)?;
    doc.append_child(label, text)?;
    doc.append_child(form, label)?;
    doc.append_child(form, input)?;
    Ok(input)
}

fn summary(page: &Page, widget: WidgetId) -> pricesync_widget::WidgetResult<String> {
    let shown = |role| page.display(widget, role).unwrap_or("-").to_string();
    Ok(format!(
        "notax {} | tax {} | tax amount {} | rate {}",
        shown(FieldRole::NoTax),
        shown(FieldRole::Tax),
        shown(FieldRole::TaxAmount),
        page.display_tax_rate(widget)?
    ))
}
