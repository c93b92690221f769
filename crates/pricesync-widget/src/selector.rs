//! # Selectors
//!
//! The subset of CSS selectors the widget options need to address inputs:
//! type, universal, `#id`, `.class`, `[attr]` and `[attr=value]` compounds,
//! descendant chains and comma-separated groups.
//!
//! ```text
//! "form input.price[type=number], #vat"
//!   group 0: [form] ␣ [input .price [type=number]]
//!   group 1: [#vat]
//! ```

use crate::dom::{Document, NodeId};
use crate::error::{WidgetError, WidgetResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
}

/// One compound selector such as `input.price[type=number]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SelectorStep {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

impl SelectorStep {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && !self.universal
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag_name) = doc.tag_name(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if !tag.eq_ignore_ascii_case(tag_name) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if doc.attribute(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|class_name| doc.has_class(node, class_name)) {
            return false;
        }
        self.attrs.iter().all(|cond| match cond {
            AttrCondition::Exists { key } => doc.has_attribute(node, key),
            AttrCondition::Eq { key, value } => doc.attribute(node, key) == Some(value.as_str()),
        })
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    /// Each group is a descendant chain, outermost step first.
    groups: Vec<Vec<SelectorStep>>,
}

impl SelectorList {
    /// Parses a selector list.
    pub fn parse(selector: &str) -> WidgetResult<Self> {
        let mut groups = Vec::new();
        for group in split_groups(selector)? {
            let chain = tokenize(&group, selector)?
                .iter()
                .map(|part| parse_step(part, selector))
                .collect::<WidgetResult<Vec<_>>>()?;
            if chain.is_empty() {
                return Err(unsupported(selector, "empty selector"));
            }
            groups.push(chain);
        }
        if groups.is_empty() {
            return Err(unsupported(selector, "empty selector"));
        }
        Ok(SelectorList { groups })
    }

    /// Returns true when the node matches any group.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.groups
            .iter()
            .any(|chain| chain_matches(doc, node, chain))
    }
}

fn chain_matches(doc: &Document, node: NodeId, chain: &[SelectorStep]) -> bool {
    let Some((last, ancestors)) = chain.split_last() else {
        return false;
    };
    if !last.matches(doc, node) {
        return false;
    }

    // Greedy ancestor walk is exact for descendant-only chains.
    let mut remaining = ancestors;
    let mut current = doc.parent(node);
    while let Some((step, rest)) = remaining.split_last() {
        loop {
            let Some(candidate) = current else {
                return false;
            };
            current = doc.parent(candidate);
            if step.matches(doc, candidate) {
                break;
            }
        }
        remaining = rest;
    }
    true
}

fn unsupported(selector: &str, reason: &str) -> WidgetError {
    WidgetError::InvalidSelector {
        selector: selector.to_string(),
        reason: reason.to_string(),
    }
}

/// Splits on top-level commas, ignoring commas inside quoted attribute values.
fn split_groups(selector: &str) -> WidgetResult<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut bracket = 0usize;

    for ch in selector.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[') => bracket += 1,
            (None, ']') => bracket = bracket.saturating_sub(1),
            (None, ',') if bracket == 0 => {
                groups.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if quote.is_some() || bracket != 0 {
        return Err(unsupported(selector, "unterminated attribute selector"));
    }
    groups.push(current);

    if groups.iter().any(|group| group.trim().is_empty()) {
        return Err(unsupported(selector, "empty selector group"));
    }
    Ok(groups)
}

/// Splits a group into compound parts on whitespace outside brackets.
fn tokenize(group: &str, selector: &str) -> WidgetResult<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut bracket = 0usize;

    for ch in group.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[') => bracket += 1,
            (None, ']') => bracket = bracket.saturating_sub(1),
            (None, '>' | '+' | '~') if bracket == 0 => {
                return Err(unsupported(selector, "only descendant combinators are supported"));
            }
            (None, c) if c.is_whitespace() && bracket == 0 => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    Ok(parts)
}

fn parse_step(part: &str, selector: &str) -> WidgetResult<SelectorStep> {
    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut step = SelectorStep::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if step.universal || step.tag.is_some() {
                    return Err(unsupported(selector, "misplaced `*`"));
                }
                step.universal = true;
                i += 1;
            }
            b'#' => {
                let (id, next) = parse_ident(part, i + 1)
                    .ok_or_else(|| unsupported(selector, "expected an id after `#`"))?;
                if step.id.replace(id).is_some() {
                    return Err(unsupported(selector, "more than one id"));
                }
                i = next;
            }
            b'.' => {
                let (class_name, next) = parse_ident(part, i + 1)
                    .ok_or_else(|| unsupported(selector, "expected a class after `.`"))?;
                step.classes.push(class_name);
                i = next;
            }
            b'[' => {
                let (cond, next) = parse_attr_condition(part, i, selector)?;
                step.attrs.push(cond);
                i = next;
            }
            b':' => return Err(unsupported(selector, "pseudo-classes are not supported")),
            _ => {
                if !step.is_empty() {
                    return Err(unsupported(selector, "type selector must come first"));
                }
                let (tag, next) = parse_ident(part, i)
                    .ok_or_else(|| unsupported(selector, "unexpected character"))?;
                step.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
        }
    }

    if step.is_empty() {
        return Err(unsupported(selector, "empty compound selector"));
    }
    Ok(step)
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn parse_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    if start >= bytes.len() || !is_ident_char(bytes[start]) {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    Some((src.get(start..end)?.to_string(), end))
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn parse_attr_condition(
    src: &str,
    open_bracket: usize,
    selector: &str,
) -> WidgetResult<(AttrCondition, usize)> {
    let bytes = src.as_bytes();
    let mut i = skip_whitespace(bytes, open_bracket + 1);

    let key_start = i;
    while i < bytes.len() && (is_ident_char(bytes[i]) || bytes[i] == b':') {
        i += 1;
    }
    if key_start == i {
        return Err(unsupported(selector, "expected an attribute name"));
    }
    let key = src[key_start..i].to_ascii_lowercase();

    i = skip_whitespace(bytes, i);
    match bytes.get(i) {
        Some(b']') => return Ok((AttrCondition::Exists { key }, i + 1)),
        Some(b'=') => i += 1,
        _ => return Err(unsupported(selector, "only `[attr]` and `[attr=value]` are supported")),
    }

    i = skip_whitespace(bytes, i);
    let value = match bytes.get(i) {
        Some(&quote @ (b'"' | b'\'')) => {
            let start = i + 1;
            let len = src[start..]
                .bytes()
                .position(|b| b == quote)
                .ok_or_else(|| unsupported(selector, "unterminated attribute value"))?;
            i = start + len + 1;
            src[start..start + len].to_string()
        }
        _ => {
            let start = i;
            while i < bytes.len() && bytes[i] != b']' && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            src[start..i].to_string()
        }
    };

    i = skip_whitespace(bytes, i);
    if bytes.get(i) != Some(&b']') {
        return Err(unsupported(selector, "expected `]`"));
    }
    Ok((AttrCondition::Eq { key, value }, i + 1))
}
