//! Embedded page templates with typed placeholders.
//!
//! A template is static text with `__NAME__` placeholders. Every template
//! has its own vars type, so a page can only be rendered with the values
//! it declares.

use std::marker::PhantomData;

/// Values for the placeholders of one template.
pub trait TemplateVars {
    /// Placeholder name (without the surrounding `__`) → value.
    fn vars(&self) -> Vec<(&'static str, String)>;
}

#[derive(Debug, Clone, Copy)]
pub struct Template<V> {
    content: &'static str,
    _vars: PhantomData<fn(&V)>,
}

impl<V> Template<V> {
    pub const fn new(content: &'static str) -> Self {
        Self {
            content,
            _vars: PhantomData,
        }
    }
}

impl<V: TemplateVars> Template<V> {
    pub fn render(&self, vars: &V) -> String {
        fill(self.content, &vars.vars())
    }
}

/// Substitute placeholders in a single pass.
///
/// Inserted values are never scanned again, so a ledger path that happens
/// to contain `__ROWS__` stays as written. Unknown placeholders are kept.
fn fill(content: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("__") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let found = after.find("__").and_then(|end| {
            let name = &after[..end];
            vars.iter()
                .find(|(var, _)| *var == name)
                .map(|(_, value)| (value, end))
        });
        match found {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("__");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
