//! Binding declaration parsing.
//!
//! Two surface syntaxes carry the same `name: expr, name: expr` list:
//!
//! ```text
//! <div data-bind="with: item, text: name"></div>
//! <!-- ko with: item --> ... <!-- /ko -->
//! ```

use lazy_static::lazy_static;
use regex::Regex;

use super::expression::Expression;
use crate::engine::BindError;

lazy_static! {
    static ref START_MARKER: Regex = Regex::new(r"^\s*ko(?:\s+([\s\S]+?))?\s*$").unwrap();
    static ref END_MARKER: Regex = Regex::new(r"^\s*/ko\s*$").unwrap();
}

/// One parsed `name: expr` pair.
#[derive(Clone, Debug)]
pub struct BindingDeclaration {
    pub name: String,
    pub expression: Expression,
}

/// Parse a binding list.
pub fn parse_bindings(source: &str) -> Result<Vec<BindingDeclaration>, BindError> {
    let syntax = |message: String| BindError::Syntax {
        source_text: source.to_string(),
        message,
    };

    let mut out = Vec::new();
    for pair in split_top_level(source).map_err(syntax)? {
        if pair.trim().is_empty() {
            continue;
        }
        let (name, expr) = pair
            .split_once(':')
            .ok_or_else(|| syntax(format!("expected `name: value` in `{}`", pair.trim())))?;
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
            return Err(syntax(format!("invalid binding name `{name}`")));
        }
        out.push(BindingDeclaration {
            name: name.to_string(),
            expression: Expression::parse(expr)?,
        });
    }
    Ok(out)
}

/// Split at commas that are outside brackets and quotes.
fn split_top_level(source: &str) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in source.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1).ok_or_else(|| format!("unbalanced `{c}`"))?;
            }
            ',' if depth == 0 => {
                parts.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated string".to_string());
    }
    if depth != 0 {
        return Err("unbalanced brackets".to_string());
    }
    parts.push(&source[start..]);
    Ok(parts)
}

/// The binding list of a `<!-- ko ... -->` comment, or `None` if the comment
/// is not a start marker. A bare `<!-- ko -->` yields an empty list.
pub fn start_marker_bindings(comment: &str) -> Option<&str> {
    START_MARKER
        .captures(comment)
        .map(|caps| caps.get(1).map_or("", |m| m.as_str()))
}

pub fn is_start_marker(comment: &str) -> bool {
    START_MARKER.is_match(comment)
}

pub fn is_end_marker(comment: &str) -> bool {
    END_MARKER.is_match(comment)
}
