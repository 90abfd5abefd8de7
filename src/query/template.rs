//! SQL templates with named placeholders.
//!
//! A template is SQL text containing `{name}` placeholders. `{{` and `}}`
//! stand for literal braces. Rendering fails if any placeholder has no value,
//! so a half-filled statement never reaches the warehouse.

use crate::config::ParamValue;
use crate::error::{AppError, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed SQL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    segments: Vec<Segment>,
}

impl SqlTemplate {
    /// Parses template text, rejecting unbalanced or malformed braces.
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(AppError::template(format!(
                            "unclosed '{{' at offset {pos}"
                        )));
                    }
                    if !is_identifier(&name) {
                        return Err(AppError::template(format!(
                            "malformed placeholder '{{{name}}}' at offset {pos}"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(AppError::template(format!(
                        "single '}}' at offset {pos}; write '}}}}' for a literal brace"
                    )));
                }
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Fills every placeholder from `params`.
    ///
    /// Extra parameters are ignored; missing ones are reported together.
    pub fn render(&self, params: &BTreeMap<String, ParamValue>) -> Result<String> {
        let missing: Vec<&str> = self
            .placeholders()
            .into_iter()
            .filter(|name| !params.contains_key(*name))
            .collect();

        if !missing.is_empty() {
            let list = missing
                .iter()
                .map(|name| format!("{{{name}}}"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AppError::template(format!("unresolved placeholders: {list}")));
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some(value) = params.get(name) {
                        out.push_str(&value.to_string());
                    }
                }
            }
        }
        Ok(out)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Replaces the statement's trailing `;` with `cond`.
///
/// Only the final terminator is replaced. A statement without one is an
/// error rather than a silent no-op.
pub fn apply_condition(sql: &str, cond: &str) -> Result<String> {
    let trimmed = sql.trim_end();
    match trimmed.strip_suffix(';') {
        Some(body) => Ok(format!("{body}{cond}")),
        None => Err(AppError::template(
            "cannot apply condition: statement has no trailing ';'",
        )),
    }
}

/// Builds the final statement text from a SQL file's contents.
///
/// Placeholders are only interpreted when parameters are supplied, so files
/// that are run without parameters may contain literal braces.
pub fn build_statement(
    text: &str,
    cond: Option<&str>,
    params: &BTreeMap<String, ParamValue>,
) -> Result<String> {
    let sql = if params.is_empty() {
        text.to_string()
    } else {
        SqlTemplate::parse(text)?.render(params)?
    };

    match cond {
        Some(cond) if !cond.is_empty() => apply_condition(&sql, cond),
        _ => Ok(sql),
    }
}
