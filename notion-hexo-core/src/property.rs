//! Decoder for Notion's nested-array property values.
//!
//! A property is stored as rich text: an array of segments, each segment an
//! array of `[text, [attr, ...]?]`, each attribute an array of
//! `[code, argument?]`. For example a bold link is
//! `[["Rust", [["b"], ["a", "https://rust-lang.org"]]]]` and a date mention is
//! `[["‣", [["d", {"start_date": "2020-01-02"}]]]]`.
//!
//! The accessors walk a [`serde_json::Value`] and return a [`ShapeMismatch`]
//! naming the offending path instead of guessing.

use serde_json::{Map, Value};

/// The value did not have the shape the accessor expected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unexpected property shape at {path}: expected {expected}")]
pub struct ShapeMismatch {
    pub path: String,
    pub expected: &'static str,
}

/// Formatting attribute attached to an inline span.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineAttr {
    Bold,
    Italic,
    Strike,
    Code,
    Underline,
    Link(String),
    /// Mention of another page by raw id.
    Page(String),
    User(String),
    Date(DateMention),
    Color(String),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DateMention {
    pub start_date: String,
    pub start_time: Option<String>,
}

impl DateMention {
    /// `start_date`, followed by `" " + start_time` when present.
    pub fn render(&self) -> String {
        match &self.start_time {
            Some(time) if !time.is_empty() => format!("{} {}", self.start_date, time),
            _ => self.start_date.clone(),
        }
    }
}

/// A run of text sharing one set of attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InlineSpan {
    pub text: String,
    pub attrs: Vec<InlineAttr>,
}

impl InlineSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attrs: Vec::new(),
        }
    }

    pub fn has(&self, attr: &InlineAttr) -> bool {
        self.attrs.iter().any(|a| a == attr)
    }

    pub fn link(&self) -> Option<&str> {
        self.attrs.iter().find_map(|a| match a {
            InlineAttr::Link(url) => Some(url.as_str()),
            _ => None,
        })
    }
}

/// Concatenate span texts, ignoring attributes.
pub fn plain_text(spans: &[InlineSpan]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

struct Cursor<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Cursor<'a> {
    fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: "$".to_string(),
        }
    }

    fn mismatch(&self, expected: &'static str) -> ShapeMismatch {
        ShapeMismatch {
            path: self.path.clone(),
            expected,
        }
    }

    fn array(&self) -> Result<Vec<Cursor<'a>>, ShapeMismatch> {
        let items = self.value.as_array().ok_or_else(|| self.mismatch("array"))?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(i, value)| Cursor {
                value,
                path: format!("{}[{}]", self.path, i),
            })
            .collect())
    }

    fn str(&self) -> Result<&'a str, ShapeMismatch> {
        self.value.as_str().ok_or_else(|| self.mismatch("string"))
    }

    fn object(&self) -> Result<&'a Map<String, Value>, ShapeMismatch> {
        self.value.as_object().ok_or_else(|| self.mismatch("object"))
    }
}

/// Decode a full rich-text value into spans.
pub fn rich_text(value: &Value) -> Result<Vec<InlineSpan>, ShapeMismatch> {
    Cursor::root(value).array()?.iter().map(segment).collect()
}

fn segment(cursor: &Cursor<'_>) -> Result<InlineSpan, ShapeMismatch> {
    let parts = cursor.array()?;
    let text = parts
        .first()
        .ok_or_else(|| cursor.mismatch("non-empty segment"))?
        .str()?
        .to_string();
    let attrs = match parts.get(1) {
        Some(list) => list.array()?.iter().map(attribute).collect::<Result<_, _>>()?,
        None => Vec::new(),
    };
    Ok(InlineSpan { text, attrs })
}

fn attribute(cursor: &Cursor<'_>) -> Result<InlineAttr, ShapeMismatch> {
    let parts = cursor.array()?;
    let code = parts
        .first()
        .ok_or_else(|| cursor.mismatch("attribute code"))?
        .str()?;
    let arg = || {
        parts
            .get(1)
            .ok_or_else(|| cursor.mismatch("attribute argument"))
    };
    Ok(match code {
        "b" => InlineAttr::Bold,
        "i" => InlineAttr::Italic,
        "s" => InlineAttr::Strike,
        "c" => InlineAttr::Code,
        "_" => InlineAttr::Underline,
        "a" => InlineAttr::Link(arg()?.str()?.to_string()),
        "p" => InlineAttr::Page(arg()?.str()?.to_string()),
        "u" => InlineAttr::User(arg()?.str()?.to_string()),
        "h" => InlineAttr::Color(arg()?.str()?.to_string()),
        "d" => InlineAttr::Date(date_mention(arg()?)?),
        other => InlineAttr::Other(other.to_string()),
    })
}

fn date_mention(cursor: &Cursor<'_>) -> Result<DateMention, ShapeMismatch> {
    let object = cursor.object()?;
    let start_date = object
        .get("start_date")
        .and_then(Value::as_str)
        .ok_or_else(|| cursor.mismatch("start_date string"))?
        .to_string();
    let start_time = object
        .get("start_time")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(DateMention {
        start_date,
        start_time,
    })
}

/// The literal text of the first segment; empty for an empty value.
///
/// This is how select, multi-select, number, text and checkbox columns carry
/// their value (`[["tech,life"]]`, `[["Yes"]]`).
pub fn first_literal(value: &Value) -> Result<String, ShapeMismatch> {
    let segments = Cursor::root(value).array()?;
    match segments.first() {
        Some(first) => Ok(segment(first)?.text),
        None => Ok(String::new()),
    }
}

/// The start of the first date mention found in the value.
pub fn start_date(value: &Value) -> Result<String, ShapeMismatch> {
    let spans = rich_text(value)?;
    spans
        .iter()
        .flat_map(|span| span.attrs.iter())
        .find_map(|attr| match attr {
            InlineAttr::Date(date) => Some(date.render()),
            _ => None,
        })
        .ok_or(ShapeMismatch {
            path: "$".to_string(),
            expected: "date mention",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_spans_with_attributes() {
        let value = json!([["plain "], ["bold link", [["b"], ["a", "https://x.dev"]]]]);
        let spans = rich_text(&value).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], InlineSpan::plain("plain "));
        assert!(spans[1].has(&InlineAttr::Bold));
        assert_eq!(spans[1].link(), Some("https://x.dev"));
        assert_eq!(plain_text(&spans), "plain bold link");
    }

    #[test]
    fn reports_the_path_of_a_mismatch() {
        let err = rich_text(&json!([["ok"], [42]])).unwrap_err();
        assert_eq!(err.path, "$[1][0]");
        assert_eq!(err.expected, "string");
    }

    #[test]
    fn reads_start_date_with_optional_time() {
        let date_only = json!([["‣", [["d", {"type": "date", "start_date": "2020-05-01"}]]]]);
        assert_eq!(start_date(&date_only).unwrap(), "2020-05-01");

        let with_time = json!([["‣", [["d", {"start_date": "2020-05-01", "start_time": "09:30"}]]]]);
        assert_eq!(start_date(&with_time).unwrap(), "2020-05-01 09:30");

        assert!(start_date(&json!([["no date"]])).is_err());
    }

    #[test]
    fn first_literal_of_select_and_empty_values() {
        assert_eq!(first_literal(&json!([["tech/go,life"]])).unwrap(), "tech/go,life");
        assert_eq!(first_literal(&json!([])).unwrap(), "");
        assert!(first_literal(&json!("flat")).is_err());
    }
}
