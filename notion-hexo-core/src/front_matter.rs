//! Collection schema to Hexo front matter.
//!
//! A [`FrontMatter`] is built once per collection from its schema. Column
//! names are normalized (`"My URL"` becomes `my_url`) and then checked: a
//! title-typed `title` column must exist, well-known names must carry a
//! compatible type, and names Hexo reserves for itself are rejected.
//! Rendering walks the mapped names in order and pulls each value off the
//! page's root block.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::warn;

use crate::error::SchemaError;
use crate::model::{Block, ColumnType, SchemaColumn};
use crate::property::{self, ShapeMismatch};

/// Names Hexo assigns itself. A user column with one of these names is fatal.
pub const RESERVED_NAMES: [&str; 5] = ["id", "uuid", "post_title", "permalink", "filename"];

fn allowed_types(name: &str) -> Option<Vec<ColumnType>> {
    use ColumnType::*;
    Some(match name {
        "title" => vec![Title],
        "categories" => vec![Select, MultiSelect],
        "tags" => vec![MultiSelect],
        "date" => vec![Date, CreatedTime],
        "updated" => vec![Date, LastEditedTime],
        "comments" => vec![Checkbox],
        "url" => vec![Text],
        "status" => vec![Select],
        "description" => vec![Text],
        _ => return None,
    })
}

/// Lowercase, with every whitespace character replaced by `_`.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedColumn {
    pub id: String,
    pub kind: ColumnType,
}

/// Values the mapping cannot derive from the block itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderEnv<'a> {
    pub timezone: Tz,
    /// Computed URL of the page being rendered.
    pub default_url: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    columns: BTreeMap<String, MappedColumn>,
}

impl FrontMatter {
    pub fn new(schema: &[SchemaColumn]) -> Result<Self, SchemaError> {
        let mut columns = BTreeMap::new();
        for column in schema {
            let name = normalize_name(&column.name);
            if RESERVED_NAMES.contains(&name.as_str()) {
                return Err(SchemaError::ReservedName(name));
            }
            if let Some(expected) = allowed_types(&name) {
                if !expected.contains(&column.kind) {
                    return Err(SchemaError::WrongType {
                        name,
                        found: column.kind.clone(),
                        expected,
                    });
                }
            }
            if columns.contains_key(&name) {
                warn!(column = %column.name, name = %name, "Duplicate column name after normalization; keeping the first");
                continue;
            }
            columns.insert(
                name,
                MappedColumn {
                    id: column.id.clone(),
                    kind: column.kind.clone(),
                },
            );
        }
        if !columns.contains_key("title") {
            return Err(SchemaError::MissingColumn("title"));
        }
        Ok(Self { columns })
    }

    pub fn column(&self, name: &str) -> Option<&MappedColumn> {
        self.columns.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Literal value of a mapped column on `root`; `None` when the column is
    /// not mapped or the page has no value for it.
    pub fn literal(&self, root: &Block, name: &str) -> Option<String> {
        let column = self.column(name)?;
        root.literal(&column.id)
    }

    /// User-declared URL, trimmed, if the page sets one.
    pub fn declared_url(&self, root: &Block) -> Option<String> {
        self.literal(root, "url")
            .map(|url| trim_url(&url).to_string())
            .filter(|url| !url.is_empty())
    }

    /// Front matter lines for a top-level page, without delimiters.
    pub fn render(&self, root: &Block, env: &RenderEnv<'_>) -> String {
        let mut out = String::new();
        for (name, column) in &self.columns {
            if let Some(value) = self.value(name, column, root, env) {
                out.push_str(&format!("{name}: {value}\n"));
            }
        }
        out.push_str(&format!("uuid: {}\n", root.id.dashed()));
        if !self.columns.contains_key("url") {
            out.push_str(&format!("url: {}\n", env.default_url));
        }
        out
    }

    fn value(
        &self,
        name: &str,
        column: &MappedColumn,
        root: &Block,
        env: &RenderEnv<'_>,
    ) -> Option<String> {
        match column.kind {
            ColumnType::CreatedTime => return Some(timestamp(root.created_time, env.timezone)),
            ColumnType::LastEditedTime => {
                return Some(timestamp(root.last_edited_time, env.timezone))
            }
            _ => {}
        }

        let Some(raw) = root.properties.get(&column.id) else {
            return match (name, &column.kind) {
                ("url", _) => Some(env.default_url.to_string()),
                (_, ColumnType::Checkbox) => Some("false".to_string()),
                _ => None,
            };
        };

        match extract(name, &column.kind, raw) {
            Ok(value) if name == "url" && value.is_empty() => Some(env.default_url.to_string()),
            Ok(value) if value.is_empty() => None,
            Ok(value) => Some(value),
            Err(e) => {
                warn!(page_id = %root.id, field = name, error = %e, "Omitting undecodable front matter field");
                None
            }
        }
    }
}

fn extract(name: &str, kind: &ColumnType, raw: &Value) -> Result<String, ShapeMismatch> {
    match name {
        "tags" => {
            let tags = property::first_literal(raw)?;
            return Ok(if tags.is_empty() { tags } else { format!("[{tags}]") });
        }
        "categories" => return Ok(format_categories(&property::first_literal(raw)?)),
        "url" => return Ok(trim_url(&property::first_literal(raw)?).to_string()),
        _ => {}
    }
    Ok(match kind {
        ColumnType::Title | ColumnType::Text => {
            yaml_scalar(property::first_literal(raw)?.trim())
        }
        ColumnType::Number | ColumnType::Select | ColumnType::MultiSelect => {
            property::first_literal(raw)?
        }
        ColumnType::Checkbox => (property::first_literal(raw)? == "Yes").to_string(),
        ColumnType::Date => property::start_date(raw)?,
        _ => String::new(),
    })
}

/// `"tech/go,life"` becomes `"[[tech,go],[life]]"`.
pub fn format_categories(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let groups: Vec<String> = value
        .split(',')
        .map(|group| format!("[{}]", group.split('/').collect::<Vec<_>>().join(",")))
        .collect();
    format!("[{}]", groups.join(","))
}

/// Strip one leading and one trailing slash.
pub fn trim_url(url: &str) -> &str {
    let url = url.strip_prefix('/').unwrap_or(url);
    url.strip_suffix('/').unwrap_or(url)
}

/// Millisecond epoch as `YYYY-MM-DDTHH:MM:SS±hh:mm` in `tz`.
pub fn timestamp(millis: i64, tz: Tz) -> String {
    let utc: DateTime<Utc> = Utc
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default();
    utc.with_timezone(&tz)
        .format("%Y-%m-%dT%H:%M:%S%:z")
        .to_string()
}

/// Quote free text that YAML would otherwise misread.
fn yaml_scalar(text: &str) -> String {
    let needs_quotes = text.contains(": ")
        || text.contains(" #")
        || text.ends_with(':')
        || text.starts_with(|c: char| "-?:,[]{}#&*!|>'\"%@`".contains(c));
    if needs_quotes {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text.to_string()
    }
}

/// Minimal header for pages that do not belong to a collection.
pub fn render_sub_page_header(root: &Block, timezone: Tz) -> String {
    let title = property::plain_text(&root.title());
    format!(
        "title: {}\ndate: {}\nupdated: {}\n",
        yaml_scalar(title.trim()),
        timestamp(root.created_time, timezone),
        timestamp(root.last_edited_time, timezone),
    )
}
