//! Notion identifiers.
//!
//! Every page and block is addressed by a UUID. Notion hands them out in two
//! spellings: the dashed `8-4-4-4-12` form used by the API and the 32-hex
//! "no-dash" form found in page URLs. [`PageId`] accepts both and always
//! stores the canonical dashed lowercase form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raised when a string cannot be normalized into a [`PageId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier: {0:?}")]
pub struct InvalidId(pub String);

/// Canonical identifier of a page or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageId(Uuid);

/// Blocks share the page id space.
pub type BlockId = PageId;

impl PageId {
    pub fn parse(raw: &str) -> Result<Self, InvalidId> {
        let trimmed = raw.trim();
        // Uuid::parse_str also accepts braced and urn forms; Notion never uses them.
        let plausible = match trimmed.len() {
            32 => trimmed.chars().all(|c| c.is_ascii_hexdigit()),
            36 => trimmed.chars().all(|c| c.is_ascii_hexdigit() || c == '-'),
            _ => false,
        };
        if !plausible {
            return Err(InvalidId(raw.to_string()));
        }
        Uuid::parse_str(trimmed)
            .map(PageId)
            .map_err(|_| InvalidId(raw.to_string()))
    }

    /// Dashed lowercase form, e.g. `11112222-aaaa-bbbb-cccc-ddddeeeeffff`.
    pub fn dashed(&self) -> String {
        self.0.hyphenated().to_string()
    }

    /// 32-hex form used in file names and URLs.
    pub fn no_dash(&self) -> String {
        self.0.simple().to_string()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for PageId {
    type Err = InvalidId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageId::parse(s)
    }
}

impl TryFrom<String> for PageId {
    type Error = InvalidId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PageId::parse(&value)
    }
}

impl From<PageId> for String {
    fn from(id: PageId) -> Self {
        id.dashed()
    }
}
