//! Block tree to Hexo markdown.
//!
//! [`MarkdownRenderer`] walks a cached page depth-first from its root. It
//! carries two bits of state: the indentation prefix for nested blocks, and
//! the kind of the previously rendered block so that a blank line can
//! separate runs of different kinds.

use std::sync::LazyLock;

use chrono_tz::Tz;
use regex::Regex;
use tracing::warn;

use crate::front_matter::{self, FrontMatter, RenderEnv};
use crate::images::ImageBatch;
use crate::model::{Block, BlockKind, Page};
use crate::property::{InlineAttr, InlineSpan};
use crate::url::UrlResolver;

pub const MORE_MARKER: &str = "{% more %}";
pub const MORE_COMMENT: &str = "<!-- more -->";
const INDENT: &str = "    ";

static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/)|youtu\.be/)([A-Za-z0-9_-]{6,})")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Emit `- [x]` task syntax instead of ballot glyphs.
    pub checkbox_syntax: bool,
    pub timezone: Tz,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            checkbox_syntax: false,
            timezone: chrono_tz::UTC,
        }
    }
}

/// Render `page` to markdown. `mapping` is the owning collection's front
/// matter for posts and `None` for nested pages.
pub fn render_page(
    page: &Page,
    resolver: &UrlResolver,
    mapping: Option<&FrontMatter>,
    options: &RenderOptions,
    images: &mut ImageBatch,
) -> String {
    let mut renderer = MarkdownRenderer {
        page,
        resolver,
        mapping,
        options,
        images,
        out: String::new(),
        indent: String::new(),
        last_kind: None,
    };
    renderer.block(page.root());
    renderer.out
}

pub struct MarkdownRenderer<'a> {
    page: &'a Page,
    resolver: &'a UrlResolver,
    mapping: Option<&'a FrontMatter>,
    options: &'a RenderOptions,
    images: &'a mut ImageBatch,
    out: String,
    indent: String,
    last_kind: Option<BlockKind>,
}

impl MarkdownRenderer<'_> {
    fn line(&mut self, text: &str) {
        for line in text.split('\n') {
            self.out.push_str(&self.indent);
            self.out.push_str(line);
            self.out.push('\n');
        }
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn children(&mut self, block: &Block) {
        let page = self.page;
        for child in page.children(block) {
            self.block(child);
        }
    }

    fn nested(&mut self, block: &Block) {
        self.indent.push_str(INDENT);
        self.children(block);
        self.indent.truncate(self.indent.len() - INDENT.len());
    }

    fn block(&mut self, block: &Block) {
        if self.last_kind.as_ref().is_some_and(|last| *last != block.kind) {
            self.blank();
        }
        self.last_kind = Some(block.kind.clone());

        match &block.kind {
            BlockKind::Page if self.page.is_root(block) => {
                let header = match self.mapping {
                    Some(mapping) => {
                        let default_url = self.resolver.default_url(block.id);
                        let env = RenderEnv {
                            timezone: self.options.timezone,
                            default_url: &default_url,
                        };
                        mapping.render(block, &env)
                    }
                    None => front_matter::render_sub_page_header(block, self.options.timezone),
                };
                self.out.push_str(&header);
                self.line("---");
                self.children(block);
            }
            BlockKind::Page => {
                let title = self.inline(&block.title());
                let link = self.resolver.page_link(block.id, title.trim());
                self.line(&link);
            }
            BlockKind::Text => {
                let text = self.inline(&block.title());
                let text = text.trim();
                let text = if text == MORE_MARKER { MORE_COMMENT } else { text };
                self.line(text);
                self.blank();
                self.nested(block);
            }
            BlockKind::Header | BlockKind::SubHeader | BlockKind::SubSubHeader => {
                let level = match block.kind {
                    BlockKind::Header => "#",
                    BlockKind::SubHeader => "##",
                    _ => "###",
                };
                let text = self.inline(&block.title());
                self.line(&format!("{level} {}", text.trim()));
                self.blank();
            }
            BlockKind::BulletedList | BlockKind::Toggle => {
                let text = self.inline(&block.title());
                self.line(&format!("- {}", text.trim()));
                self.nested(block);
            }
            BlockKind::NumberedList => {
                let text = self.inline(&block.title());
                self.line(&format!("1. {}", text.trim()));
                self.nested(block);
            }
            BlockKind::Quote | BlockKind::Callout => {
                let text = self.inline(&block.title());
                self.line(&format!("> {}", text.trim()));
                self.blank();
            }
            BlockKind::Divider => {
                self.line("---");
                self.blank();
            }
            BlockKind::Bookmark => {
                let link = block.literal("link").unwrap_or_default();
                let title = self.inline(&block.title());
                let title = match title.trim() {
                    "" => link.as_str(),
                    title => title,
                };
                self.line(&format!("[{title}]({})", self.resolver.rewrite(&link)));
                self.blank();
            }
            BlockKind::Code => {
                let language = normalize_language(&block.language());
                let code = crate::property::plain_text(&block.title());
                self.line(&format!("```{language}"));
                self.line(&code);
                self.line("```");
                self.blank();
            }
            BlockKind::Todo => {
                let text = self.inline(&block.title());
                let marker = match (self.options.checkbox_syntax, block.is_checked()) {
                    (true, true) => "[x]",
                    (true, false) => "[ ]",
                    (false, true) => "☑",
                    (false, false) => "☐",
                };
                self.line(&format!("- {marker} {}", text.trim()));
                self.nested(block);
            }
            BlockKind::Image => {
                let source = block.source();
                let url = self.images.resolve(&source, block);
                let caption = block
                    .caption()
                    .into_iter()
                    .next()
                    .map(|span| self.span(&span))
                    .unwrap_or_default();
                self.line(&format!("![{caption}]({url})"));
            }
            BlockKind::Gist => {
                let source = block.source();
                match trailing_segment(&source) {
                    Some(id) => self.line(&format!("{{% gist {id} %}}")),
                    None => self.unrecognized_embed(block, &source),
                }
                self.blank();
            }
            BlockKind::Video => {
                let source = block.source();
                match YOUTUBE_ID.captures(&source).and_then(|c| c.get(1)) {
                    Some(id) => self.line(&format!("{{% youtube {} %}}", id.as_str())),
                    None => self.unrecognized_embed(block, &source),
                }
                self.blank();
            }
            _ => {}
        }
    }

    fn unrecognized_embed(&mut self, block: &Block, source: &str) {
        warn!(block_id = %block.id, kind = block.kind.as_str(), source, "Unrecognized embed source, emitting a plain link");
        self.line(&format!("[{source}]({source})"));
    }

    fn inline(&self, spans: &[InlineSpan]) -> String {
        spans.iter().map(|span| self.span(span)).collect()
    }

    fn span(&self, span: &InlineSpan) -> String {
        let mut text = span.text.clone();
        for attr in &span.attrs {
            match attr {
                InlineAttr::Date(date) => text = date.render(),
                InlineAttr::Page(raw) => match crate::id::PageId::parse(raw) {
                    Ok(id) => {
                        let title = self.resolver.title(&id).unwrap_or(span.text.as_str());
                        return format!("[{}]({})", title, self.resolver.url_of(id));
                    }
                    Err(e) => warn!(mention = raw.as_str(), error = %e, "Ignoring malformed page mention"),
                },
                _ => {}
            }
        }
        if text.trim().is_empty() {
            return text;
        }
        if span.has(&InlineAttr::Code) {
            text = format!("`{text}`");
        }
        if span.has(&InlineAttr::Bold) {
            text = format!("**{text}**");
        }
        if span.has(&InlineAttr::Italic) {
            text = format!("_{text}_");
        }
        if span.has(&InlineAttr::Strike) {
            text = format!("~~{text}~~");
        }
        if let Some(url) = span.link() {
            text = format!("[{text}]({})", self.resolver.rewrite(url));
        }
        text
    }
}

/// Whitespace removed, lowercased.
pub fn normalize_language(language: &str) -> String {
    language
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

fn trailing_segment(source: &str) -> Option<&str> {
    let source = source.split(['?', '#']).next()?.trim_end_matches('/');
    let (_, last) = source.rsplit_once('/')?;
    (!last.is_empty()).then_some(last)
}
