//! Converts a Markdown body into Substack's draft document and wraps it in the
//! payload accepted by the drafts endpoint.
//!
//! Substack stores post bodies as a ProseMirror-style JSON tree: a `doc` node
//! holding block nodes (`paragraph`, `heading`, `bullet_list`, ...) whose leaves
//! are `text` nodes carrying formatting `marks`. The tree is serialized to a
//! string and sent as `draft_body`.

use crate::error::{PublishError, Result};
use markdown_ppp::ast::{
    Block, CodeBlockKind, Document, HeadingKind, Inline, ListKind, SetextHeading,
};
use markdown_ppp::parser::{parse_markdown, MarkdownParserState};
use markdown_ppp::printer::{config::Config as PrinterConfig, render_markdown};
use serde::Serialize;
use serde_json::{json, Value};

/// An author entry attached to a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Byline {
    pub id: u64,
    pub is_guest: bool,
}

/// The body submitted when creating or updating a draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub draft_title: String,
    pub draft_subtitle: String,
    pub draft_body: String,
    pub draft_bylines: Vec<Byline>,
    pub audience: String,
    pub section_chosen: bool,
    pub draft_section_id: Option<u64>,
    pub write_comment_permissions: String,
}

impl DraftPayload {
    pub fn new(title: &str, subtitle: &str, user_id: u64, document: &Value) -> Self {
        Self {
            id: None,
            draft_title: title.to_string(),
            draft_subtitle: subtitle.to_string(),
            draft_body: document.to_string(),
            draft_bylines: vec![Byline {
                id: user_id,
                is_guest: false,
            }],
            audience: "everyone".to_string(),
            section_chosen: true,
            draft_section_id: None,
            write_comment_permissions: "everyone".to_string(),
        }
    }

    /// Merges the identifier of an existing post so the payload updates it.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Parses `markdown` and converts it into a draft `doc` node.
pub fn markdown_to_document(markdown: &str) -> Result<Value> {
    let doc = parse_markdown(MarkdownParserState::default(), markdown)
        .map_err(|e| PublishError::MarkdownParse(e.to_string()))?;

    let content: Vec<Value> = doc.blocks.iter().flat_map(block_to_nodes).collect();
    Ok(json!({ "type": "doc", "content": content }))
}

fn block_to_nodes(block: &Block) -> Vec<Value> {
    match block {
        Block::Paragraph(inlines) => {
            if let Some(images) = standalone_images(inlines) {
                return images;
            }
            let content = inlines_to_nodes(inlines);
            if content.is_empty() {
                return Vec::new();
            }
            vec![json!({ "type": "paragraph", "content": content })]
        }
        Block::Heading(heading) => {
            let level = heading_level(&heading.kind);
            vec![json!({
                "type": "heading",
                "attrs": { "level": level },
                "content": inlines_to_nodes(&heading.content),
            })]
        }
        Block::ThematicBreak => vec![json!({ "type": "horizontal_rule" })],
        Block::BlockQuote(blocks) => {
            let content: Vec<Value> = blocks.iter().flat_map(block_to_nodes).collect();
            vec![json!({ "type": "blockquote", "content": content })]
        }
        Block::List(list) => {
            let items: Vec<Value> = list
                .items
                .iter()
                .map(|item| {
                    let content: Vec<Value> =
                        item.blocks.iter().flat_map(block_to_nodes).collect();
                    json!({ "type": "list_item", "content": content })
                })
                .collect();

            match &list.kind {
                ListKind::Ordered(options) => vec![json!({
                    "type": "ordered_list",
                    "attrs": { "start": options.start, "order": options.start },
                    "content": items,
                })],
                _ => vec![json!({ "type": "bullet_list", "content": items })],
            }
        }
        Block::CodeBlock(code) => {
            let language = match &code.kind {
                CodeBlockKind::Fenced { info, .. } => info
                    .as_deref()
                    .and_then(|info| info.split_whitespace().next())
                    .map(str::to_string),
                _ => None,
            };
            let literal = code.literal.trim_end_matches('\n');
            let mut node = json!({ "type": "code_block", "attrs": { "language": language } });
            if !literal.is_empty() {
                node["content"] = json!([text_node(literal, &[])]);
            }
            vec![node]
        }
        Block::Definition(_) | Block::Empty => Vec::new(),
        other => fallback_paragraph(other),
    }
}

/// Blocks with no draft counterpart (tables, raw HTML, footnotes, alerts) are
/// re-rendered to Markdown and carried as plain text.
fn fallback_paragraph(block: &Block) -> Vec<Value> {
    let document = Document {
        blocks: vec![block.clone()],
    };
    let rendered = render_markdown(&document, PrinterConfig::default());
    let text = rendered.trim();
    if text.is_empty() {
        return Vec::new();
    }
    vec![json!({ "type": "paragraph", "content": [text_node(text, &[])] })]
}

fn heading_level(kind: &HeadingKind) -> u8 {
    match kind {
        HeadingKind::Atx(level) => *level,
        HeadingKind::Setext(SetextHeading::Level1) => 1,
        HeadingKind::Setext(SetextHeading::Level2) => 2,
    }
}

/// Returns `captionedImage` nodes when a paragraph holds nothing but images.
fn standalone_images(inlines: &[Inline]) -> Option<Vec<Value>> {
    let mut images = Vec::new();
    for inline in inlines {
        match inline {
            Inline::Image(image) => images.push(json!({
                "type": "captionedImage",
                "content": [{
                    "type": "image2",
                    "attrs": {
                        "src": image.destination,
                        "alt": image.alt,
                        "title": image.title,
                    },
                }],
            })),
            Inline::Text(text) if text.trim().is_empty() => {}
            Inline::LineBreak => {}
            _ => return None,
        }
    }
    (!images.is_empty()).then_some(images)
}

fn inlines_to_nodes(inlines: &[Inline]) -> Vec<Value> {
    let mut nodes = Vec::new();
    collect_inlines(inlines, &[], &mut nodes);
    nodes
}

fn collect_inlines(inlines: &[Inline], marks: &[Value], out: &mut Vec<Value>) {
    for inline in inlines {
        match inline {
            Inline::Text(text) | Inline::Html(text) => push_text(out, text, marks),
            Inline::Code(code) => {
                push_text(out, code, &with_mark(marks, json!({ "type": "code" })))
            }
            Inline::Emphasis(children) => {
                collect_inlines(children, &with_mark(marks, json!({ "type": "em" })), out)
            }
            Inline::Strong(children) => {
                collect_inlines(children, &with_mark(marks, json!({ "type": "strong" })), out)
            }
            Inline::Strikethrough(children) => collect_inlines(
                children,
                &with_mark(marks, json!({ "type": "strikethrough" })),
                out,
            ),
            Inline::Link(link) => collect_inlines(
                &link.children,
                &with_mark(marks, link_mark(&link.destination)),
                out,
            ),
            Inline::LinkReference(link_ref) => collect_inlines(&link_ref.text, marks, out),
            Inline::Image(image) => push_text(
                out,
                &image.alt,
                &with_mark(marks, link_mark(&image.destination)),
            ),
            Inline::Autolink(url) => push_text(out, url, &with_mark(marks, link_mark(url))),
            Inline::LineBreak => out.push(json!({ "type": "hard_break" })),
            _ => {}
        }
    }
}

fn link_mark(href: &str) -> Value {
    json!({ "type": "link", "attrs": { "href": href } })
}

fn with_mark(marks: &[Value], mark: Value) -> Vec<Value> {
    let mut marks = marks.to_vec();
    marks.push(mark);
    marks
}

fn text_node(text: &str, marks: &[Value]) -> Value {
    let mut node = json!({ "type": "text", "text": text });
    if !marks.is_empty() {
        node["marks"] = Value::Array(marks.to_vec());
    }
    node
}

/// Appends a text node, merging it into the previous one when the marks agree.
fn push_text(out: &mut Vec<Value>, text: &str, marks: &[Value]) {
    if text.is_empty() {
        return;
    }

    if let Some(last) = out.last_mut() {
        let same_marks = match last.get("marks") {
            Some(Value::Array(existing)) => existing.as_slice() == marks,
            None => marks.is_empty(),
            Some(_) => false,
        };
        if last["type"] == "text" && same_marks {
            if let Some(existing) = last["text"].as_str() {
                last["text"] = Value::String(format!("{existing}{text}"));
                return;
            }
        }
    }

    out.push(text_node(text, marks));
}
