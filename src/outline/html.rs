//! The persistence format for the editable surface: plain HTML.
//!
//! Paragraphs serialize as `<p>…</p>` with their rich inline content kept
//! verbatim; toggle blocks serialize as nested marked-up divs with escaped
//! text. Node ids are deliberately absent, so parsing always allocates
//! fresh handles.

use std::fmt::Write as _;

use crate::models::{Block, Body, Document, OutlineNode, TextBlock};

pub(crate) fn serialize_document(doc: &Document) -> String {
    let mut out = String::new();
    for block in &doc.blocks {
        match block {
            Block::Text(text) => {
                let _ = write!(out, "<p>{}</p>", text.html);
            }
            Block::Outline(node) => write_node(&mut out, node),
        }
    }
    out
}

fn write_node(out: &mut String, node: &OutlineNode) {
    let _ = write!(
        out,
        r#"<div class="toggle-block" data-level="{}" data-expanded="{}">"#,
        node.level, node.expanded
    );
    let _ = write!(
        out,
        r#"<div class="toggle-title">{}</div>"#,
        escape_text(&node.title)
    );
    match &node.body {
        Body::Text(text) => {
            let _ = write!(out, r#"<div class="toggle-body">{}</div>"#, escape_text(text));
        }
        Body::Children(kids) => {
            out.push_str(r#"<div class="toggle-children">"#);
            for kid in kids {
                write_node(out, kid);
            }
            out.push_str("</div>");
        }
    }
    out.push_str("</div>");
}

/// Parse a serialized surface back into a document.
///
/// Malformed input is not an error state: the parse logs a warning and
/// keeps whatever it recovered up to that point (the surface must never
/// crash on a corrupted snapshot).
pub(crate) fn parse_document(input: &str) -> Document {
    let mut blocks: Vec<Block> = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<p>") {
            let Some(end) = after.find("</p>") else {
                leptos::logging::warn!("load: unterminated paragraph, dropping the remainder");
                break;
            };
            blocks.push(Block::Text(TextBlock::with_html(after[..end].to_string())));
            rest = after[end + 4..].trim_start();
            continue;
        }

        if rest.starts_with("<div") {
            let Some((node, after)) = parse_toggle_block(rest, 0) else {
                leptos::logging::warn!("load: unrecognized block, dropping the remainder");
                break;
            };
            blocks.push(Block::Outline(node));
            rest = after.trim_start();
            continue;
        }

        let cut = rest.find('<').unwrap_or(rest.len());
        if cut == 0 {
            leptos::logging::warn!("load: stray markup, dropping the remainder");
            break;
        }
        // Bare text between blocks survives as a paragraph.
        let chunk = rest[..cut].trim();
        if !chunk.is_empty() {
            blocks.push(Block::Text(TextBlock::with_html(chunk.to_string())));
        }
        rest = rest[cut..].trim_start();
    }

    Document { blocks }
}

fn parse_toggle_block(s: &str, level: u8) -> Option<(OutlineNode, &str)> {
    let tag_end = s.find('>')?;
    let tag = &s[..tag_end];
    if !tag.contains(r#"class="toggle-block""#) {
        return None;
    }

    // The stored level is advisory styling metadata; nesting depth wins.
    if let Some(declared) = attr_value(tag, "data-level").and_then(|v| v.parse::<u8>().ok()) {
        if declared != level {
            leptos::logging::warn!(
                "load: stored level {} disagrees with nesting depth {}",
                declared,
                level
            );
        }
    }
    let expanded = attr_value(tag, "data-expanded")
        .map(|v| v == "true")
        .unwrap_or(true);

    let (inner, rest) = split_matching_div(&s[tag_end + 1..])?;

    let inner = inner.trim_start();
    let (title_raw, after_title) = parse_leaf_div(inner, "toggle-title")?;
    let after_title = after_title.trim_start();

    let body = if let Some((text_raw, _)) = parse_leaf_div(after_title, "toggle-body") {
        Body::Text(unescape_text(text_raw))
    } else if let Some((kids, _)) = parse_children(after_title, level + 1) {
        if kids.is_empty() {
            Body::Text(String::new())
        } else {
            Body::Children(kids)
        }
    } else {
        leptos::logging::warn!("load: toggle block without a body, treating as empty");
        Body::Text(String::new())
    };

    let mut node = OutlineNode::with_title(level, unescape_text(title_raw));
    node.expanded = expanded;
    node.body = body;
    Some((node, rest))
}

fn parse_children(s: &str, level: u8) -> Option<(Vec<OutlineNode>, &str)> {
    let tag_end = s.find('>')?;
    if !s[..tag_end].contains(r#"class="toggle-children""#) {
        return None;
    }
    let (inner, rest) = split_matching_div(&s[tag_end + 1..])?;

    let mut kids = Vec::new();
    let mut cur = inner.trim_start();
    while !cur.is_empty() {
        let (kid, next) = parse_toggle_block(cur, level)?;
        kids.push(kid);
        cur = next.trim_start();
    }
    Some((kids, rest))
}

/// A div whose inner content is escaped text (titles, free-text bodies), so
/// the first close tag is the matching one.
fn parse_leaf_div<'a>(s: &'a str, class: &str) -> Option<(&'a str, &'a str)> {
    let open = format!(r#"<div class="{class}">"#);
    let after = s.strip_prefix(open.as_str())?;
    let end = after.find("</div>")?;
    Some((&after[..end], &after[end + 6..]))
}

/// `s` starts just past an opening `<div …>` tag; returns the inner content
/// and the remainder after the matching close, counting nested divs.
fn split_matching_div(s: &str) -> Option<(&str, &str)> {
    let bytes = s.as_bytes();
    let mut depth = 1usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            if bytes[i..].starts_with(b"<div") {
                depth += 1;
                i += 4;
                continue;
            }
            if bytes[i..].starts_with(b"</div>") {
                depth -= 1;
                if depth == 0 {
                    return Some((&s[..i], &s[i + 6..]));
                }
                i += 6;
                continue;
            }
        }
        i += 1;
    }
    None
}

fn attr_value<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(r#"{name}=""#);
    let start = tag.find(needle.as_str())? + needle.len();
    let rest = &tag[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

pub(crate) fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_text(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
