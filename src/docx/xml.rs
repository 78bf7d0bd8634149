//! WordprocessingML text handling.
//!
//! Text lives in `w:t` elements spread over runs. Runs are grouped by the
//! paragraph that owns them so that a placeholder the word processor split
//! across several runs is still recognised.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use roxmltree::{Document, Node, NodeId};

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const WML_STRICT_NS: &str = "http://purl.oclc.org/ooxml/wordprocessingml/main";

/// `{{identifier}}`, identifier restricted to ASCII letters, digits and `_`.
pub fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("placeholder pattern is valid"))
}

fn is_wml(node: &Node, local: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && matches!(node.tag_name().namespace(), Some(WML_NS) | Some(WML_STRICT_NS))
}

struct TextRun<'a> {
    range: Range<usize>,
    text: &'a str,
}

/// Text runs in document order, grouped by their innermost paragraph.
fn paragraph_runs<'a>(doc: &'a Document<'a>) -> Vec<Vec<TextRun<'a>>> {
    let mut groups: Vec<Vec<TextRun<'a>>> = Vec::new();
    let mut by_paragraph: HashMap<NodeId, usize> = HashMap::new();

    for node in doc.descendants().filter(|n| is_wml(n, "t")) {
        let run = TextRun {
            range: node.range(),
            text: node.text().unwrap_or(""),
        };
        match node.ancestors().skip(1).find(|a| is_wml(a, "p")) {
            Some(paragraph) => {
                let index = *by_paragraph.entry(paragraph.id()).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[index].push(run);
            }
            None => groups.push(vec![run]),
        }
    }

    groups
}

/// Concatenated text of every paragraph in a part.
pub fn paragraph_texts(xml: &str) -> Result<Vec<String>, roxmltree::Error> {
    let doc = Document::parse(xml)?;
    Ok(paragraph_runs(&doc)
        .iter()
        .map(|runs| runs.iter().map(|r| r.text).collect())
        .collect())
}

/// Field names referenced by `{{...}}` tokens in the given texts, in order of
/// appearance (duplicates included).
pub fn placeholders_in(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .flat_map(|text| {
            placeholder_regex()
                .captures_iter(text)
                .map(|caps| caps[1].to_string())
        })
        .collect()
}

fn replace_with<F>(text: &str, resolve: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    placeholder_regex()
        .replace_all(text, |caps: &Captures| {
            resolve(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Substitute placeholders in one XML part.
///
/// `resolve` returns the replacement for a field name, `None` leaves the token
/// as it is. Returns `None` when nothing changed.
pub fn substitute<F>(xml: &str, resolve: F) -> Result<Option<String>, roxmltree::Error>
where
    F: Fn(&str) -> Option<String>,
{
    let doc = Document::parse(xml)?;
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for runs in paragraph_runs(&doc) {
        let merged: String = runs.iter().map(|r| r.text).collect();
        if !placeholder_regex().is_match(&merged) {
            continue;
        }

        let whole = replace_with(&merged, &resolve);
        if whole == merged {
            continue;
        }

        let per_run: Vec<String> = runs.iter().map(|r| replace_with(r.text, &resolve)).collect();
        if per_run.concat() == whole {
            // Every token sat inside a single run; keep run formatting.
            for (run, text) in runs.iter().zip(per_run) {
                if text != run.text {
                    edits.push((run.range.clone(), render_text_element(xml, &run.range, &text)));
                }
            }
        } else {
            // A token spans runs; collapse the paragraph into its first run.
            for (i, run) in runs.iter().enumerate() {
                let text = if i == 0 { whole.as_str() } else { "" };
                edits.push((run.range.clone(), render_text_element(xml, &run.range, text)));
            }
        }
    }

    if edits.is_empty() {
        return Ok(None);
    }

    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(xml.len() + 64);
    let mut cursor = 0;
    for (range, replacement) in edits {
        out.push_str(&xml[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&xml[cursor..]);
    Ok(Some(out))
}

/// Rebuild a `w:t` element with new content, keeping the source prefix.
fn render_text_element(xml: &str, range: &Range<usize>, text: &str) -> String {
    let qname: String = xml[range.start + 1..range.end]
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
        .collect();
    format!(
        "<{qname} xml:space=\"preserve\">{}</{qname}>",
        escape_text(text)
    )
}

/// Escape character data and drop characters XML 1.0 cannot carry.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}
