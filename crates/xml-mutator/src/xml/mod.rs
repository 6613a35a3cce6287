//! The XML tree adapter every strategy mutates through.
//!
//! Wraps [`xmltree::Element`] for parsing and serialization, and adds the two things
//! `xmltree` doesn't give us: DOCTYPE preservation (it silently drops `Doctype` events on
//! both read and write) and a way to address and detach/reattach nodes without parent
//! back-pointers. We address nodes by [`NodePath`], the sequence of child indices from the
//! root — equivalent in spirit to lxml's element references, but positional instead of
//! pointer-based since `xmltree::Element` has none.

use std::num::NonZeroUsize;
use std::sync::LazyLock;

use libafl_bolts::rands::Rand;
use regex::Regex;
use thiserror::Error;
use xmltree::{Element, EmitterConfig, ParserConfig, XMLNode};

/// A parsed document: the element tree plus whatever DOCTYPE text preceded the root.
///
/// The original mutator only ever treated DOCTYPE as a string to splice (see
/// `insert_dtd`'s `xml_tree_str.split(']>', maxsplit=1)`), never as a structured node, so we
/// keep it as a raw string here too rather than inventing a typed representation `xmltree`
/// has no room for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Element,
    pub doctype: Option<String>,
}

#[derive(Debug, Error)]
#[error("malformed XML: {0}")]
pub struct ParseError(#[from] xmltree::ParseError);

#[derive(Debug, Error)]
#[error("failed to serialize XML: {0}")]
pub struct SerializeError(#[from] xmltree::Error);

static DOCTYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!DOCTYPE[^>\[]*(?:\[.*?\])?\s*>").unwrap());

fn reader_config() -> ParserConfig {
    // `ignore_comments` already defaults to `false` inside `Element::parse`'s own
    // `parse_all`, but we go through `parse_all_with_config` directly so we state the
    // requirement explicitly rather than relying on that default.
    ParserConfig::new().ignore_comments(false)
}

fn writer_config() -> EmitterConfig {
    EmitterConfig::new()
        .write_document_declaration(false)
        .normalize_empty_elements(false)
        .autopad_comments(false)
        .pad_self_closing(false)
}

/// Parses `bytes` into a [`Document`]. Callers that just need a parse/fail check (the
/// dispatcher's try-parse-or-fallback gate) can discard the error.
pub fn parse(bytes: &[u8]) -> Result<Document, ParseError> {
    let doctype = capture_doctype(bytes);
    let root = Element::parse_all_with_config(bytes, reader_config())
        .map_err(ParseError)
        .and_then(|nodes| {
            nodes
                .into_iter()
                .find_map(|node| match node {
                    XMLNode::Element(e) => Some(e),
                    _ => None,
                })
                .ok_or(ParseError(xmltree::ParseError::CannotParse))
        })?;
    Ok(Document { root, doctype })
}

fn capture_doctype(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    DOCTYPE_RE.find(text).map(|m| m.as_str().to_owned())
}

/// Serializes back to bytes: no XML declaration, the captured DOCTYPE re-prepended
/// verbatim, no reformatting of whatever was already there.
pub fn serialize(doc: &Document) -> Result<Vec<u8>, SerializeError> {
    let mut out = Vec::new();
    if let Some(doctype) = &doc.doctype {
        out.extend_from_slice(doctype.as_bytes());
    }
    doc.root.write_with_config(&mut out, writer_config())?;
    Ok(out)
}

/// A node's location as child indices from the root, e.g. `[1, 0]` is
/// `root.children[1]`'s `children[0]`. The empty path addresses the root itself.
pub type NodePath = Vec<usize>;

/// Every element in the tree, depth-first pre-order, root included. Mirrors
/// `xml_tree.getroot().iter(tag=etree.Element)`.
pub fn enumerate_elements(root: &Element) -> Vec<NodePath> {
    let mut paths = Vec::new();
    let mut prefix = Vec::new();
    walk(root, &mut prefix, &mut paths);
    paths
}

fn walk(elem: &Element, prefix: &mut NodePath, out: &mut Vec<NodePath>) {
    out.push(prefix.clone());
    for (idx, child) in elem.children.iter().enumerate() {
        if let XMLNode::Element(child_elem) = child {
            prefix.push(idx);
            walk(child_elem, prefix, out);
            prefix.pop();
        }
    }
}

/// Picks a random element's path. With `exclude_root`, the root itself is never chosen
/// (`_pick_element(..., exclude_root_node=True)`'s `start=1`). Returns `None` when there is
/// nothing to pick, matching the Python version's `(None, None)` on an empty population.
pub fn pick_element(rand: &mut impl Rand, root: &Element, exclude_root: bool) -> Option<NodePath> {
    let mut paths = enumerate_elements(root);
    if exclude_root && !paths.is_empty() {
        paths.remove(0);
    }
    if paths.is_empty() {
        return None;
    }
    let idx = rand.below(NonZeroUsize::new(paths.len())?);
    Some(paths.swap_remove(idx))
}

/// Whether `descendant` is strictly below `ancestor` in the tree. Positional analogue of
/// `child in parent.iterdescendants()`.
pub fn is_descendant_of(ancestor: &[usize], descendant: &[usize]) -> bool {
    descendant.len() > ancestor.len() && descendant[..ancestor.len()] == *ancestor
}

/// Borrows the element at `path`. Panics if `path` doesn't address an element, which would
/// mean a caller held on to a stale path across a tree edit — a programming error, not a
/// runtime condition strategies need to recover from.
pub fn get<'a>(root: &'a Element, path: &[usize]) -> &'a Element {
    let mut cur = root;
    for &idx in path {
        cur = match &cur.children[idx] {
            XMLNode::Element(e) => e,
            _ => panic!("node path does not address an element"),
        };
    }
    cur
}

pub fn get_mut<'a>(root: &'a mut Element, path: &[usize]) -> &'a mut Element {
    let mut cur = root;
    for &idx in path {
        cur = match &mut cur.children[idx] {
            XMLNode::Element(e) => e,
            _ => panic!("node path does not address an element"),
        };
    }
    cur
}

/// Detaches the node at `path` from its parent and returns it. Returns `None` for the root
/// path (the root can't be removed) or a stale path.
pub fn remove(root: &mut Element, path: &[usize]) -> Option<XMLNode> {
    let (&idx, parent_path) = path.split_last()?;
    let parent = get_mut(root, parent_path);
    (idx < parent.children.len()).then(|| parent.children.remove(idx))
}

/// Inserts `node` as a child of the element at `parent_path`, at `index` (clamped to the
/// end of the children list).
pub fn insert(root: &mut Element, parent_path: &[usize], index: usize, node: XMLNode) {
    let parent = get_mut(root, parent_path);
    let index = index.min(parent.children.len());
    parent.children.insert(index, node);
}

/// The concatenation of this element's direct `Text` children — lxml's notion of `.text`
/// restricted to what `xmltree`'s flat children list can represent (CDATA is left alone so
/// mutating "text" never silently rewrites a CDATA section).
pub fn element_text(elem: &Element) -> String {
    elem.children
        .iter()
        .filter_map(XMLNode::as_text)
        .collect::<Vec<_>>()
        .join("")
}

/// Replaces this element's direct `Text` children with a single new one (or none, for
/// `None`/empty). Mirrors assigning to lxml's `elem.text`.
pub fn set_element_text(elem: &mut Element, text: Option<String>) {
    elem.children.retain(|n| !matches!(n, XMLNode::Text(_)));
    match text {
        Some(text) if !text.is_empty() => elem.children.insert(0, XMLNode::Text(text)),
        _ => {}
    }
}

/// Paths to elements matching `(namespace, local_name)`, e.g. xmldsig `Reference` elements.
pub fn find_by_qualified_name(root: &Element, namespace: &str, name: &str) -> Vec<NodePath> {
    enumerate_elements(root)
        .into_iter()
        .filter(|path| {
            let elem = get(root, path);
            elem.name == name && elem.namespace.as_deref() == Some(namespace)
        })
        .collect()
}

/// Adjusts `path` for the removal of the node at `removed`. Only a path within the same
/// parent as `removed` (itself or a descendant of a later sibling) needs its index shifted
/// down by one; anything else is unaffected by a single-child `Vec::remove`.
pub fn adjust_path_after_removal(removed: &[usize], path: &[usize]) -> NodePath {
    let Some((&removed_idx, removed_parent)) = removed.split_last() else {
        return path.to_vec();
    };
    if path.len() > removed_parent.len() && path[..removed_parent.len()] == *removed_parent {
        let mut adjusted = path.to_vec();
        let slot = &mut adjusted[removed_parent.len()];
        if *slot > removed_idx {
            *slot -= 1;
        }
        adjusted
    } else {
        path.to_vec()
    }
}

/// Every `ID` attribute value found anywhere in the tree, as `#value` fragment references.
pub fn harvest_id_references(root: &Element) -> Vec<String> {
    enumerate_elements(root)
        .into_iter()
        .filter_map(|path| get(root, &path).attributes.get("ID").map(|id| format!("#{id}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_cdata_comments_and_doctype() {
        let input = b"<!DOCTYPE root [<!ENTITY foo \"bar\">]>\n<root><!--c--><a><![CDATA[<raw>]]></a></root>";
        let doc = parse(input).expect("parse");
        assert_eq!(
            doc.doctype.as_deref(),
            Some("<!DOCTYPE root [<!ENTITY foo \"bar\">]>")
        );
        let out = serialize(&doc).expect("serialize");
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("<!DOCTYPE root"));
        assert!(out.contains("<!--c-->"));
        assert!(out.contains("<![CDATA[<raw>]]>"));
    }

    #[test]
    fn enumerate_elements_is_preorder_and_includes_root() {
        let doc = parse(b"<root><a/><b><c/></b></root>").unwrap();
        let paths = enumerate_elements(&doc.root);
        assert_eq!(paths, vec![vec![], vec![0], vec![1], vec![1, 0]]);
    }

    #[test]
    fn pick_element_can_exclude_root() {
        let doc = parse(b"<root><a/></root>").unwrap();
        let mut rand = crate::rand::seeded(b"pick");
        for _ in 0..20 {
            let path = pick_element(&mut rand, &doc.root, true).unwrap();
            assert_ne!(path, Vec::<usize>::new());
        }
    }

    #[test]
    fn is_descendant_of_is_strict_and_positional() {
        assert!(is_descendant_of(&[0], &[0, 1]));
        assert!(!is_descendant_of(&[0], &[0]));
        assert!(!is_descendant_of(&[0, 1], &[0]));
    }

    #[test]
    fn remove_and_insert_round_trip() {
        let mut doc = parse(b"<root><a/><b/></root>").unwrap();
        let node = remove(&mut doc.root, &[0]).unwrap();
        assert_eq!(doc.root.children.len(), 1);
        insert(&mut doc.root, &[], 1, node);
        assert_eq!(doc.root.children.len(), 2);
    }
}
