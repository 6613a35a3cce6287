use libafl_bolts::rands::Rand;

use super::{Strategy, StrategyContext, MAX_ATTEMPTS};
use crate::rand::{random_lowercase_string, two_sorted_char_offsets, MutatorRand};
use crate::xml;

/// Injects an `&entity;` reference — somewhere in the document, or inside a text-bearing
/// element — backed by a new `<!ENTITY>` declaration, appending to an existing DOCTYPE's
/// internal subset or creating one.
pub struct InsertDtd;

impl Strategy for InsertDtd {
    fn identifier(&self) -> &'static str {
        "insert_dtd"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let mut tree = ctx.tree.clone();

        // A DOCTYPE without an internal subset (no "]>") can't be appended to. The original
        // mutator raises on the `split("]>")` unpack, which propagates past `mutate()` to the
        // dispatcher's own exception handler — not a no-op that falls through to analysis and
        // the fallback mutator. `MUTATION_FAILED` reproduces that: the dispatcher returns it to
        // the host untouched.
        let doctype_prefix: Option<String> = match &tree.doctype {
            Some(dt) => match dt.split_once("]>") {
                Some((prefix, _)) => Some(prefix.to_string()),
                None => return super::MUTATION_FAILED.to_vec(),
            },
            None => None,
        };

        let mut found_path = None;
        for _ in 0..MAX_ATTEMPTS {
            if let Some(path) = xml::pick_element(rand, &tree.root, false)
                && !xml::element_text(xml::get(&tree.root, &path)).trim().is_empty() {
                    found_path = Some(path);
                    break;
                }
        }

        let entity_name = random_lowercase_string(rand, 10);
        let use_whole_document = found_path.is_none() || rand.coinflip(0.5);

        let (content, body) = if use_whole_document {
            let Ok(text) = serialize_body(&tree.root) else {
                return ctx.buffer.to_vec();
            };
            let Some((a, b)) = two_sorted_char_offsets(rand, &text) else {
                return ctx.buffer.to_vec();
            };
            let content = text[a..b].to_string();
            let body = format!("{}&{};{}", &text[..a], entity_name, &text[b..]);
            (content, body)
        } else {
            let path = found_path.unwrap();
            let text = xml::element_text(xml::get(&tree.root, &path));
            if text.is_empty() {
                return ctx.buffer.to_vec();
            }
            let chars: Vec<char> = text.chars().collect();
            let idx = if chars.len() <= 1 { 0 } else { rand.between(0, chars.len() - 1) };
            let mut new_text: String = chars[..idx].iter().collect();
            new_text.push('&');
            new_text.push_str(&entity_name);
            new_text.push(';');
            new_text.extend(&chars[idx..]);
            xml::set_element_text(xml::get_mut(&mut tree.root, &path), Some(new_text));
            let Ok(body) = serialize_body(&tree.root) else {
                return ctx.buffer.to_vec();
            };
            (String::new(), body)
        };

        let entity_decl = format!("<!ENTITY {entity_name} \"{content}\">");
        let doctype = match doctype_prefix {
            Some(prefix) => format!("{prefix}{entity_decl}]>"),
            None => format!("<!DOCTYPE Response [\n{entity_decl}]>"),
        };

        let mut out = doctype.into_bytes();
        out.extend_from_slice(body.as_bytes());
        out
    }
}

fn serialize_body(root: &xmltree::Element) -> Result<String, ()> {
    let body_only = xml::Document {
        root: root.clone(),
        doctype: None,
    };
    let serialized = xml::serialize(&body_only).map_err(|_| ())?;
    String::from_utf8(serialized).map_err(|_| ())
}
