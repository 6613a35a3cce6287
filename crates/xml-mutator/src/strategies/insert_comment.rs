use libafl_bolts::rands::Rand;

use super::{Strategy, StrategyContext, MAX_ATTEMPTS};
use crate::rand::MutatorRand;
use crate::xml;

const START_MARKER: &str = "insert_start_comment_here";
const END_MARKER: &str = "insert_end_comment_here";

/// Wraps a random slice of the serialized document in a comment, or inserts one inside a
/// text-bearing element's content.
pub struct InsertComment;

impl Strategy for InsertComment {
    fn identifier(&self) -> &'static str {
        "insert_comment"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let mut tree = ctx.tree.clone();
        let mut found_path = None;
        for _ in 0..MAX_ATTEMPTS {
            if let Some(path) = xml::pick_element(rand, &tree.root, false)
                && xml::element_text(xml::get(&tree.root, &path)).trim().len() > 2 {
                    found_path = Some(path);
                    break;
                }
        }

        let use_whole_document = found_path.is_none() || rand.coinflip(0.5);
        if use_whole_document {
            return super::wrap_random_slice(rand, &tree, ctx, "<!--", "-->");
        }

        let path = found_path.unwrap();
        let text = xml::element_text(xml::get(&tree.root, &path));
        if text.is_empty() {
            return ctx.buffer.to_vec();
        }
        let chars: Vec<char> = text.chars().collect();
        let idx = if chars.len() <= 1 { 0 } else { rand.between(0, chars.len() - 1) };
        let mut new_text: String = chars[..idx].iter().collect();
        new_text.push_str(START_MARKER);
        new_text.push_str(END_MARKER);
        new_text.extend(&chars[idx..]);
        xml::set_element_text(xml::get_mut(&mut tree.root, &path), Some(new_text));

        let Ok(serialized) = xml::serialize(&tree) else {
            return ctx.buffer.to_vec();
        };
        let Ok(text) = String::from_utf8(serialized) else {
            return ctx.buffer.to_vec();
        };
        text.replace(START_MARKER, "<!--")
            .replace(END_MARKER, "-->")
            .into_bytes()
    }
}
