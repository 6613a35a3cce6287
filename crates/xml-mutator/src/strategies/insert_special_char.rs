use libafl_bolts::rands::Rand;

use super::{Strategy, StrategyContext};
use crate::rand::MutatorRand;
use crate::xml;

const SPECIAL_CHARS: [char; 5] = ['<', '>', '&', '\'', '"'];

/// Inserts a single XML-significant character at a random offset of the serialized document.
pub struct InsertSpecialChar;

impl Strategy for InsertSpecialChar {
    fn identifier(&self) -> &'static str {
        "insert_special_char"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let Ok(serialized) = xml::serialize(ctx.tree) else {
            return ctx.buffer.to_vec();
        };
        let Ok(text) = String::from_utf8(serialized) else {
            return ctx.buffer.to_vec();
        };
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return ctx.buffer.to_vec();
        }
        let idx = rand.between(0, chars.len() - 1);
        let Some(&ch) = rand.choose(&SPECIAL_CHARS) else {
            return ctx.buffer.to_vec();
        };
        let mut out: String = chars[..idx].iter().collect();
        out.push(ch);
        out.extend(&chars[idx..]);
        out.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::seeded;

    #[test]
    fn inserts_one_special_character() {
        let tree = xml::parse(b"<root><a>hi</a></root>").unwrap();
        let buffer = xml::serialize(&tree).unwrap();
        let ctx = StrategyContext {
            buffer: &buffer,
            tree: &tree,
            aux_buffer: &[],
            max_size: 4096,
        };
        let mut rand = seeded(b"special");
        let out = InsertSpecialChar.mutate(&mut rand, &ctx);
        assert_eq!(out.len(), buffer.len() + 1);
    }
}
