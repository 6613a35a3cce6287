use super::{Strategy, StrategyContext};
use crate::rand::{random_alnum_string, MutatorRand};
use crate::xml;

/// Replaces a random element's text content with a random alphanumeric string of 1 to 500
/// characters.
pub struct RandomizeContent;

impl Strategy for RandomizeContent {
    fn identifier(&self) -> &'static str {
        "randomize_content"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let mut tree = ctx.tree.clone();
        let Some(path) = xml::pick_element(rand, &tree.root, false) else {
            return ctx.buffer.to_vec();
        };
        let text = random_alnum_string(rand, 1, 500);
        xml::set_element_text(xml::get_mut(&mut tree.root, &path), Some(text));
        xml::serialize(&tree).unwrap_or_else(|_| ctx.buffer.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::seeded;

    #[test]
    fn replaces_text_with_random_alnum_content() {
        let tree = xml::parse(b"<root><a>old</a></root>").unwrap();
        let buffer = xml::serialize(&tree).unwrap();
        let ctx = StrategyContext {
            buffer: &buffer,
            tree: &tree,
            aux_buffer: &[],
            max_size: 4096,
        };
        let mut rand = seeded(b"randomize");
        let out = RandomizeContent.mutate(&mut rand, &ctx);
        assert_ne!(out, buffer);
    }
}
