use std::sync::Arc;

use libafl_bolts::rands::Rand;

use super::{SeedCorpus, Strategy, StrategyContext};
use crate::rand::MutatorRand;
use crate::xml;

/// Replaces a random element's text with harvested seed-corpus text (never the text it
/// already had), or clears it outright.
pub struct SubstituteContent {
    corpus: Arc<SeedCorpus>,
}

impl SubstituteContent {
    pub fn new(corpus: Arc<SeedCorpus>) -> Self {
        Self { corpus }
    }
}

impl Strategy for SubstituteContent {
    fn identifier(&self) -> &'static str {
        "substitute_content"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let mut tree = ctx.tree.clone();
        let Some(path) = xml::pick_element(rand, &tree.root, false) else {
            return ctx.buffer.to_vec();
        };
        let current_text = xml::element_text(xml::get(&tree.root, &path));

        if current_text.is_empty() || rand.coinflip(0.5) {
            let candidates: Vec<String> = self
                .corpus
                .texts
                .iter()
                .filter(|t| **t != current_text)
                .cloned()
                .collect();
            let Some(new_text) = rand.choose(&candidates).cloned() else {
                return ctx.buffer.to_vec();
            };
            let text = (!new_text.is_empty()).then_some(new_text);
            xml::set_element_text(xml::get_mut(&mut tree.root, &path), text);
        } else {
            xml::set_element_text(xml::get_mut(&mut tree.root, &path), None);
        }
        xml::serialize(&tree).unwrap_or_else(|_| ctx.buffer.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::seeded;

    #[test]
    fn replaces_text_with_harvested_content_excluding_current() {
        let corpus = Arc::new(SeedCorpus {
            texts: vec!["".to_string(), "\n".to_string(), "replacement".to_string()],
            ..Default::default()
        });
        let strategy = SubstituteContent::new(corpus);
        let tree = xml::parse(b"<root><a>old</a></root>").unwrap();
        let buffer = xml::serialize(&tree).unwrap();
        let ctx = StrategyContext {
            buffer: &buffer,
            tree: &tree,
            aux_buffer: &[],
            max_size: 4096,
        };
        let mut rand = seeded(b"substitute");
        let out = strategy.mutate(&mut rand, &ctx);
        assert_ne!(out, buffer);
    }
}
