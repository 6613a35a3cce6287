use std::sync::Arc;

use libafl_bolts::rands::Rand;
use xmltree::XMLNode;

use super::{SeedCorpus, Strategy, StrategyContext};
use crate::rand::MutatorRand;
use crate::xml;

/// Grafts an element picked from a random seed tree onto a destination element, optionally
/// stripping its own child elements first.
pub struct InsertElement {
    corpus: Arc<SeedCorpus>,
}

impl InsertElement {
    pub fn new(corpus: Arc<SeedCorpus>) -> Self {
        Self { corpus }
    }
}

impl Strategy for InsertElement {
    fn identifier(&self) -> &'static str {
        "insert_element"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let mut tree = ctx.tree.clone();
        let Some(dst) = xml::pick_element(rand, &tree.root, false) else {
            return ctx.buffer.to_vec();
        };
        let Some(seed_tree) = self.corpus.random_seed_tree(rand) else {
            return ctx.buffer.to_vec();
        };
        let Some(src) = xml::pick_element(rand, &seed_tree.root, true) else {
            return ctx.buffer.to_vec();
        };

        let mut new_child = xml::get(&seed_tree.root, &src).clone();
        if !rand.coinflip(0.5) {
            new_child.children.retain(|n| !matches!(n, XMLNode::Element(_)));
        }

        let dst_len = xml::get(&tree.root, &dst).children.len();
        xml::insert(&mut tree.root, &dst, dst_len, XMLNode::Element(new_child));
        xml::serialize(&tree).unwrap_or_else(|_| ctx.buffer.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::seeded;

    #[test]
    fn grafts_an_element_from_the_seed_corpus() {
        let seeds = vec![b"<seed><donor attr=\"x\"><inner/></donor></seed>".to_vec()];
        let corpus = Arc::new(SeedCorpus::harvest(&seeds));
        let strategy = InsertElement::new(corpus);
        let tree = xml::parse(b"<root/>").unwrap();
        let buffer = xml::serialize(&tree).unwrap();
        let ctx = StrategyContext {
            buffer: &buffer,
            tree: &tree,
            aux_buffer: &[],
            max_size: 4096,
        };
        let mut rand = seeded(b"insert");
        let out = strategy.mutate(&mut rand, &ctx);
        let mutated = xml::parse(&out).unwrap();
        assert_eq!(mutated.root.children.len(), 1);
    }
}
