use xmltree::XMLNode;

use super::{Strategy, StrategyContext, MAX_ATTEMPTS};
use crate::rand::MutatorRand;
use crate::xml;

/// Deep-copies a random subtree and appends it as the last child of another (possibly the
/// root) element.
pub struct CopySubtree;

impl Strategy for CopySubtree {
    fn identifier(&self) -> &'static str {
        "copy_subtree"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let mut tree = ctx.tree.clone();
        for _ in 0..MAX_ATTEMPTS {
            let Some(src) = xml::pick_element(rand, &tree.root, true) else {
                return ctx.buffer.to_vec();
            };
            let Some(dst) = xml::pick_element(rand, &tree.root, false) else {
                return ctx.buffer.to_vec();
            };
            if src == dst {
                continue;
            }
            let cloned = xml::get(&tree.root, &src).clone();
            let dst_len = xml::get(&tree.root, &dst).children.len();
            xml::insert(&mut tree.root, &dst, dst_len, XMLNode::Element(cloned));
            return xml::serialize(&tree).unwrap_or_else(|_| ctx.buffer.to_vec());
        }
        ctx.buffer.to_vec()
    }
}
