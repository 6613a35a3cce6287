use super::{Strategy, StrategyContext, MAX_ATTEMPTS};
use crate::rand::MutatorRand;
use crate::xml;

/// Detaches a random non-root subtree and reattaches it under a different, non-descendant
/// element.
pub struct MoveSubtree;

impl Strategy for MoveSubtree {
    fn identifier(&self) -> &'static str {
        "move_subtree"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let mut tree = ctx.tree.clone();
        let mut found = None;
        for _ in 0..MAX_ATTEMPTS {
            let Some(src) = xml::pick_element(rand, &tree.root, true) else {
                continue;
            };
            let Some(dst) = xml::pick_element(rand, &tree.root, false) else {
                continue;
            };
            if dst != src && !xml::is_descendant_of(&src, &dst) {
                found = Some((src, dst));
                break;
            }
        }
        let Some((src, dst)) = found else {
            return ctx.buffer.to_vec();
        };
        let Some(node) = xml::remove(&mut tree.root, &src) else {
            return ctx.buffer.to_vec();
        };
        let dst = xml::adjust_path_after_removal(&src, &dst);
        let dst_len = xml::get(&tree.root, &dst).children.len();
        xml::insert(&mut tree.root, &dst, dst_len, node);
        xml::serialize(&tree).unwrap_or_else(|_| ctx.buffer.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::seeded;

    #[test]
    fn moves_a_subtree_under_a_different_parent() {
        let tree = xml::parse(b"<root><a/><b><c/></b></root>").unwrap();
        let buffer = xml::serialize(&tree).unwrap();
        let ctx = StrategyContext {
            buffer: &buffer,
            tree: &tree,
            aux_buffer: &[],
            max_size: 4096,
        };
        let mut rand = seeded(b"move");
        let out = MoveSubtree.mutate(&mut rand, &ctx);
        let mutated = xml::parse(&out).unwrap();
        let before = xml::enumerate_elements(&tree.root).len();
        let after = xml::enumerate_elements(&mutated.root).len();
        assert_eq!(before, after);
    }
}
