use std::sync::LazyLock;

use regex::Regex;
use xmltree::XMLNode;

use super::{Strategy, StrategyContext};
use crate::rand::MutatorRand;
use crate::xml;

const SENTINEL: &str = "delete_this_element";

static OPEN_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<delete_this_element.*>([^$]*)</delete_this_element[^>]*>").unwrap());
static SELF_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<delete_this_element.*/>").unwrap());

/// Deletes a random non-root node. Its element children are hoisted into its own parent at
/// its former position first (keep-children mode, the Python default); the node itself —
/// along with any of its own remaining content — is then erased by renaming it to a sentinel
/// tag, serializing, and regexing the sentinel span out of the text.
pub struct DeleteRandomNode;

impl Strategy for DeleteRandomNode {
    fn identifier(&self) -> &'static str {
        "delete_random_node"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let mut tree = ctx.tree.clone();
        let Some(path) = xml::pick_element(rand, &tree.root, true) else {
            return ctx.buffer.to_vec();
        };
        let (&index, parent_path) = path.split_last().expect("exclude_root guarantees a parent");

        let hoisted: Vec<XMLNode> = xml::get_mut(&mut tree.root, &path)
            .children
            .drain(..)
            .filter(|node| matches!(node, XMLNode::Element(_)))
            .collect();
        let hoisted_len = hoisted.len();
        {
            let parent = xml::get_mut(&mut tree.root, parent_path);
            for (offset, child) in hoisted.into_iter().enumerate() {
                parent.children.insert(index + offset, child);
            }
        }

        let victim_path: Vec<usize> = parent_path
            .iter()
            .copied()
            .chain(std::iter::once(index + hoisted_len))
            .collect();
        xml::get_mut(&mut tree.root, &victim_path).name = SENTINEL.to_string();

        let Ok(serialized) = xml::serialize(&tree) else {
            return ctx.buffer.to_vec();
        };
        let Ok(text) = String::from_utf8(serialized) else {
            return ctx.buffer.to_vec();
        };
        let text = OPEN_CLOSE_RE.replace(&text, "");
        let text = SELF_CLOSE_RE.replace(&text, "");

        let Ok(reparsed) = xml::parse(text.as_bytes()) else {
            return ctx.buffer.to_vec();
        };
        xml::serialize(&reparsed).unwrap_or_else(|_| ctx.buffer.to_vec())
    }
}
