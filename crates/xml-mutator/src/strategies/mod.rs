//! The mutation strategy portfolio: twelve structural/textual perturbations plus a
//! buffer-level fallback, each grounded on its namesake in the original mutator plugin set.

mod change_attribute;
mod change_reference;
mod copy_subtree;
mod delete_random_node;
mod insert_cdata;
mod insert_comment;
mod insert_dtd;
mod insert_element;
mod insert_special_char;
mod move_subtree;
mod randomize_content;
mod substitute_content;

pub mod fallback_mutator;

pub use change_attribute::ChangeAttribute;
pub use change_reference::ChangeReference;
pub use copy_subtree::CopySubtree;
pub use delete_random_node::DeleteRandomNode;
pub use fallback_mutator::FallbackMutator;
pub use insert_cdata::InsertCdata;
pub use insert_comment::InsertComment;
pub use insert_dtd::InsertDtd;
pub use insert_element::InsertElement;
pub use insert_special_char::InsertSpecialChar;
pub use move_subtree::MoveSubtree;
pub use randomize_content::RandomizeContent;
pub use substitute_content::SubstituteContent;

use std::sync::Arc;

use libafl_bolts::rands::Rand;

use crate::rand::MutatorRand;
use crate::xml::{self, Document};

/// Everything a strategy needs to look at, in addition to its own harvested seed state.
pub struct StrategyContext<'a> {
    pub buffer: &'a [u8],
    pub tree: &'a Document,
    pub aux_buffer: &'a [u8],
    pub max_size: usize,
}

/// A mutation strategy. `mutate` returns the input buffer unchanged when it can't find a
/// suitable target within its attempt budget — the analyzer treats an unchanged
/// buffer as a no-op, so strategies never need a separate "I gave up" signal. For a genuine
/// internal failure (not "no target found", but "this mutation is structurally impossible"),
/// return [`MUTATION_FAILED`] instead: the dispatcher recognizes it and returns it straight to
/// the host, bypassing the analyzer and the fallback path entirely, the same outcome a thrown
/// exception gets in the original plugin.
pub trait Strategy: Send + Sync {
    fn identifier(&self) -> &'static str;
    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8>;
}

/// Sentinel a strategy returns to signal an unrecoverable internal failure, as opposed to an
/// ordinary "found nothing to mutate" no-op. Shares the same single-zero-byte encoding the host
/// ABI defines for "no usable mutation" (spec'd AFL++ surface), so the dispatcher can recognize
/// it with a plain equality check rather than a distinct `Result` variant threaded through every
/// strategy.
pub const MUTATION_FAILED: [u8; 1] = [0u8];

/// Seed-corpus-derived state shared by the strategies that need more than the current input:
/// harvested attribute keys/values, whole parsed seed trees, and harvested text content.
#[derive(Debug, Default)]
pub struct SeedCorpus {
    pub attribute_keys: Vec<String>,
    pub attribute_values: Vec<String>,
    pub seed_trees: Vec<Document>,
    pub texts: Vec<String>,
}

impl SeedCorpus {
    /// Builds the harvested corpus from raw seed file contents. Files that fail to parse are
    /// skipped — they still contribute nothing but don't abort corpus construction, since a
    /// single malformed seed shouldn't take down `init`.
    pub fn harvest(seed_files: &[Vec<u8>]) -> SeedCorpus {
        let mut corpus = SeedCorpus {
            texts: vec![String::new(), "\n".to_string()],
            ..Default::default()
        };
        for bytes in seed_files {
            let Ok(doc) = xml::parse(bytes) else {
                continue;
            };
            for path in xml::enumerate_elements(&doc.root) {
                let elem = xml::get(&doc.root, &path);
                for (key, value) in &elem.attributes {
                    corpus.attribute_keys.push(key.clone());
                    corpus.attribute_values.push(value.clone());
                }
                let text = xml::element_text(elem);
                if !text.is_empty() {
                    corpus.texts.push(text);
                }
            }
            corpus.seed_trees.push(doc);
        }
        corpus.attribute_keys.sort();
        corpus.attribute_keys.dedup();
        corpus.attribute_values.sort();
        corpus.attribute_values.dedup();
        corpus.texts.sort();
        corpus.texts.dedup();
        corpus
    }

    /// A random previously-parsed seed tree, deep-cloned so callers can mutate their copy
    /// freely.
    pub fn random_seed_tree(&self, rand: &mut impl Rand) -> Option<Document> {
        rand.choose(&self.seed_trees).cloned()
    }
}

/// Constructs the full weighted portfolio (fallback excluded — it's invoked separately, not
/// selected by weight).
pub fn default_portfolio(corpus: Arc<SeedCorpus>) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(ChangeAttribute::new(corpus.clone())),
        Box::new(ChangeReference),
        Box::new(CopySubtree),
        Box::new(DeleteRandomNode),
        Box::new(InsertCdata),
        Box::new(InsertComment),
        Box::new(InsertDtd),
        Box::new(InsertElement::new(corpus.clone())),
        Box::new(InsertSpecialChar),
        Box::new(MoveSubtree),
        Box::new(RandomizeContent),
        Box::new(SubstituteContent::new(corpus)),
    ]
}

/// Bounded random retry helper shared by every strategy that needs "up to 20 attempts, else
/// give up" within the shared attempt budget.
pub const MAX_ATTEMPTS: usize = 20;

/// Wraps a random slice of the serialized document between `open`/`close` at two sorted
/// random offsets. Shared by `insert_cdata` and `insert_comment`'s whole-document branch.
pub(super) fn wrap_random_slice(
    rand: &mut MutatorRand,
    tree: &Document,
    ctx: &StrategyContext<'_>,
    open: &str,
    close: &str,
) -> Vec<u8> {
    let Ok(serialized) = xml::serialize(tree) else {
        return ctx.buffer.to_vec();
    };
    let Ok(text) = String::from_utf8(serialized) else {
        return ctx.buffer.to_vec();
    };
    let Some((a, b)) = crate::rand::two_sorted_char_offsets(rand, &text) else {
        return ctx.buffer.to_vec();
    };
    let mut out = String::with_capacity(text.len() + open.len() + close.len());
    out.push_str(&text[..a]);
    out.push_str(open);
    out.push_str(&text[a..b]);
    out.push_str(close);
    out.push_str(&text[b..]);
    out.into_bytes()
}
