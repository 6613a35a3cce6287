use std::sync::Arc;

use libafl_bolts::rands::Rand;
use xmltree::Element;

use super::{SeedCorpus, Strategy, StrategyContext, MAX_ATTEMPTS};
use crate::rand::{random_alnum_string, MutatorRand};
use crate::xml;

/// Adds a previously-unseen attribute harvested from the seed corpus, or removes one of the
/// target element's existing attributes.
pub struct ChangeAttribute {
    corpus: Arc<SeedCorpus>,
}

impl ChangeAttribute {
    pub fn new(corpus: Arc<SeedCorpus>) -> Self {
        Self { corpus }
    }

    fn try_add_attribute(&self, rand: &mut MutatorRand, root: &mut Element, path: &[usize]) -> bool {
        if self.corpus.attribute_keys.is_empty() {
            return false;
        }
        for _ in 0..MAX_ATTEMPTS {
            let Some(key) = rand.choose(&self.corpus.attribute_keys).cloned() else {
                return false;
            };
            let elem = xml::get_mut(root, path);
            if elem.attributes.contains_key(&key) {
                continue;
            }
            let value = if !self.corpus.attribute_values.is_empty() && rand.coinflip(0.5) {
                rand.choose(&self.corpus.attribute_values).cloned().unwrap_or_default()
            } else {
                random_alnum_string(rand, 0, 500)
            };
            elem.attributes.insert(key, value);
            return true;
        }
        false
    }

    fn remove_random_attribute(rand: &mut MutatorRand, root: &mut Element, path: &[usize]) -> bool {
        let elem = xml::get_mut(root, path);
        if elem.attributes.is_empty() {
            return false;
        }
        let keys: Vec<String> = elem.attributes.keys().cloned().collect();
        let Some(key) = rand.choose(&keys) else {
            return false;
        };
        elem.attributes.remove(key);
        true
    }
}

impl Strategy for ChangeAttribute {
    fn identifier(&self) -> &'static str {
        "change_attribute"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let mut tree = ctx.tree.clone();
        let Some(path) = xml::pick_element(rand, &tree.root, false) else {
            return ctx.buffer.to_vec();
        };
        let has_no_attributes = xml::get(&tree.root, &path).attributes.is_empty();
        let mutated = if has_no_attributes || rand.coinflip(0.5) {
            self.try_add_attribute(rand, &mut tree.root, &path)
        } else {
            Self::remove_random_attribute(rand, &mut tree.root, &path)
        };
        if !mutated {
            return ctx.buffer.to_vec();
        }
        xml::serialize(&tree).unwrap_or_else(|_| ctx.buffer.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::seeded;

    #[test]
    fn adds_harvested_attribute_when_none_present() {
        let corpus = Arc::new(SeedCorpus {
            attribute_keys: vec!["id".into()],
            attribute_values: vec!["abc".into()],
            ..Default::default()
        });
        let strategy = ChangeAttribute::new(corpus);
        let tree = xml::parse(b"<root><a/></root>").unwrap();
        let buffer = xml::serialize(&tree).unwrap();
        let ctx = StrategyContext {
            buffer: &buffer,
            tree: &tree,
            aux_buffer: &[],
            max_size: 4096,
        };
        let mut rand = seeded(b"attr");
        let out = strategy.mutate(&mut rand, &ctx);
        assert!(String::from_utf8(out).unwrap().contains("id="));
    }

    #[test]
    fn removes_an_existing_attribute() {
        let mut tree = xml::parse(br#"<root a="1"/>"#).unwrap();
        let mut rand = seeded(b"remove");
        assert!(ChangeAttribute::remove_random_attribute(&mut rand, &mut tree.root, &[]));
        assert!(tree.root.attributes.is_empty());
    }
}
