use libafl_bolts::rands::Rand;

use super::{Strategy, StrategyContext};
use crate::rand::MutatorRand;
use crate::xml;

const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Repoints an xmldsig `Reference`'s `URI` attribute to a different `#ID` found in the
/// document.
pub struct ChangeReference;

impl Strategy for ChangeReference {
    fn identifier(&self) -> &'static str {
        "change_reference"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let mut tree = ctx.tree.clone();
        let references = xml::find_by_qualified_name(&tree.root, XMLDSIG_NS, "Reference");
        let Some(path) = rand.choose(references) else {
            return ctx.buffer.to_vec();
        };

        let mut candidates = xml::harvest_id_references(&tree.root);
        let current_uri = xml::get(&tree.root, &path).attributes.get("URI").cloned();
        if let Some(current) = &current_uri {
            candidates.retain(|candidate| candidate != current);
        }
        let Some(new_uri) = rand.choose(&candidates).cloned() else {
            return ctx.buffer.to_vec();
        };

        xml::get_mut(&mut tree.root, &path)
            .attributes
            .insert("URI".to_string(), new_uri);
        xml::serialize(&tree).unwrap_or_else(|_| ctx.buffer.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::seeded;

    fn ctx<'a>(buffer: &'a [u8], tree: &'a xml::Document) -> StrategyContext<'a> {
        StrategyContext {
            buffer,
            tree,
            aux_buffer: &[],
            max_size: 4096,
        }
    }

    #[test]
    fn repoints_uri_to_a_different_id() {
        let xml = br##"<root xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
            <a ID="one"/>
            <b ID="two"/>
            <ds:Reference URI="#one"/>
        </root>"##;
        let tree = xml::parse(xml).unwrap();
        let buffer = xml::serialize(&tree).unwrap();
        let mut rand = seeded(b"reference");
        let strategy = ChangeReference;
        let out = strategy.mutate(&mut rand, &ctx(&buffer, &tree));
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("URI=\"#two\""));
    }

    #[test]
    fn leaves_buffer_unchanged_without_a_reference() {
        let tree = xml::parse(b"<root/>").unwrap();
        let buffer = xml::serialize(&tree).unwrap();
        let mut rand = seeded(b"none");
        let strategy = ChangeReference;
        assert_eq!(strategy.mutate(&mut rand, &ctx(&buffer, &tree)), buffer);
    }
}
