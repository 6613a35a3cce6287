use std::sync::{Arc, LazyLock};

use libafl_bolts::rands::Rand;
use regex::Regex;

use super::{SeedCorpus, Strategy, StrategyContext};
use crate::rand::{two_sorted_char_offsets, MutatorRand};
use crate::xml;

const SPECIAL_CHARS: [char; 5] = ['<', '>', '&', '\'', '"'];

static BETWEEN_ELEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">([^$]){0,2}<").unwrap());
static OPEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^/][\w:.-]*[^>]*>").unwrap());

/// The buffer-level mutator invoked when a buffer doesn't parse as XML at all. It never
/// assumes a parsable input: everything here operates on the raw decoded string (or, for
/// `flip_bit`, the raw bytes). Picked uniformly among seven operations unless the buffer is
/// too short or isn't valid UTF-8.
pub struct FallbackMutator {
    corpus: Arc<SeedCorpus>,
}

impl FallbackMutator {
    pub fn new(corpus: Arc<SeedCorpus>) -> Self {
        Self { corpus }
    }

    /// Deep-copies a random seed-corpus element and splices its serialization into `text` at
    /// a random inter-element boundary. `None` only when the seed corpus itself is empty —
    /// the one case the original mutator's `random.choice([])` would raise on.
    fn add_random_element(&self, rand: &mut MutatorRand, text: &str) -> Option<String> {
        let seed_tree = self.corpus.random_seed_tree(rand)?;
        let Some(path) = xml::pick_element(rand, &seed_tree.root, false) else {
            return Some(text.to_string());
        };
        let new_child = xml::Document {
            root: xml::get(&seed_tree.root, &path).clone(),
            doctype: None,
        };
        let Ok(new_child_bytes) = xml::serialize(&new_child) else {
            return Some(text.to_string());
        };
        let Ok(new_child_str) = String::from_utf8(new_child_bytes) else {
            return Some(text.to_string());
        };

        if text.is_empty() {
            return Some(new_child_str);
        }

        let boundaries: Vec<usize> = BETWEEN_ELEM_RE.find_iter(text).map(|m| m.start()).collect();
        let index = if let Some(&boundary) = rand.choose(&boundaries) {
            boundary + 1
        } else {
            let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
            offsets[rand.between(0, offsets.len().saturating_sub(1))]
        };
        let index = clamp_to_char_boundary(text, index);

        let mut out = String::with_capacity(text.len() + new_child_str.len());
        out.push_str(&text[..index]);
        out.push_str(&new_child_str);
        out.push_str(&text[index..]);
        Some(out)
    }
}

impl Strategy for FallbackMutator {
    fn identifier(&self) -> &'static str {
        "fallback_mutator"
    }

    fn mutate(&self, rand: &mut MutatorRand, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let Ok(text) = std::str::from_utf8(ctx.buffer) else {
            return flip_bit(rand, ctx.buffer);
        };

        let choice = if text.chars().count() < 2 { 5 } else { rand.between(0, 6) };

        let result = match choice {
            0 => Some(wrap_random_slice(rand, text, "<![CDATA[", "]]>")),
            1 => Some(wrap_random_slice(rand, text, "<!--", "-->")),
            2 => Some(insert_special_char(rand, text)),
            3 => Some(delete_random(rand, text)),
            4 => Some(delete_element(rand, text)),
            5 => self.add_random_element(rand, text),
            6 => return flip_bit(rand, ctx.buffer),
            _ => unreachable!("choice is drawn from 0..=6"),
        };

        match result {
            Some(mutated) => mutated.into_bytes(),
            None => vec![0u8],
        }
    }
}

fn wrap_random_slice(rand: &mut MutatorRand, text: &str, open: &str, close: &str) -> String {
    match two_sorted_char_offsets(rand, text) {
        Some((a, b)) => format!("{}{open}{}{close}{}", &text[..a], &text[a..b], &text[b..]),
        None => text.to_string(),
    }
}

fn insert_special_char(rand: &mut MutatorRand, text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return text.to_string();
    }
    let idx = rand.between(0, chars.len() - 1);
    let Some(&ch) = rand.choose(&SPECIAL_CHARS) else {
        return text.to_string();
    };
    let mut out: String = chars[..idx].iter().collect();
    out.push(ch);
    out.extend(&chars[idx..]);
    out
}

fn delete_random(rand: &mut MutatorRand, text: &str) -> String {
    match two_sorted_char_offsets(rand, text) {
        Some((a, b)) => format!("{}{}", &text[..a], &text[b..]),
        None => text.to_string(),
    }
}

fn delete_element(rand: &mut MutatorRand, text: &str) -> String {
    let matches: Vec<(usize, usize)> = OPEN_TAG_RE.find_iter(text).map(|m| (m.start(), m.end())).collect();
    if matches.len() <= 1 {
        return delete_random(rand, text);
    }
    let idx = rand.between(1, matches.len() - 1);
    let (start, end) = matches[idx];
    let tag_str = &text[start..end];
    let element_tag = tag_str
        .split(' ')
        .next()
        .unwrap_or(tag_str)
        .trim_matches(|c| c == '<' || c == '>');
    let self_closing = tag_str.len() >= 2 && tag_str.as_bytes()[tag_str.len() - 2] == b'/';
    let needle = format!("/{element_tag}");

    if self_closing {
        return format!("{}{}", &text[..start], &text[end..]);
    }
    let Some(relative) = text[end..].find(&needle) else {
        return format!("{}{}", &text[..start], &text[end..]);
    };
    let closing_tag = end + relative;
    match text[closing_tag..].find('>') {
        Some(gt) => {
            let closing_tag_index = closing_tag + gt + 1;
            format!("{}{}", &text[..start], &text[closing_tag_index..])
        }
        None => format!("{}{}", &text[..start], &text[end..]),
    }
}

fn flip_bit(rand: &mut MutatorRand, buffer: &[u8]) -> Vec<u8> {
    let mut out = buffer.to_vec();
    if out.is_empty() {
        return out;
    }
    let idx = rand.between(0, out.len() - 1);
    let flip = rand.between(1, 255) as u8;
    out[idx] ^= flip;
    out
}

fn clamp_to_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
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
    fn forces_add_random_element_below_two_bytes() {
        let corpus = Arc::new(SeedCorpus::harvest(&[b"<a><b/></a>".to_vec()]));
        let strategy = FallbackMutator::new(corpus);
        let tree = xml::parse(b"<a/>").unwrap();
        let buffer = b"a".to_vec();
        let mut rand = seeded(b"short");
        let out = strategy.mutate(&mut rand, &ctx(&buffer, &tree));
        assert!(!out.is_empty());
    }

    #[test]
    fn falls_back_to_bit_flip_on_invalid_utf8() {
        let corpus = Arc::new(SeedCorpus::default());
        let strategy = FallbackMutator::new(corpus);
        let tree = xml::parse(b"<a/>").unwrap();
        let buffer = vec![0xff, 0xfe, 0xfd, 0xfc];
        let mut rand = seeded(b"binary");
        let out = strategy.mutate(&mut rand, &ctx(&buffer, &tree));
        assert_eq!(out.len(), buffer.len());
        assert_ne!(out, buffer);
    }

    #[test]
    fn delete_element_removes_a_non_first_element() {
        let text = "<root><a>x</a><b>y</b><c/></root>";
        let mut rand = seeded(b"delelem");
        let out = delete_element(&mut rand, text);
        assert!(out.len() < text.len());
    }

    #[test]
    fn returns_zero_byte_sentinel_when_corpus_is_empty_and_choice_forces_add_element() {
        let corpus = Arc::new(SeedCorpus::default());
        let strategy = FallbackMutator::new(corpus);
        let tree = xml::parse(b"<a/>").unwrap();
        let buffer = b"x".to_vec();
        let mut rand = seeded(b"empty-corpus");
        let out = strategy.mutate(&mut rand, &ctx(&buffer, &tree));
        assert_eq!(out, vec![0u8]);
    }
}
