//! Turns a strategy's raw output into a verdict: did the buffer actually change, does it still
//! parse, does it still validate — and folds that verdict into the strategy's running stats.

use crate::schema::SchemaValidator;
use crate::stats::StatsRecord;
use crate::xml;

/// Compares `pre`/`post`, updates `record` in place, and returns whichever buffer should be
/// handed back to the host. `record.execs` must already have been incremented by the caller
/// before `mutate` ran; this function only touches the success counters.
pub fn analyze(pre: &[u8], post: &[u8], max_size: usize, validator: &dyn SchemaValidator, record: &mut StatsRecord) -> Vec<u8> {
    let result = if post == pre || post.is_empty() || post.len() >= max_size {
        pre.to_vec()
    } else {
        record.successful_mut += 1;
        if let Ok(document) = xml::parse(post) {
            record.well_formed += 1;
            if validator.is_valid(&document) {
                record.saml_valid += 1;
            }
        }
        post.to_vec()
    };
    record.recompute_ratios();
    result
}
