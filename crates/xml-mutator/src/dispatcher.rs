//! Ties the strategy portfolio, stats, stage controller, and persistence together behind a
//! single `fuzz` call — the in-process counterpart of the host ABI's hot path.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::analyzer;
use crate::controller::ControllerState;
use crate::metrics::Metric;
use crate::rand::{self, MutatorRand};
use crate::schema::SchemaValidator;
use crate::stats::StatsMap;
use crate::strategies::{FallbackMutator, Strategy, StrategyContext};
use crate::xml;

const BACKUP_INTERVAL: Duration = Duration::from_secs(600);

/// Returned in place of a successful mutation whenever a strategy panics or a buffer can't be
/// produced at all — the mutator never aborts the host.
const NO_MUTATION: [u8; 1] = crate::strategies::MUTATION_FAILED;

pub struct Mutator {
    strategies: Vec<Box<dyn Strategy>>,
    index_by_id: HashMap<String, usize>,
    fallback: FallbackMutator,
    metrics: Vec<Box<dyn Metric>>,
    validator: Box<dyn SchemaValidator>,
    rand: MutatorRand,
    stats: StatsMap,
    controller: ControllerState,
}

impl Mutator {
    pub fn new(
        strategies: Vec<Box<dyn Strategy>>,
        fallback: FallbackMutator,
        metrics: Vec<Box<dyn Metric>>,
        validator: Box<dyn SchemaValidator>,
        rand: MutatorRand,
        stats: StatsMap,
        controller: ControllerState,
    ) -> Self {
        let index_by_id = strategies
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.identifier().to_string(), idx))
            .collect();
        Self {
            strategies,
            index_by_id,
            fallback,
            metrics,
            validator,
            rand,
            stats,
            controller,
        }
    }

    pub fn stats(&self) -> &StatsMap {
        &self.stats
    }

    pub fn last_mutation(&self) -> &str {
        &self.controller.last_mutation
    }

    pub fn backup_dir(&self) -> &std::path::Path {
        &self.controller.paths.backup_dir
    }

    /// The host-facing mutation call. Never panics across the boundary: strategy failures and
    /// missing mutation targets alike collapse to a defined result.
    pub fn fuzz(&mut self, buffer: &[u8], aux_buffer: &[u8], max_size: usize) -> Vec<u8> {
        let now = Instant::now();

        if self.controller.due_for_backup(now, BACKUP_INTERVAL) {
            if let Err(err) = crate::persistence::backup(self.backup_dir(), &self.stats, &self.controller) {
                warn!(%err, "periodic backup failed");
            }
            self.controller.last_backup = now;
        }

        if self.controller.due_for_stage_transition(now) {
            self.run_stage_controller();
            self.controller.start_time = now;
        }

        let Ok(tree) = xml::parse(buffer) else {
            return self.invoke_fallback(buffer, aux_buffer, max_size);
        };

        let has_child_elements = tree
            .root
            .children
            .iter()
            .any(|child| matches!(child, xmltree::XMLNode::Element(_)));

        let strategy_idx = if !has_child_elements {
            self.index_by_id.get("insert_element").copied()
        } else {
            self.select_weighted()
        };

        let Some(idx) = strategy_idx else {
            return self.invoke_fallback(buffer, aux_buffer, max_size);
        };

        let identifier = self.strategies[idx].identifier().to_string();
        self.controller.last_mutation = identifier.clone();
        let record = self.stats.entry(identifier.clone()).or_default();
        record.execs += 1;

        let ctx = StrategyContext {
            buffer,
            tree: &tree,
            aux_buffer,
            max_size,
        };
        let mutated = self.run_strategy(idx, &ctx);

        // A strategy-internal failure (panic, or a deliberate `MUTATION_FAILED` sentinel for a
        // structurally impossible mutation) is returned to the host as-is: it never reaches the
        // analyzer, so it can't be misread as a genuine-but-malformed mutation, and it never
        // falls through to the fallback mutator, matching the original plugin's top-level
        // exception handler around the strategy call.
        if mutated == NO_MUTATION {
            return mutated;
        }

        let record = self.stats.entry(identifier).or_default();
        let result = analyzer::analyze(buffer, &mutated, max_size, self.validator.as_ref(), record);

        if result == buffer {
            return self.invoke_fallback(buffer, aux_buffer, max_size);
        }
        result
    }

    fn select_weighted(&mut self) -> Option<usize> {
        let weights: Vec<f64> = self
            .strategies
            .iter()
            .map(|s| self.controller.prob_dist.get(s.identifier()).copied().unwrap_or(1.0))
            .collect();
        rand::weighted_index(&mut self.rand, &weights)
    }

    fn run_strategy(&mut self, idx: usize, ctx: &StrategyContext<'_>) -> Vec<u8> {
        let strategy = &self.strategies[idx];
        let rand = &mut self.rand;
        match panic::catch_unwind(AssertUnwindSafe(|| strategy.mutate(rand, ctx))) {
            Ok(bytes) => bytes,
            Err(_) => {
                warn!(identifier = strategy.identifier(), "strategy panicked, returning no-op sentinel");
                NO_MUTATION.to_vec()
            }
        }
    }

    fn invoke_fallback(&mut self, buffer: &[u8], aux_buffer: &[u8], max_size: usize) -> Vec<u8> {
        self.controller.last_mutation = self.fallback.identifier().to_string();
        let record = self.stats.entry(self.fallback.identifier().to_string()).or_default();
        record.execs += 1;

        let empty_tree = xml::Document {
            root: xmltree::Element::new("placeholder"),
            doctype: None,
        };
        let ctx = StrategyContext {
            buffer,
            tree: &empty_tree,
            aux_buffer,
            max_size,
        };
        let rand = &mut self.rand;
        let fallback = &self.fallback;
        let mutated = match panic::catch_unwind(AssertUnwindSafe(|| fallback.mutate(rand, &ctx))) {
            Ok(bytes) => bytes,
            Err(_) => {
                warn!("fallback mutator panicked, returning no-op sentinel");
                NO_MUTATION.to_vec()
            }
        };

        let record = self.stats.entry(self.fallback.identifier().to_string()).or_default();
        analyzer::analyze(buffer, &mutated, max_size, self.validator.as_ref(), record)
    }

    fn run_stage_controller(&mut self) {
        debug!(stage_duration = ?self.controller.stage_duration, "running stage controller");
        for metric in &self.metrics {
            let weights = metric.evaluate(&self.controller, &self.stats);
            let duration = metric.stage_duration(self.controller.stage_duration, &self.controller, &self.stats);
            self.controller.prob_dist = weights;
            self.controller.stage_duration = duration;
        }
        info!(stage_duration = ?self.controller.stage_duration, "stage transition complete");
    }

    /// `describe(max_len)`: the last dispatched strategy's identifier, truncated to `max_len`
    /// bytes.
    pub fn describe(&self, max_len: usize) -> Vec<u8> {
        let bytes = self.controller.last_mutation.as_bytes();
        bytes[..bytes.len().min(max_len)].to_vec()
    }

    /// `introspection()`: records that the last mutation led to a new find and returns its
    /// identifier.
    pub fn introspection(&mut self) -> Vec<u8> {
        let identifier = self.controller.last_mutation.clone();
        self.stats.entry(identifier.clone()).or_default().new_finds += 1;
        if let Some(record) = self.stats.get_mut(&identifier) {
            record.recompute_ratios();
        }
        identifier.into_bytes()
    }

    /// `deinit()`: logs final stats and snapshots state one last time.
    pub fn deinit(&mut self) {
        info!(stats = ?self.stats, "mutator shutting down");
        if let Err(err) = crate::persistence::backup(self.backup_dir(), &self.stats, &self.controller) {
            warn!(%err, "final backup failed");
        }
    }
}
