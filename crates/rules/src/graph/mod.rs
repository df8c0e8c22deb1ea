//! Rule arena and precondition-driven evaluation.
//!
//! Rules live in a flat `Vec` and refer to their preconditions by index.
//! One pass evaluates each rule at most once: results are cached as
//! `Rc<RuleState>` until [`RuleGraph::reset`]. Cycles are broken by
//! tracking the current evaluation path.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use hauswatch_core::Model;
use tracing::{debug, warn};

use crate::capabilities::{CapabilityContext, CapabilityRegistry};
use crate::evaluator::{evaluate_expression, is_externally_visible, RuleState};
use crate::schema::{Expression, RuleKind, RuleSpec};

/// A rule spec with its expression classified and preconditions resolved.
#[derive(Debug, Clone)]
pub struct Rule {
    pub spec: RuleSpec,
    pub expression: Expression,
    /// Indices of rules that must all be ok.
    pub and_rules: Vec<usize>,
    /// Indices of rules of which one must be ok.
    pub or_rules: Vec<usize>,
}

impl Rule {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn kind(&self) -> RuleKind {
        self.expression.kind()
    }

    /// Whether the rule is tracked, snapshotted and annotated.
    pub fn is_visible(&self) -> bool {
        is_externally_visible(self.kind(), self.spec.invisible)
    }
}

/// The rule graph for one rule set.
#[derive(Debug, Default)]
pub struct RuleGraph {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    /// Per-pass results, parallel to `rules`.
    cache: Vec<Option<Rc<RuleState>>>,
}

impl RuleGraph {
    /// Build the arena from specs.
    ///
    /// Specs whose expression does not classify, and repeated names, are
    /// left out. Precondition names that do not resolve are dropped.
    pub fn build(specs: &[RuleSpec]) -> Self {
        let mut graph = RuleGraph::default();

        for spec in specs {
            if graph.index.contains_key(&spec.name) {
                warn!(rule = %spec.name, "duplicate rule name in graph, keeping first");
                continue;
            }
            let expression = match Expression::parse(&spec.expression) {
                Ok(e) => e,
                Err(e) => {
                    warn!(rule = %spec.name, error = %e, "leaving unclassifiable rule out of graph");
                    continue;
                }
            };
            graph.index.insert(spec.name.clone(), graph.rules.len());
            graph.rules.push(Rule {
                spec: spec.clone(),
                expression,
                and_rules: Vec::new(),
                or_rules: Vec::new(),
            });
        }

        for i in 0..graph.rules.len() {
            let and_rules = graph.resolve(i, &graph.rules[i].spec.required_true);
            let or_rules = graph.resolve(i, &graph.rules[i].spec.or_rules);
            graph.rules[i].and_rules = and_rules;
            graph.rules[i].or_rules = or_rules;
        }

        graph.cache = vec![None; graph.rules.len()];
        graph
    }

    fn resolve(&self, rule: usize, names: &BTreeSet<String>) -> Vec<usize> {
        names
            .iter()
            .filter_map(|name| match self.index.get(name) {
                Some(&i) => Some(i),
                None => {
                    warn!(rule = %self.rules[rule].name(), precondition = %name, "unresolved precondition dropped");
                    None
                }
            })
            .collect()
    }

    /// Forget every cached result.
    pub fn reset(&mut self) {
        self.cache.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.index.get(name).map(|&i| &self.rules[i])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate one rule by name, reusing results cached this pass.
    pub fn evaluate(
        &mut self,
        name: &str,
        model: &dyn Model,
        registry: &CapabilityRegistry,
        ctx: &CapabilityContext,
    ) -> Option<Rc<RuleState>> {
        let idx = *self.index.get(name)?;
        let mut path = Vec::new();
        Some(self.evaluate_index(idx, model, registry, ctx, &mut path))
    }

    /// Reset, then evaluate every rule.
    pub fn evaluate_all(
        &mut self,
        model: &dyn Model,
        registry: &CapabilityRegistry,
        ctx: &CapabilityContext,
    ) -> BTreeMap<String, Rc<RuleState>> {
        self.reset();
        let mut states = BTreeMap::new();
        for idx in 0..self.rules.len() {
            let mut path = Vec::new();
            let state = self.evaluate_index(idx, model, registry, ctx, &mut path);
            states.insert(self.rules[idx].name().to_string(), state);
        }
        states
    }

    fn evaluate_index(
        &mut self,
        idx: usize,
        model: &dyn Model,
        registry: &CapabilityRegistry,
        ctx: &CapabilityContext,
        path: &mut Vec<usize>,
    ) -> Rc<RuleState> {
        if path.contains(&idx) {
            return Rc::new(self.cycle_state(idx, path));
        }
        if let Some(state) = &self.cache[idx] {
            return Rc::clone(state);
        }

        path.push(idx);
        let preconditions_hold = self.preconditions_hold(idx, model, registry, ctx, path);
        path.pop();

        let rule = &self.rules[idx];
        let state = if preconditions_hold {
            evaluate_expression(
                rule.name(),
                &rule.expression,
                &rule.spec.sensor_names,
                model,
                registry,
                ctx,
            )
        } else {
            debug!(rule = %rule.name(), "preconditions failed, expression skipped");
            RuleState::violated(rule.spec.sensor_names.clone())
        };

        let state = Rc::new(state);
        self.cache[idx] = Some(Rc::clone(&state));
        state
    }

    /// AND-set all ok (short-circuit), then OR-set vacuous or one ok.
    fn preconditions_hold(
        &mut self,
        idx: usize,
        model: &dyn Model,
        registry: &CapabilityRegistry,
        ctx: &CapabilityContext,
        path: &mut Vec<usize>,
    ) -> bool {
        let and_rules = self.rules[idx].and_rules.clone();
        for dep in and_rules {
            if !self.evaluate_index(dep, model, registry, ctx, path).ok {
                return false;
            }
        }

        let or_rules = self.rules[idx].or_rules.clone();
        if or_rules.is_empty() {
            return true;
        }
        for dep in or_rules {
            if self.evaluate_index(dep, model, registry, ctx, path).ok {
                return true;
            }
        }
        false
    }

    /// Synthetic violated state for a rule reached again on its own path.
    ///
    /// Not cached: a path that does not loop may still resolve it.
    fn cycle_state(&self, idx: usize, path: &[usize]) -> RuleState {
        let chain: Vec<&str> = path.iter().map(|&i| self.rules[i].name()).collect();
        warn!(rule = %self.rules[idx].name(), chain = ?chain, "precondition cycle detected");

        let mut sensors = self.rules[idx].spec.sensor_names.clone();
        for &i in path {
            sensors.extend(self.rules[i].spec.sensor_names.iter().cloned());
        }
        RuleState::violated(sensors)
    }
}
