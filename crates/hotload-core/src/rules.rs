//! Generic rule executor over an injected document.
//!
//! A payload that wants to act on a document describes its behaviour as a
//! list of [`Rule`]s and hands them to a [`RuleEngine`]. The engine owns the
//! bookkeeping (run-once globals, execution counters, active flag) and
//! exposes it through [`ControlSurface`]. No rule tables ship with this crate.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::activate::{ControlSurface, SurfaceStats};

/// The only capability the engine needs from a document.
pub trait Document {
    type Node;

    /// Nodes matching `selector`, in document order.
    fn query(&mut self, selector: &str) -> Vec<Self::Node>;
}

type GlobalFn<D> = Box<dyn FnMut(&mut D) -> bool + Send>;
type NodeFn<D> = Box<dyn FnMut(&mut D, &<D as Document>::Node) -> bool + Send>;

pub enum RuleKind<D: Document> {
    /// Runs against the whole document. Returns true when it applied.
    Global { run_once: bool, apply: GlobalFn<D> },
    /// Runs once per node matching `selector`.
    Selector { selector: String, apply: NodeFn<D> },
}

pub struct Rule<D: Document> {
    pub identifier: String,
    pub kind: RuleKind<D>,
}

impl<D: Document> Rule<D> {
    pub fn global(
        identifier: impl Into<String>,
        run_once: bool,
        apply: impl FnMut(&mut D) -> bool + Send + 'static,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            kind: RuleKind::Global {
                run_once,
                apply: Box::new(apply),
            },
        }
    }

    pub fn selector(
        identifier: impl Into<String>,
        selector: impl Into<String>,
        apply: impl FnMut(&mut D, &D::Node) -> bool + Send + 'static,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            kind: RuleKind::Selector {
                selector: selector.into(),
                apply: Box::new(apply),
            },
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self.kind, RuleKind::Global { .. })
    }
}

pub struct RuleEngine<D: Document> {
    version: String,
    document: D,
    rules: Vec<Rule<D>>,
    executed_globals: BTreeSet<String>,
    executions: BTreeMap<String, u64>,
    total_processed: u64,
    active: bool,
}

impl<D: Document> RuleEngine<D> {
    pub fn new(version: impl Into<String>, document: D, rules: Vec<Rule<D>>) -> Self {
        Self {
            version: version.into(),
            document,
            rules,
            executed_globals: BTreeSet::new(),
            executions: BTreeMap::new(),
            total_processed: 0,
            active: true,
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Apply every rule once. Run-once globals that already applied are
    /// skipped. Does nothing while inactive.
    pub fn process(&mut self) {
        if !self.active {
            trace!("rule engine inactive; skipping pass");
            return;
        }
        for rule in &mut self.rules {
            match &mut rule.kind {
                RuleKind::Global { run_once, apply } => {
                    if *run_once && self.executed_globals.contains(&rule.identifier) {
                        continue;
                    }
                    if apply(&mut self.document) {
                        *self.executions.entry(rule.identifier.clone()).or_default() += 1;
                        if *run_once {
                            self.executed_globals.insert(rule.identifier.clone());
                        }
                    }
                }
                RuleKind::Selector { selector, apply } => {
                    let nodes = self.document.query(selector);
                    for node in &nodes {
                        self.total_processed += 1;
                        if apply(&mut self.document, node) {
                            *self.executions.entry(rule.identifier.clone()).or_default() += 1;
                        }
                    }
                }
            }
        }
    }
}

impl<D: Document + Send> ControlSurface for RuleEngine<D> {
    fn version(&self) -> &str {
        &self.version
    }

    fn stats(&self) -> SurfaceStats {
        let global_rules_executed = self
            .rules
            .iter()
            .filter(|r| r.is_global())
            .map(|r| {
                let done = self.executed_globals.contains(&r.identifier);
                (r.identifier.clone(), done)
            })
            .collect();
        SurfaceStats {
            total_processed: self.total_processed,
            rule_executions: self.executions.clone(),
            global_rules_executed,
            active: self.active,
        }
    }

    fn reprocess(&mut self) {
        self.process();
    }

    fn cleanup(&mut self) {
        debug!(version = %self.version, "rule engine deactivated");
        self.active = false;
    }

    fn restart(&mut self) {
        self.executed_globals.clear();
        self.active = true;
        self.process();
    }

    fn execute_global_rule(&mut self, name: &str) -> bool {
        if !self.active {
            return false;
        }
        let Some(rule) = self.rules.iter_mut().find(|r| r.identifier == name) else {
            return false;
        };
        let RuleKind::Global { run_once, apply } = &mut rule.kind else {
            return false;
        };
        let applied = apply(&mut self.document);
        if applied {
            *self.executions.entry(rule.identifier.clone()).or_default() += 1;
            if *run_once {
                self.executed_globals.insert(rule.identifier.clone());
            }
        }
        applied
    }

    fn reset_global_rule(&mut self, name: &str) {
        self.executed_globals.remove(name);
    }
}
