//! Selection policies: which stage speaks next.
//!
//! A policy looks only at the graph and the shared turn log. It never sees
//! stage buffers, so what it picks depends on who has spoken, not on what
//! they said.

use std::collections::HashSet;

use crate::models::{StageRole, Turn, TurnRole};
use crate::stages::StageGraph;

/// The next step of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Run these stages. More than one id means an interleaved batch.
    Run(Vec<String>),
    /// Nothing left to run.
    Done,
}

pub trait SelectionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn select(&self, graph: &StageGraph, log: &[Turn]) -> Selection;
}

/// Ids of stages with an assistant turn in the log.
pub fn spoken(log: &[Turn]) -> HashSet<String> {
    log.iter()
        .filter(|t| t.role == TurnRole::Assistant)
        .map(|t| t.source.clone())
        .collect()
}

/// Follows declared edges: every ready stage runs as one batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPolicy;

impl SelectionPolicy for StaticPolicy {
    fn name(&self) -> &'static str {
        "static"
    }

    fn select(&self, graph: &StageGraph, log: &[Turn]) -> Selection {
        let done = spoken(log);
        if done.contains(&graph.aggregator().id) {
            return Selection::Done;
        }
        let ready: Vec<String> = graph.ready(&done).into_iter().map(|s| s.id.clone()).collect();
        if ready.is_empty() {
            Selection::Done
        } else {
            Selection::Run(ready)
        }
    }
}

/// A pluggable pick of the next analyzer. Returning `None` or an id that is
/// not eligible falls back to the first eligible analyzer.
pub type Selector = Box<dyn Fn(&StageGraph, &[Turn]) -> Option<String> + Send + Sync>;

/// One stage per turn, chosen by a selector under fixed rules: the
/// dispatcher speaks first, every analyzer speaks exactly once, and the
/// aggregator speaks last.
pub struct DynamicPolicy {
    selector: Selector,
}

impl DynamicPolicy {
    pub fn new(selector: Selector) -> Self {
        Self { selector }
    }

    /// Picks analyzers in the order the dispatcher mentioned them.
    pub fn mention_order() -> Self {
        Self::new(Box::new(mention_selector))
    }
}

impl Default for DynamicPolicy {
    fn default() -> Self {
        Self::mention_order()
    }
}

impl std::fmt::Debug for DynamicPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicPolicy").finish_non_exhaustive()
    }
}

impl SelectionPolicy for DynamicPolicy {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn select(&self, graph: &StageGraph, log: &[Turn]) -> Selection {
        let done = spoken(log);
        let dispatcher = &graph.dispatcher().id;
        let aggregator = &graph.aggregator().id;

        if !done.contains(dispatcher) {
            return Selection::Run(vec![dispatcher.clone()]);
        }
        if done.contains(aggregator) {
            return Selection::Done;
        }

        let eligible: Vec<&str> = graph
            .ready(&done)
            .into_iter()
            .filter(|s| s.role == StageRole::Analyzer)
            .map(|s| s.id.as_str())
            .collect();

        if eligible.is_empty() {
            let pending: Vec<&str> = graph
                .analyzers()
                .filter(|s| !done.contains(&s.id))
                .map(|s| s.id.as_str())
                .collect();
            if pending.is_empty() {
                return Selection::Run(vec![aggregator.clone()]);
            }
            tracing::warn!(?pending, "no analyzer is ready; ending selection");
            return Selection::Done;
        }

        let pick = (self.selector)(graph, log);
        match pick {
            Some(id) if eligible.contains(&id.as_str()) => Selection::Run(vec![id]),
            other => {
                if let Some(id) = other {
                    tracing::debug!(pick = %id, fallback = eligible[0], "selector pick not eligible");
                }
                Selection::Run(vec![eligible[0].to_string()])
            }
        }
    }
}

/// Picks the first unspoken analyzer named in the dispatcher's output.
pub fn mention_selector(graph: &StageGraph, log: &[Turn]) -> Option<String> {
    let dispatcher = &graph.dispatcher().id;
    let text = log
        .iter()
        .rev()
        .find(|t| t.role == TurnRole::Assistant && &t.source == dispatcher)?
        .content
        .to_lowercase();
    let done = spoken(log);

    graph
        .analyzers()
        .filter(|s| !done.contains(&s.id))
        .filter_map(|s| text.find(&s.id.to_lowercase()).map(|pos| (pos, &s.id)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, id)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::builtin::builtin_stages;

    fn graph() -> StageGraph {
        StageGraph::new(builtin_stages()).unwrap()
    }

    fn run_to_completion(policy: &dyn SelectionPolicy, graph: &StageGraph) -> Vec<Vec<String>> {
        let mut log = vec![Turn::user("task")];
        let mut steps = Vec::new();
        while let Selection::Run(ids) = policy.select(graph, &log) {
            for id in &ids {
                log.push(Turn::assistant(id, format!("{id} says analyze security then memory")));
            }
            steps.push(ids);
            assert!(steps.len() < 50, "policy did not terminate");
        }
        steps
    }

    #[test]
    fn static_policy_batches_analyzers() {
        let g = graph();
        let steps = run_to_completion(&StaticPolicy, &g);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0], vec!["dispatcher"]);
        assert_eq!(steps[1].len(), 7);
        assert_eq!(steps[2], vec!["aggregator"]);
    }

    #[test]
    fn dynamic_policy_runs_each_analyzer_once() {
        let g = graph();
        let steps = run_to_completion(&DynamicPolicy::default(), &g);
        assert_eq!(steps.len(), 9);
        assert!(steps.iter().all(|s| s.len() == 1));
        assert_eq!(steps[0][0], "dispatcher");
        assert_eq!(steps[8][0], "aggregator");

        let analyzers: HashSet<_> = steps[1..8].iter().map(|s| s[0].clone()).collect();
        assert_eq!(analyzers.len(), 7);
    }

    #[test]
    fn dynamic_policy_follows_dispatcher_mentions() {
        let g = graph();
        let steps = run_to_completion(&DynamicPolicy::default(), &g);
        assert_eq!(steps[1][0], "security");
        assert_eq!(steps[2][0], "memory");
        // the rest in declaration order
        assert_eq!(steps[3][0], "static");
    }

    #[test]
    fn invalid_picks_are_replaced() {
        let g = graph();
        let policy = DynamicPolicy::new(Box::new(|_, _| Some("aggregator".to_string())));
        let steps = run_to_completion(&policy, &g);
        assert_eq!(steps[1][0], "static");
        assert_eq!(steps.last().unwrap()[0], "aggregator");
        assert_eq!(steps.len(), 9);
    }

    #[test]
    fn repeated_pick_cannot_speak_twice() {
        let g = graph();
        let policy = DynamicPolicy::new(Box::new(|_, _| Some("logic".to_string())));
        let steps = run_to_completion(&policy, &g);
        let logic_turns = steps.iter().filter(|s| s[0] == "logic").count();
        assert_eq!(logic_turns, 1);
    }
}
