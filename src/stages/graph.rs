//! Validated stage graph.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::models::{StageDefinition, StageRole};

/// Structural problems with a stage set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("stage graph is empty")]
    Empty,

    #[error("duplicate stage id '{0}'")]
    DuplicateStage(String),

    #[error("stage graph needs exactly one dispatcher, found {0}")]
    Dispatchers(usize),

    #[error("stage graph needs exactly one aggregator, found {0}")]
    Aggregators(usize),

    #[error("stage '{stage}' depends on unknown stage '{dependency}'")]
    UnknownDependency { stage: String, dependency: String },

    #[error("dependency cycle among stages: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("dispatcher '{0}' must not depend on other stages")]
    DispatcherHasDependencies(String),

    #[error("analyzer '{analyzer}' must depend only on dispatcher '{dispatcher}'")]
    AnalyzerNotAfterDispatcher { analyzer: String, dispatcher: String },

    #[error("aggregator '{aggregator}' must run after: {}", .missing.join(", "))]
    AggregatorMissesStages {
        aggregator: String,
        missing: Vec<String>,
    },

    #[error("aggregator '{aggregator}' must not depend on '{dependency}'")]
    AggregatorUnexpectedDependency {
        aggregator: String,
        dependency: String,
    },
}

/// A directed acyclic graph of stages with one dispatcher and one aggregator.
#[derive(Debug, Clone)]
pub struct StageGraph {
    stages: Vec<StageDefinition>,
    index: HashMap<String, usize>,
    order: Vec<usize>,
}

impl StageGraph {
    pub fn new(stages: Vec<StageDefinition>) -> Result<Self, GraphError> {
        if stages.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut index = HashMap::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            if index.insert(stage.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateStage(stage.id.clone()));
            }
        }

        let role_count = |role: StageRole| stages.iter().filter(|s| s.role == role).count();
        match role_count(StageRole::Dispatcher) {
            1 => {}
            n => return Err(GraphError::Dispatchers(n)),
        }
        match role_count(StageRole::Aggregator) {
            1 => {}
            n => return Err(GraphError::Aggregators(n)),
        }

        for stage in &stages {
            if let Some(dep) = stage.depends_on.iter().find(|d| !index.contains_key(*d)) {
                return Err(GraphError::UnknownDependency {
                    stage: stage.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        let order = topological_order(&stages, &index)?;
        check_shape(&stages)?;
        Ok(Self {
            stages,
            index,
            order,
        })
    }

    /// Stages in declaration order.
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&StageDefinition> {
        self.index.get(id).map(|&i| &self.stages[i])
    }

    pub fn dispatcher(&self) -> &StageDefinition {
        self.by_role(StageRole::Dispatcher)
            .next()
            .unwrap_or(&self.stages[0])
    }

    pub fn aggregator(&self) -> &StageDefinition {
        self.by_role(StageRole::Aggregator)
            .next()
            .unwrap_or(&self.stages[0])
    }

    pub fn analyzers(&self) -> impl Iterator<Item = &StageDefinition> {
        self.by_role(StageRole::Analyzer)
    }

    /// Stages in a dependency-respecting order (declaration order breaks ties).
    pub fn topological_order(&self) -> impl Iterator<Item = &StageDefinition> {
        self.order.iter().map(|&i| &self.stages[i])
    }

    /// Not-yet-done stages whose dependencies have all finished, in declaration order.
    pub fn ready(&self, done: &HashSet<String>) -> Vec<&StageDefinition> {
        self.stages
            .iter()
            .filter(|s| !done.contains(&s.id))
            .filter(|s| s.depends_on.iter().all(|d| done.contains(d)))
            .collect()
    }

    fn by_role(&self, role: StageRole) -> impl Iterator<Item = &StageDefinition> {
        self.stages.iter().filter(move |s| s.role == role)
    }
}

/// The dispatcher has no dependencies, every analyzer depends on the
/// dispatcher alone, and the aggregator depends on exactly the analyzers
/// (on the dispatcher when there are none).
fn check_shape(stages: &[StageDefinition]) -> Result<(), GraphError> {
    let find = |role: StageRole| stages.iter().find(|s| s.role == role);
    let (Some(dispatcher), Some(aggregator)) =
        (find(StageRole::Dispatcher), find(StageRole::Aggregator))
    else {
        return Ok(());
    };

    if !dispatcher.depends_on.is_empty() {
        return Err(GraphError::DispatcherHasDependencies(dispatcher.id.clone()));
    }

    let mut upstream: HashSet<&str> = HashSet::new();
    for analyzer in stages.iter().filter(|s| s.role == StageRole::Analyzer) {
        if analyzer.depends_on != [dispatcher.id.as_str()] {
            return Err(GraphError::AnalyzerNotAfterDispatcher {
                analyzer: analyzer.id.clone(),
                dispatcher: dispatcher.id.clone(),
            });
        }
        upstream.insert(analyzer.id.as_str());
    }
    if upstream.is_empty() {
        upstream.insert(dispatcher.id.as_str());
    }

    if let Some(extra) = aggregator
        .depends_on
        .iter()
        .find(|d| !upstream.contains(d.as_str()))
    {
        return Err(GraphError::AggregatorUnexpectedDependency {
            aggregator: aggregator.id.clone(),
            dependency: extra.clone(),
        });
    }
    let declared: HashSet<&str> = aggregator.depends_on.iter().map(String::as_str).collect();
    let mut missing: Vec<&str> = upstream.difference(&declared).copied().collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(GraphError::AggregatorMissesStages {
            aggregator: aggregator.id.clone(),
            missing: missing.into_iter().map(str::to_string).collect(),
        });
    }
    Ok(())
}

/// Kahn's algorithm. Cycles are reported with the stages left unvisited.
fn topological_order(
    stages: &[StageDefinition],
    index: &HashMap<String, usize>,
) -> Result<Vec<usize>, GraphError> {
    let mut indegree: Vec<usize> = stages.iter().map(|s| s.depends_on.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); stages.len()];
    for (i, stage) in stages.iter().enumerate() {
        for dep in &stage.depends_on {
            dependents[index[dep]].push(i);
        }
    }

    let mut queue: VecDeque<usize> = (0..stages.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(stages.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &next in &dependents[i] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() != stages.len() {
        let stuck = (0..stages.len())
            .filter(|i| indegree[*i] > 0)
            .map(|i| stages[i].id.clone())
            .collect();
        return Err(GraphError::Cycle(stuck));
    }
    Ok(order)
}
