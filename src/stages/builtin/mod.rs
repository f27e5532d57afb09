//! Built-in stage registry.
//!
//! Stage instructions are embedded via `include_str!` so they ship with the binary.

use crate::models::StageDefinition;
use crate::stages::parser;

const DISPATCHER_MD: &str = include_str!("dispatcher.md");
const STATIC_MD: &str = include_str!("static.md");
const LOGIC_MD: &str = include_str!("logic.md");
const MEMORY_MD: &str = include_str!("memory.md");
const SECURITY_MD: &str = include_str!("security.md");
const PERFORMANCE_MD: &str = include_str!("performance.md");
const MAINTAINABILITY_MD: &str = include_str!("maintainability.md");
const ARCHITECTURE_MD: &str = include_str!("architecture.md");
const AGGREGATOR_MD: &str = include_str!("aggregator.md");

/// Built-in stage ids in declaration order.
const BUILTIN_IDS: &[&str] = &[
    "dispatcher",
    "static",
    "logic",
    "memory",
    "security",
    "performance",
    "maintainability",
    "architecture",
    "aggregator",
];

/// Get a built-in stage definition by id.
pub fn get_builtin(id: &str) -> Option<StageDefinition> {
    let md = match id {
        "dispatcher" => DISPATCHER_MD,
        "static" => STATIC_MD,
        "logic" => LOGIC_MD,
        "memory" => MEMORY_MD,
        "security" => SECURITY_MD,
        "performance" => PERFORMANCE_MD,
        "maintainability" => MAINTAINABILITY_MD,
        "architecture" => ARCHITECTURE_MD,
        "aggregator" => AGGREGATOR_MD,
        _ => return None,
    };

    parser::parse_stage_definition(md).ok()
}

/// List all built-in stage ids.
pub fn list_builtin_ids() -> Vec<&'static str> {
    BUILTIN_IDS.to_vec()
}

/// Every built-in stage, in declaration order.
pub fn builtin_stages() -> Vec<StageDefinition> {
    BUILTIN_IDS.iter().filter_map(|id| get_builtin(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StageRole;

    #[test]
    fn all_builtins_parse() {
        for id in BUILTIN_IDS {
            let stage = get_builtin(id)
                .unwrap_or_else(|| panic!("built-in stage '{id}' failed to parse"));
            assert_eq!(stage.id, *id);
            assert!(!stage.instructions.is_empty());
            assert!(!stage.description.is_empty());
        }
    }

    #[test]
    fn builtin_roles() {
        let stages = builtin_stages();
        assert_eq!(stages.len(), 9);
        let count = |role: StageRole| stages.iter().filter(|s| s.role == role).count();
        assert_eq!(count(StageRole::Dispatcher), 1);
        assert_eq!(count(StageRole::Analyzer), 7);
        assert_eq!(count(StageRole::Aggregator), 1);
        assert!(
            stages
                .iter()
                .filter(|s| s.role == StageRole::Analyzer)
                .all(|s| s.tools && s.depends_on == vec!["dispatcher"])
        );
    }

    #[test]
    fn aggregator_depends_on_every_analyzer() {
        let agg = get_builtin("aggregator").unwrap();
        assert_eq!(agg.depends_on.len(), 7);
        assert!(agg.depends_on.contains(&"security".to_string()));
    }

    #[test]
    fn unknown_builtin_returns_none() {
        assert!(get_builtin("nonexistent").is_none());
    }
}
