//! Marketplace task model.
//!
//! The worker only ever holds a transient copy of a task. The marketplace
//! owns the authoritative record and its claim state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task as reported by the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Available,
    Claimed,
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Claimed => "claimed",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// A unit of work listed on the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque, unique identifier.
    pub id: String,
    /// Type tag selecting the handler.
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub title: String,
    /// Free-form handler input.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Skills a worker must declare (any one of) to claim this task. Empty means anyone.
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    /// Create an unrestricted, available task.
    pub fn new(id: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            title: String::new(),
            metadata: HashMap::new(),
            required_skills: Vec::new(),
            status: TaskStatus::Available,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_required_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_skills = skills.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a worker declaring `skills` may claim this task.
    ///
    /// Matching is exact and case-sensitive.
    pub fn matches_skills(&self, skills: &[String]) -> bool {
        self.required_skills.is_empty()
            || self.required_skills.iter().any(|s| skills.contains(s))
    }

    /// Look up a string field in the metadata.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Response body of the available-task listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unrestricted_task_matches_any_worker() {
        let task = Task::new("t1", "backend");
        assert!(task.matches_skills(&[]));
        assert!(task.matches_skills(&skills(&["rust"])));
    }

    #[test]
    fn intersecting_skills_match() {
        let task = Task::new("t1", "backend").with_required_skills(["python", "rust"]);
        assert!(task.matches_skills(&skills(&["rust"])));
        assert!(!task.matches_skills(&skills(&["go"])));
        assert!(!task.matches_skills(&[]));
    }

    #[test]
    fn skill_match_is_case_sensitive() {
        let task = Task::new("t1", "backend").with_required_skills(["Rust"]);
        assert!(!task.matches_skills(&skills(&["rust"])));
    }

    #[test]
    fn deserializes_marketplace_json() {
        let json = r#"{
            "tasks": [
                {"id": "a", "type": "devops", "title": "Deploy", "requiredSkills": ["k8s"],
                 "metadata": {"action": "deploy"}, "status": "available"},
                {"id": "b", "type": "testing"}
            ]
        }"#;
        let list: TaskList = serde_json::from_str(json).unwrap();
        assert_eq!(list.tasks.len(), 2);
        assert_eq!(list.tasks[0].required_skills, vec!["k8s".to_string()]);
        assert_eq!(list.tasks[0].metadata_str("action"), Some("deploy"));
        assert!(list.tasks[1].required_skills.is_empty());
        assert_eq!(list.tasks[1].status, TaskStatus::Available);
    }

    #[test]
    fn missing_task_array_is_empty() {
        let list: TaskList = serde_json::from_str("{}").unwrap();
        assert!(list.tasks.is_empty());
    }
}
