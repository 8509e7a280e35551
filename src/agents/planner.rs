//! Planner agent: turns a goal into one task per pipeline stage.
//!
//! The model is asked for a strict JSON plan. Decoding is best effort; any
//! output that cannot be read as a plan degrades to [`Plan::default_for`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{GenerationRequest, TextGenerator};
use crate::utils::json_extraction::decode_json_object;

/// Persona used for planning calls.
pub const AGENT_NAME: &str = "CEO";

/// Writing task used when a plan has none.
pub const DEFAULT_WRITER_TASK: &str = "Draft a final response for the user.";

/// Pipeline stages that receive a planned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageRole {
    #[serde(alias = "research", alias = "RESEARCH")]
    Research,
    #[serde(alias = "Develop", alias = "developer", alias = "develop")]
    Developer,
    #[serde(alias = "Write", alias = "writer", alias = "write")]
    Writer,
}

impl StageRole {
    /// Stage order within an iteration.
    pub const ORDER: [StageRole; 3] = [StageRole::Research, StageRole::Developer, StageRole::Writer];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageRole::Research => "Research",
            StageRole::Developer => "Developer",
            StageRole::Writer => "Writer",
        }
    }
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    #[serde(rename = "assigned_agent", alias = "role")]
    pub role: StageRole,
    pub description: String,
}

/// Ordered task list for a goal, at most one task per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub tasks: Vec<PlanTask>,
}

impl Plan {
    /// The three-task plan used when planning output is unusable.
    pub fn default_for(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            tasks: vec![
                PlanTask {
                    role: StageRole::Research,
                    description: format!(
                        "Research the topic and gather key facts for: {}",
                        goal
                    ),
                },
                PlanTask {
                    role: StageRole::Developer,
                    description: "Create a concise technical outline or mermaid diagram that structures the solution.".to_string(),
                },
                PlanTask {
                    role: StageRole::Writer,
                    description: "Write the final response using the research and the technical outline.".to_string(),
                },
            ],
        }
    }

    /// Description of the first task for `role`, if any.
    pub fn task_for(&self, role: StageRole) -> Option<&str> {
        self.tasks
            .iter()
            .find(|t| t.role == role)
            .map(|t| t.description.as_str())
    }

    /// Writing task, falling back to [`DEFAULT_WRITER_TASK`].
    pub fn writer_task(&self) -> &str {
        self.task_for(StageRole::Writer)
            .unwrap_or(DEFAULT_WRITER_TASK)
    }

    /// Keeps the first task per role, in stage order, dropping blank ones.
    fn normalized(self, goal: &str) -> Self {
        let tasks = StageRole::ORDER
            .iter()
            .filter_map(|role| {
                self.tasks
                    .iter()
                    .find(|t| t.role == *role && !t.description.trim().is_empty())
                    .cloned()
            })
            .collect();
        let goal = if self.goal.trim().is_empty() {
            goal.to_string()
        } else {
            self.goal
        };
        Self { goal, tasks }
    }
}

/// Tolerant shape for decoding: unknown roles are skipped rather than
/// failing the whole plan.
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    goal: String,
    #[serde(default)]
    tasks: Vec<serde_json::Value>,
}

/// Decodes model output into a plan, or `None` when it carries no usable task.
pub fn decode_plan(raw: &str, goal: &str) -> Option<Plan> {
    let parsed: RawPlan = decode_json_object(raw)?;
    let tasks: Vec<PlanTask> = parsed
        .tasks
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();
    if tasks.is_empty() {
        return None;
    }
    Some(
        Plan {
            goal: parsed.goal,
            tasks,
        }
        .normalized(goal),
    )
}

/// Prompt sent to the planning model.
pub fn plan_prompt(goal: &str) -> String {
    format!(
        r#"Break the user's goal into a strict, sequential handoff across exactly three agents.

Return ONLY valid JSON with this exact structure and ordering:

{{
    "goal": "...",
    "tasks": [
        {{"assigned_agent": "Research", "description": "..."}},
        {{"assigned_agent": "Developer", "description": "..."}},
        {{"assigned_agent": "Writer", "description": "..."}}
    ]
}}

Rules:
- EXACTLY 3 tasks, in the order Research, Developer, Writer.
- assigned_agent must be one of "Research", "Developer", "Writer".
- Research task: what to look up or summarize for the goal.
- Developer task: the technical artifact or structure needed (outline or mermaid diagram).
- Writer task: how to write the final response from the research and developer output.

User goal:
{goal}
"#
    )
}

/// Produces plans through a [`TextGenerator`].
pub struct PlannerAgent {
    generator: Arc<dyn TextGenerator>,
}

impl PlannerAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Plans `goal`. Never fails; unusable output yields the default plan.
    pub async fn create_plan(&self, goal: &str) -> Plan {
        let outcome = self
            .generator
            .generate(GenerationRequest::generation(plan_prompt(goal), AGENT_NAME))
            .await;

        let Some(raw) = outcome.text() else {
            tracing::warn!(
                outcome = outcome.label(),
                "Planner produced no text, using default plan"
            );
            return Plan::default_for(goal);
        };

        match decode_plan(raw, goal) {
            Some(plan) => {
                tracing::debug!(tasks = plan.tasks.len(), "Decoded plan");
                plan
            }
            None => {
                tracing::warn!("Planner output was not a usable plan, using default plan");
                Plan::default_for(goal)
            }
        }
    }
}
