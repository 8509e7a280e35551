//! Research, Developer and Writer agents.
//!
//! Each agent wraps exactly one gateway call. The brief builders are public
//! so the pipeline (and its tests) can see exactly what a stage receives.

use std::sync::Arc;

use crate::llm::{GenerationOutcome, GenerationRequest, TextGenerator};

use super::planner::StageRole;

/// Header that introduces re-verification items in a research brief.
pub const FEEDBACK_HEADER: &str =
    "Previous hallucination issues found - please research these thoroughly:";

/// Research brief, with prior hallucination findings appended verbatim.
pub fn research_brief(task: &str, feedback_issues: &[String]) -> String {
    if feedback_issues.is_empty() {
        return task.to_string();
    }
    let items: Vec<String> = feedback_issues
        .iter()
        .map(|issue| format!("- {}", issue))
        .collect();
    format!("{}\n\n{}\n{}", task, FEEDBACK_HEADER, items.join("\n"))
}

/// Developer brief, with the latest research as context when present.
pub fn developer_brief(task: &str, research: Option<&str>) -> String {
    match research {
        Some(research) if !research.trim().is_empty() => format!(
            "{}\n\nContext from Research (use if helpful):\n{}",
            task, research
        ),
        _ => task.to_string(),
    }
}

/// Writer brief combining the goal, the writing task and both prior outputs.
pub fn writer_brief(
    goal: &str,
    task: &str,
    research: Option<&str>,
    developer: Option<&str>,
) -> String {
    format!(
        "User goal:\n{}\n\nWriting task:\n{}\n\nResearch output (authoritative context):\n{}\n\nDeveloper output (technical artifacts):\n{}\n",
        goal,
        task.trim(),
        research.unwrap_or("None"),
        developer.unwrap_or("None"),
    )
}

/// An agent that answers a text brief with one generation call.
pub struct StageAgent {
    role: StageRole,
    generator: Arc<dyn TextGenerator>,
}

impl StageAgent {
    pub fn new(role: StageRole, generator: Arc<dyn TextGenerator>) -> Self {
        Self { role, generator }
    }

    /// Runs the brief through the gateway under this agent's persona.
    ///
    /// Text carrying a sentinel token is reported as that sentinel.
    pub async fn run(&self, brief: String) -> GenerationOutcome {
        let outcome = match self
            .generator
            .generate(GenerationRequest::generation(brief, self.role.as_str()))
            .await
        {
            GenerationOutcome::Success { text } => GenerationOutcome::from_text(text),
            other => other,
        };
        tracing::debug!(
            role = %self.role,
            outcome = outcome.label(),
            "Stage call finished"
        );
        outcome
    }
}

/// Gathers facts for the goal.
pub struct ResearchAgent(StageAgent);

impl ResearchAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self(StageAgent::new(StageRole::Research, generator))
    }

    pub async fn research(&self, task: &str, feedback_issues: &[String]) -> GenerationOutcome {
        self.0
            .run(format!(
                "Summarize the key facts for:\n{}",
                research_brief(task, feedback_issues)
            ))
            .await
    }
}

/// Produces a technical outline or diagram.
pub struct DeveloperAgent(StageAgent);

impl DeveloperAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self(StageAgent::new(StageRole::Developer, generator))
    }

    pub async fn develop(&self, task: &str, research: Option<&str>) -> GenerationOutcome {
        self.0.run(developer_brief(task, research)).await
    }
}

/// Drafts the candidate document.
pub struct WriterAgent(StageAgent);

impl WriterAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self(StageAgent::new(StageRole::Writer, generator))
    }

    pub async fn write(
        &self,
        goal: &str,
        task: &str,
        research: Option<&str>,
        developer: Option<&str>,
    ) -> GenerationOutcome {
        self.0
            .run(writer_brief(goal, task, research, developer))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGenerator {
        requests: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, request: GenerationRequest) -> GenerationOutcome {
            self.requests.lock().expect("lock poisoned").push(request);
            GenerationOutcome::success("ok")
        }
    }

    #[test]
    fn test_research_brief_appends_feedback_verbatim() {
        let brief = research_brief("Find sources", &["claim X unverified".to_string()]);
        assert!(brief.starts_with("Find sources\n\n"));
        assert!(brief.contains(FEEDBACK_HEADER));
        assert!(brief.ends_with("- claim X unverified"));
        assert_eq!(research_brief("Find sources", &[]), "Find sources");
    }

    #[test]
    fn test_developer_brief_context() {
        assert_eq!(developer_brief("Outline", None), "Outline");
        assert_eq!(developer_brief("Outline", Some("  ")), "Outline");
        assert!(developer_brief("Outline", Some("facts")).ends_with("facts"));
    }

    #[test]
    fn test_writer_brief_marks_missing_context() {
        let brief = writer_brief("goal", " write ", Some("facts"), None);
        assert!(brief.contains("User goal:\ngoal"));
        assert!(brief.contains("Writing task:\nwrite\n"));
        assert!(brief.contains("Research output (authoritative context):\nfacts"));
        assert!(brief.contains("Developer output (technical artifacts):\nNone"));
    }

    struct EmbeddedSentinel;

    #[async_trait]
    impl TextGenerator for EmbeddedSentinel {
        async fn generate(&self, _request: GenerationRequest) -> GenerationOutcome {
            GenerationOutcome::Success {
                text: format!("Sorry: {}", crate::llm::UNAVAILABLE_TOKEN),
            }
        }
    }

    #[tokio::test]
    async fn test_embedded_sentinel_is_not_content() {
        let writer = WriterAgent::new(Arc::new(EmbeddedSentinel));
        assert_eq!(
            writer.write("g", "t", None, None).await,
            GenerationOutcome::Unavailable
        );
    }

    #[tokio::test]
    async fn test_agents_use_generation_purpose_and_persona() {
        let generator = Arc::new(RecordingGenerator::default());
        let writer = WriterAgent::new(generator.clone());
        writer.write("g", "t", None, None).await;
        let research = ResearchAgent::new(generator.clone());
        research.research("t", &[]).await;

        let requests = generator.requests.lock().expect("lock poisoned");
        assert_eq!(requests[0].role, "Writer");
        assert_eq!(requests[1].role, "Research");
        assert!(requests
            .iter()
            .all(|r| r.purpose == crate::llm::Purpose::Generation));
    }
}
