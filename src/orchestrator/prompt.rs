//! Prompt composition for section, follow-up, confirmation and review handoffs.

use minijinja::{Environment, context};
use serde::Serialize;
use tracing::warn;

use crate::config::{Section, SectionCatalog};
use crate::models::{IssueKind, RequirementsDocument, SectionState};

use super::run::WorkflowRun;

/// Replies that confirm an answer when the specialists could not assess it
const CONFIRMATION_REPLIES: &[&str] = &["", "confirm", "yes", "ok"];

/// Replies that approve the document during review
const APPROVAL_REPLIES: &[&str] = &["", "done", "approve"];

pub fn is_confirmation(reply: &str) -> bool {
    let reply = reply.trim().to_lowercase();
    CONFIRMATION_REPLIES.contains(&reply.as_str())
}

pub fn is_approval(reply: &str) -> bool {
    let reply = reply.trim().to_lowercase();
    APPROVAL_REPLIES.contains(&reply.as_str())
}

/// Earlier answers exposed to section templates as `previous`
#[derive(Serialize)]
struct PreviousAnswer<'a> {
    id: &'a str,
    title: &'a str,
    answer: &'a str,
}

pub struct PromptBuilder {
    env: Environment<'static>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        Self { env }
    }

    /// Render a section's question. Falls back to the raw template on error.
    pub fn render_question(
        &self,
        run: &WorkflowRun,
        catalog: &SectionCatalog,
        index: usize,
        section: &Section,
    ) -> String {
        let previous: Vec<PreviousAnswer<'_>> = catalog
            .iter()
            .zip(run.sections())
            .take(index)
            .filter_map(|(s, state)| {
                state.raw_answer.as_deref().map(|answer| PreviousAnswer {
                    id: &s.id,
                    title: &s.title,
                    answer,
                })
            })
            .collect();

        let ctx = context! {
            project => &run.project_name,
            section => section,
            position => index + 1,
            total => catalog.len(),
            previous => previous,
        };

        match self.env.render_str(&section.prompt, ctx) {
            Ok(rendered) => rendered.trim().to_string(),
            Err(e) => {
                warn!("Failed to render prompt for section {}: {}", section.id, e);
                section.prompt.trim().to_string()
            }
        }
    }

    /// Progress header, question and any knowledge snippets.
    pub fn section_prompt(
        &self,
        run: &WorkflowRun,
        catalog: &SectionCatalog,
        index: usize,
        section: &Section,
        snippets: &[String],
    ) -> String {
        let mut prompt = progress_header(run, catalog, index);
        prompt.push_str(&format!(
            "\n## {}. {}\n\n{}\n",
            section.ordinal,
            section.title,
            self.render_question(run, catalog, index, section)
        ));

        if !snippets.is_empty() {
            prompt.push_str("\n### Relevant knowledge\n\n");
            for snippet in snippets {
                prompt.push_str(snippet);
                prompt.push_str("\n\n");
            }
        }

        prompt
    }

    /// Section prompt extended with the evaluator rationale and validator issues.
    pub fn follow_up(
        &self,
        base: &str,
        state: &SectionState,
        next_attempt: u32,
        max_attempts: u32,
    ) -> String {
        let mut prompt = format!(
            "{}\n### Follow-up (attempt {} of {})\n\nYour previous answer needs more detail.\n",
            base.trim_end(),
            next_attempt,
            max_attempts
        );
        if let Some(rationale) = &state.rationale {
            prompt.push_str(&format!("\nAssessment: {}\n", rationale));
        }

        let issues: Vec<_> = state
            .issues
            .iter()
            .filter(|i| matches!(i.kind, IssueKind::Blocking | IssueKind::Advisory))
            .collect();
        if !issues.is_empty() {
            prompt.push_str("\nPlease address:\n");
            for issue in issues {
                prompt.push_str(&format!("- {}\n", issue));
            }
        }

        prompt.push_str("\nPlease provide a more complete answer.\n");
        prompt
    }

    /// Asks the human to confirm an answer the specialists could not assess.
    pub fn confirmation(&self, base: &str, state: &SectionState) -> String {
        let answer = state.raw_answer.as_deref().unwrap_or_default();
        let quoted: Vec<String> = answer.lines().map(|l| format!("> {}", l)).collect();
        format!(
            "{}\n### Confirmation needed\n\nYour answer could not be assessed automatically:\n\n{}\n\n\
             Reply 'confirm' (or an empty line) to keep it, or send a revised answer.\n",
            base.trim_end(),
            quoted.join("\n")
        )
    }

    /// The rendered document followed by review instructions.
    pub fn review(&self, document: &RequirementsDocument, catalog: &SectionCatalog) -> String {
        let ids: Vec<&str> = catalog.iter().map(|s| s.id.as_str()).collect();
        format!(
            "{}\n---\n\n## Review\n\n\
             Reply 'done' (or an empty line) to finalize the document.\n\
             To change an answer, send lines of the form `<section-id>: <new answer>`.\n\
             Section ids: {}\n",
            document.to_markdown(),
            ids.join(", ")
        )
    }
}

/// "Progress: N/M sections completed" plus one marker line per section.
pub fn progress_header(run: &WorkflowRun, catalog: &SectionCatalog, current: usize) -> String {
    let completed = run.sections().iter().filter(|s| s.status.is_done()).count();
    let mut header = format!(
        "Progress: {}/{} sections completed\n",
        completed,
        catalog.len()
    );
    for (i, (section, state)) in catalog.iter().zip(run.sections()).enumerate() {
        let marker = if state.status.is_done() {
            "✓"
        } else if i == current {
            "►"
        } else {
            "○"
        };
        header.push_str(&format!("{} {}\n", marker, section.title));
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Acceptance, ValidationIssue, ValidationReport};

    fn run_with_first_complete(catalog: &SectionCatalog) -> WorkflowRun {
        let mut run = WorkflowRun::new("Task App", catalog);
        let state = run.section_at_mut(0).unwrap();
        state.begin_attempt();
        state.receive_answer("Help small teams track tasks");
        state.record_confidence(0.8, "ok");
        state.complete(Acceptance::Confident);
        run.advance();
        run
    }

    #[test]
    fn test_progress_header_markers() {
        let catalog = SectionCatalog::default();
        let run = run_with_first_complete(&catalog);

        let header = progress_header(&run, &catalog, 1);
        let lines: Vec<_> = header.lines().collect();
        assert_eq!(lines[0], "Progress: 1/6 sections completed");
        assert_eq!(lines[1], "✓ Project Scope");
        assert_eq!(lines[2], "► User Stories");
        assert_eq!(lines[3], "○ Technical Constraints");
    }

    #[test]
    fn test_section_prompt_renders_template_and_knowledge() {
        let catalog = SectionCatalog::default();
        let run = run_with_first_complete(&catalog);
        let builder = PromptBuilder::new();
        let section = &catalog.sections[1];

        let prompt = builder.section_prompt(
            &run,
            &catalog,
            1,
            section,
            &["Source 1 (notes.md):\nTeams use kanban boards".to_string()],
        );

        assert!(prompt.contains("## 2. User Stories"));
        assert!(prompt.contains("workflows for Task App."));
        assert!(!prompt.contains("{{"));
        assert!(prompt.contains("### Relevant knowledge"));
        assert!(prompt.contains("Teams use kanban boards"));
    }

    #[test]
    fn test_template_sees_previous_answers() {
        let mut catalog = SectionCatalog::default();
        catalog.sections[1].prompt =
            "{% for p in previous %}[{{ p.title }}: {{ p.answer }}]{% endfor %} {{ position }}/{{ total }}"
                .to_string();
        let run = run_with_first_complete(&catalog);
        let builder = PromptBuilder::new();

        let question = builder.render_question(&run, &catalog, 1, &catalog.sections[1]);
        assert_eq!(question, "[Project Scope: Help small teams track tasks] 2/6");
    }

    #[test]
    fn test_render_failure_falls_back_to_template() {
        let mut catalog = SectionCatalog::default();
        catalog.sections[0].prompt = "Broken {% if %} template".to_string();
        let run = WorkflowRun::new("x", &catalog);
        let builder = PromptBuilder::new();

        let question = builder.render_question(&run, &catalog, 0, &catalog.sections[0]);
        assert_eq!(question, "Broken {% if %} template");
    }

    #[test]
    fn test_follow_up_lists_rationale_and_issues() {
        let mut state = SectionState::new("user-stories");
        state.begin_attempt();
        state.receive_answer("Users do things");
        state.record_confidence(0.3, "Response length: 3 words");
        state.record_validation(&ValidationReport::new(vec![ValidationIssue::blocking(
            "Missing 'As a...' user story format",
        )]));

        let prompt = PromptBuilder::new().follow_up("Base question", &state, 2, 3);
        assert!(prompt.starts_with("Base question"));
        assert!(prompt.contains("attempt 2 of 3"));
        assert!(prompt.contains("Assessment: Response length: 3 words"));
        assert!(prompt.contains("- Missing 'As a...' user story format"));
    }

    #[test]
    fn test_confirmation_and_approval_replies() {
        assert!(is_confirmation(""));
        assert!(is_confirmation("  Confirm "));
        assert!(is_confirmation("yes"));
        assert!(is_confirmation("OK"));
        assert!(!is_confirmation("Actually, users are nurses"));

        assert!(is_approval(""));
        assert!(is_approval("done"));
        assert!(is_approval("Approve"));
        assert!(!is_approval("project-scope: new text"));
    }
}
