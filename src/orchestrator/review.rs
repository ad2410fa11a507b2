//! Parsing of the human's reply to the review handoff.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::SectionCatalog;

use super::prompt::is_approval;

/// `<section-id>: <text>` at the start of a line
static EDIT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9][a-z0-9_-]*)\s*:\s*(.*)$").expect("invalid EDIT_LINE regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionEdit {
    pub section_id: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Edit(Vec<SectionEdit>),
}

/// Interpret a review reply against the catalog.
///
/// Only catalog ids start an edit. Other `key: value` lines continue the
/// open edit, or are dropped with a warning when no edit is open. A reply
/// with no usable edit approves the document as is. A later edit to the
/// same section replaces an earlier one.
pub fn parse_review_reply(reply: &str, catalog: &SectionCatalog) -> ReviewDecision {
    if is_approval(reply) {
        return ReviewDecision::Approve;
    }

    let mut edits: Vec<SectionEdit> = Vec::new();
    let mut current: Option<usize> = None;

    for line in reply.lines() {
        if let Some(caps) = EDIT_LINE.captures(line.trim_start()) {
            let id = &caps[1];
            if catalog.get(id).is_some() {
                let answer = caps[2].trim().to_string();
                edits.retain(|e| e.section_id != id);
                edits.push(SectionEdit {
                    section_id: id.to_string(),
                    answer,
                });
                current = Some(edits.len() - 1);
                continue;
            }
            if current.is_none() {
                warn!("Ignoring review edit for unknown section '{}'", id);
                continue;
            }
            // `key: value` text inside an open edit belongs to that edit
        }

        match current {
            Some(i) => {
                let edit = &mut edits[i];
                if !edit.answer.is_empty() {
                    edit.answer.push('\n');
                }
                edit.answer.push_str(line.trim_end());
            }
            None if !line.trim().is_empty() => {
                warn!("Ignoring review text outside an edit: {}", line.trim());
            }
            None => {}
        }
    }

    for edit in &mut edits {
        edit.answer = edit.answer.trim().to_string();
    }
    edits.retain(|e| !e.answer.is_empty());

    if edits.is_empty() {
        ReviewDecision::Approve
    } else {
        ReviewDecision::Edit(edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_replies() {
        let catalog = SectionCatalog::default();
        assert_eq!(parse_review_reply("", &catalog), ReviewDecision::Approve);
        assert_eq!(parse_review_reply("done", &catalog), ReviewDecision::Approve);
        assert_eq!(parse_review_reply(" APPROVE \n", &catalog), ReviewDecision::Approve);
    }

    #[test]
    fn test_single_edit_with_continuation() {
        let catalog = SectionCatalog::default();
        let reply = "success-criteria: 90% of users finish onboarding\nMeasured weekly.";

        let decision = parse_review_reply(reply, &catalog);
        assert_eq!(
            decision,
            ReviewDecision::Edit(vec![SectionEdit {
                section_id: "success-criteria".to_string(),
                answer: "90% of users finish onboarding\nMeasured weekly.".to_string(),
            }])
        );
    }

    #[test]
    fn test_multiple_edits_and_unknown_ids() {
        let catalog = SectionCatalog::default();
        let reply = "budget: ignored entirely\n\
                     this line is dropped too\n\
                     project-scope: A shared task board\n\
                     file-format-support: CSV and JSON export\n\
                     project-scope: A shared task board for schools";

        let ReviewDecision::Edit(edits) = parse_review_reply(reply, &catalog) else {
            panic!("expected edits");
        };
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].section_id, "file-format-support");
        assert_eq!(edits[0].answer, "CSV and JSON export");
        assert_eq!(edits[1].section_id, "project-scope");
        assert_eq!(edits[1].answer, "A shared task board for schools");
    }

    #[test]
    fn test_colon_lines_continue_open_edit() {
        let catalog = SectionCatalog::default();
        let reply = "technical-constraints: Must run on Linux\n\
                     latency: under 200ms\n\
                     storage: encrypted at rest";

        let decision = parse_review_reply(reply, &catalog);
        assert_eq!(
            decision,
            ReviewDecision::Edit(vec![SectionEdit {
                section_id: "technical-constraints".to_string(),
                answer: "Must run on Linux\nlatency: under 200ms\nstorage: encrypted at rest"
                    .to_string(),
            }])
        );
    }

    #[test]
    fn test_reply_without_edits_approves() {
        let catalog = SectionCatalog::default();
        assert_eq!(
            parse_review_reply("Looks good to me, thanks!", &catalog),
            ReviewDecision::Approve
        );
        assert_eq!(
            parse_review_reply("project-scope:   ", &catalog),
            ReviewDecision::Approve
        );
    }
}
