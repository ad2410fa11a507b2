use std::process::Stdio;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::CommandConfig;
use crate::error::SpecialistServiceError;
use crate::models::{ConfidenceAssessment, ValidationReport};

use super::{ConfidenceEvaluator, EvaluationRequest, ResponseValidator, extract_json_block};

/// JSON document written to the command's stdin
#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    task: &'static str,
    section_id: &'a str,
    section_title: &'a str,
    prompt: &'a str,
    answer: &'a str,
    context: &'a [String],
}

/// Specialist backed by an external program.
///
/// The program receives a JSON request on stdin and must print a JSON
/// object on stdout (a fenced block or surrounding prose is tolerated).
/// Output is checked against the result type's JSON schema before use.
pub struct CommandSpecialist {
    config: CommandConfig,
}

impl CommandSpecialist {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    async fn invoke<T>(
        &self,
        service: &'static str,
        task: &'static str,
        request: &EvaluationRequest<'_>,
    ) -> Result<T, SpecialistServiceError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let payload = serde_json::to_vec(&CommandRequest {
            task,
            section_id: &request.section.id,
            section_title: &request.section.title,
            prompt: request.prompt,
            answer: request.answer,
            context: request.context,
        })
        .map_err(|e| SpecialistServiceError::Failed {
            service,
            reason: format!("failed to encode request: {}", e),
        })?;

        debug!("Running {} command: {}", service, self.config.program);
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpecialistServiceError::Failed {
                service,
                reason: format!("failed to start '{}': {}", self.config.program, e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| SpecialistServiceError::Failed {
                    service,
                    reason: format!("failed to write request: {}", e),
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SpecialistServiceError::Failed {
                service,
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpecialistServiceError::Failed {
                service,
                reason: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        parse_structured(service, &String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse and schema-check a specialist result
fn parse_structured<T>(service: &'static str, text: &str) -> Result<T, SpecialistServiceError>
where
    T: DeserializeOwned + JsonSchema,
{
    let malformed = |reason: String| SpecialistServiceError::Malformed { service, reason };

    let trimmed = text.trim();
    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => {
            let block = extract_json_block(trimmed)
                .ok_or_else(|| malformed("no JSON object in output".to_string()))?;
            serde_json::from_str(block).map_err(|e| malformed(e.to_string()))?
        }
    };

    let schema = serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| malformed(format!("schema generation failed: {}", e)))?;
    let validator =
        jsonschema::validator_for(&schema).map_err(|e| malformed(format!("invalid schema: {}", e)))?;
    let violations: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
    if !violations.is_empty() {
        return Err(malformed(violations.join("; ")));
    }

    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}

#[async_trait]
impl ConfidenceEvaluator for CommandSpecialist {
    async fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<ConfidenceAssessment, SpecialistServiceError> {
        let service = "confidence evaluator";
        let assessment: ConfidenceAssessment = self.invoke(service, "evaluate", request).await?;
        if !(0.0..=1.0).contains(&assessment.score) {
            return Err(SpecialistServiceError::Malformed {
                service,
                reason: format!("score {} outside [0, 1]", assessment.score),
            });
        }
        Ok(assessment)
    }
}

#[async_trait]
impl ResponseValidator for CommandSpecialist {
    async fn validate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<ValidationReport, SpecialistServiceError> {
        self.invoke("response validator", "validate", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SectionCatalog;
    use crate::models::IssueSeverity;

    #[test]
    fn test_parse_raw_assessment() {
        let assessment: ConfidenceAssessment = parse_structured(
            "confidence evaluator",
            r#"{"score": 0.75, "rationale": "clear goals"}"#,
        )
        .unwrap();
        assert!((assessment.score - 0.75).abs() < 1e-6);
        assert_eq!(assessment.rationale, "clear goals");
    }

    #[test]
    fn test_parse_fenced_report_with_prose() {
        let output = "Here is my review:\n```json\n{\"issues\": [{\"description\": \"No units\", \"severity\": \"advisory\"}]}\n```";
        let report: ValidationReport = parse_structured("response validator", output).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, IssueSeverity::Advisory);
    }

    #[test]
    fn test_schema_violation_is_malformed() {
        let result: Result<ConfidenceAssessment, _> =
            parse_structured("confidence evaluator", r#"{"score": "high"}"#);
        assert!(matches!(
            result,
            Err(SpecialistServiceError::Malformed { .. })
        ));
    }

    #[test]
    fn test_non_json_output_is_malformed() {
        let result: Result<ValidationReport, _> =
            parse_structured("response validator", "looks fine to me");
        assert!(matches!(
            result,
            Err(SpecialistServiceError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_failure() {
        let specialist = CommandSpecialist::new(CommandConfig {
            program: "/nonexistent/req-forge-evaluator".to_string(),
            args: Vec::new(),
        });
        let catalog = SectionCatalog::default();
        let request = EvaluationRequest {
            section: &catalog.sections[0],
            prompt: "What is the scope?",
            answer: "A task app",
            context: &[],
        };

        let result = specialist.evaluate(&request).await;
        assert!(matches!(result, Err(SpecialistServiceError::Failed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_round_trip_through_shell() {
        let specialist = CommandSpecialist::new(CommandConfig {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                r#"cat > /dev/null; echo '{"score": 0.9, "rationale": "ok"}'"#.to_string(),
            ],
        });
        let catalog = SectionCatalog::default();
        let request = EvaluationRequest {
            section: &catalog.sections[0],
            prompt: "What is the scope?",
            answer: "A task app",
            context: &[],
        };

        let assessment = specialist.evaluate(&request).await.unwrap();
        assert!((assessment.score - 0.9).abs() < 1e-6);
    }
}
