//! Validation pipeline: orchestration, decision routing, observability.
//!
//! Stages run sequentially per request (`init → synthesis_scored →
//! hallucination_checked → decided`) and are independent: a stage failing
//! internally is recorded and the pipeline proceeds with what it has. The
//! pipeline never raises past its boundary except for an ill-formed
//! request. Many validations may run concurrently on independent requests;
//! the pipeline holds no mutable state.

use crate::hallucination::{HallucinationDetector, HallucinationReport};
use crate::synthesis::{SynthesisReport, SynthesisScorer};
use crate::{ContextDocument, ValidateError};
use chrono::{DateTime, Utc};
use lexlink_core::{CorrelationId, LinkStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Routing decision for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Safe to send to the user
    Pass,
    /// Route to the review queue
    Review,
    /// Do not show the user
    Reject,
}

/// Review-queue priority for non-passing answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Pipeline thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum overall synthesis score to pass
    pub pass_synthesis: f64,
    /// Maximum hallucination rate to pass
    pub max_hallucination: f64,
    /// Hallucination rate above which the answer is rejected outright
    pub reject_hallucination: f64,
    /// Minimum answer length accepted
    pub min_answer_chars: usize,
    /// Minimum query length accepted, when a query is supplied
    pub min_query_chars: usize,
    /// Maximum context documents accepted
    pub max_context_docs: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            pass_synthesis: 0.70,
            max_hallucination: 0.05,
            reject_hallucination: 0.15,
            min_answer_chars: 50,
            min_query_chars: 10,
            max_context_docs: 20,
        }
    }
}

/// One validation request.
#[derive(Debug, Clone, Default)]
pub struct ValidationRequest {
    /// The user's question, when known
    pub query: Option<String>,
    /// The generated answer under validation
    pub answer: String,
    /// The retrieved context the answer was generated from
    pub context: Vec<ContextDocument>,
    /// Correlation id to propagate (a fresh one is minted when absent)
    pub correlation_id: Option<CorrelationId>,
}

/// Timing of one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTime {
    /// Stage name (`synthesis`, `hallucination`)
    pub stage: String,
    /// Stage wall time in milliseconds
    pub ms: f64,
}

/// Scores and counters carried by every result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetrics {
    /// Synthesis overall score
    pub synthesis_score: f64,
    /// Share of claims backed by a link
    pub citation_score: f64,
    /// Share of claims that are fabricated
    pub hallucination_rate: f64,
    /// Claims left for a reviewer to confirm
    pub unverified_claims: usize,
    /// Whole-pipeline wall time in milliseconds
    pub total_time_ms: f64,
    /// Per-stage wall times
    pub per_stage_times: Vec<StageTime>,
    /// Stages that ran to completion
    pub stages_completed: usize,
    /// Stages that failed internally
    pub stages_failed: usize,
}

/// Outcome of one validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Correlation id stamped on all logs for this request
    pub correlation_id: CorrelationId,
    /// Routing decision
    pub decision: Decision,
    /// Review priority; present iff the decision is not `pass`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Scores and counters
    pub metrics: ValidationMetrics,
    /// Content problems found (missing sections, flagged sentences)
    pub issues: Vec<String>,
    /// Degradations (failed stages and the like)
    pub warnings: Vec<String>,
    /// When validation finished
    pub timestamp: DateTime<Utc>,
    /// Full synthesis report, when the stage ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<SynthesisReport>,
    /// Full hallucination report, when the stage ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hallucination: Option<HallucinationReport>,
}

impl ValidationResult {
    /// Stable on-the-wire representation.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "correlation_id": self.correlation_id,
            "decision": self.decision,
            "priority": self.priority,
            "metrics": {
                "synthesis_score": self.metrics.synthesis_score,
                "citation_score": self.metrics.citation_score,
                "hallucination_rate": self.metrics.hallucination_rate,
                "total_time_ms": self.metrics.total_time_ms,
                "per_stage_times": self.metrics.per_stage_times,
            },
            "issues": self.issues,
            "warnings": self.warnings,
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }
}

/// Orchestrates the synthesis and hallucination stages.
pub struct ValidationPipeline {
    scorer: SynthesisScorer,
    detector: HallucinationDetector,
    config: ValidationConfig,
}

impl ValidationPipeline {
    /// Creates a pipeline over the given link store.
    pub fn new(links: Arc<LinkStore>, config: ValidationConfig) -> Self {
        Self {
            scorer: SynthesisScorer::new(),
            detector: HallucinationDetector::new(links),
            config,
        }
    }

    /// Validates one answer.
    ///
    /// Only an ill-formed request errors; every internal failure degrades
    /// into a `review` outcome with warnings.
    pub fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult, ValidateError> {
        self.check_request(request)?;

        let started = Instant::now();
        let correlation_id = request.correlation_id.clone().unwrap_or_default();
        let mut warnings: Vec<String> = Vec::new();
        let mut issues: Vec<String> = Vec::new();
        let mut per_stage_times = Vec::new();
        let mut stages_completed = 0usize;
        let mut stages_failed = 0usize;

        // Stage 1: synthesis scoring.
        let stage_start = Instant::now();
        let synthesis = self.scorer.score(&request.answer);
        per_stage_times.push(StageTime {
            stage: "synthesis".into(),
            ms: stage_start.elapsed().as_secs_f64() * 1000.0,
        });
        stages_completed += 1;
        for section in &synthesis.missing_sections {
            issues.push(format!("missing section: {section}"));
        }

        // Stage 2: hallucination detection. A failure here is recorded and
        // the decision falls back to synthesis alone.
        let stage_start = Instant::now();
        let hallucination = match self.run_hallucination_stage(request) {
            Ok(report) => {
                stages_completed += 1;
                Some(report)
            }
            Err(error) => {
                stages_failed += 1;
                warnings.push(format!(
                    "hallucination stage failed, deciding on synthesis alone: {error}"
                ));
                None
            }
        };
        per_stage_times.push(StageTime {
            stage: "hallucination".into(),
            ms: stage_start.elapsed().as_secs_f64() * 1000.0,
        });

        if let Some(report) = &hallucination {
            for sentence in &report.flagged_sentences {
                issues.push(format!("hallucinated: {sentence}"));
            }
        }

        let hallucination_rate = hallucination
            .as_ref()
            .map(|r| r.hallucination_rate)
            .unwrap_or(0.0);
        let citation_score = hallucination
            .as_ref()
            .map(|r| r.verification_rate)
            .unwrap_or(0.0);
        let unverified_claims = hallucination
            .as_ref()
            .map(|r| r.unverified_claims)
            .unwrap_or(0);

        // Decide.
        let no_errors = stages_failed == 0;
        let (decision, priority) = self.decide(
            &synthesis,
            hallucination_rate,
            unverified_claims,
            no_errors,
        );

        let result = ValidationResult {
            correlation_id,
            decision,
            priority,
            metrics: ValidationMetrics {
                synthesis_score: synthesis.overall,
                citation_score,
                hallucination_rate,
                unverified_claims,
                total_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                per_stage_times,
                stages_completed,
                stages_failed,
            },
            issues,
            warnings,
            timestamp: Utc::now(),
            synthesis: Some(synthesis),
            hallucination,
        };

        tracing::info!(
            correlation_id = %result.correlation_id,
            decision = ?result.decision,
            synthesis = result.metrics.synthesis_score,
            hallucination = result.metrics.hallucination_rate,
            total_ms = result.metrics.total_time_ms,
            "validation complete"
        );
        Ok(result)
    }

    fn check_request(&self, request: &ValidationRequest) -> Result<(), ValidateError> {
        if request.answer.trim().len() < self.config.min_answer_chars {
            return Err(ValidateError::BadRequest(format!(
                "answer must be at least {} characters",
                self.config.min_answer_chars
            )));
        }
        if let Some(query) = &request.query {
            if query.trim().len() < self.config.min_query_chars {
                return Err(ValidateError::BadRequest(format!(
                    "query must be at least {} characters",
                    self.config.min_query_chars
                )));
            }
        }
        if request.context.len() > self.config.max_context_docs {
            return Err(ValidateError::BadRequest(format!(
                "at most {} context documents accepted",
                self.config.max_context_docs
            )));
        }
        Ok(())
    }

    fn run_hallucination_stage(
        &self,
        request: &ValidationRequest,
    ) -> Result<HallucinationReport, ValidateError> {
        let context = if request.context.is_empty() {
            None
        } else {
            Some(request.context.as_slice())
        };
        Ok(self.detector.detect(&request.answer, context))
    }

    fn decide(
        &self,
        synthesis: &SynthesisReport,
        hallucination_rate: f64,
        unverified_claims: usize,
        no_errors: bool,
    ) -> (Decision, Option<Priority>) {
        let s = synthesis.overall;
        let h = hallucination_rate;

        if synthesis.passed && h <= self.config.max_hallucination && no_errors {
            return (Decision::Pass, None);
        }
        if h > self.config.reject_hallucination {
            return (Decision::Reject, Some(Priority::Critical));
        }

        let priority = if h > 0.10 || s < 0.40 {
            Priority::Critical
        } else if h > self.config.max_hallucination || s < 0.55 {
            Priority::High
        } else if unverified_claims > 0 {
            Priority::Medium
        } else {
            Priority::Low
        };
        (Decision::Review, Some(priority))
    }
}
