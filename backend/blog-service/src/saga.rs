//! Ordered multi-document deletes with compensation.
//!
//! The document store has no multi-document transactions, so a cascade runs as a list of
//! steps. Each step records what it removed; when a step fails under
//! [`SagaPolicy::AbortAndCompensate`] the completed steps are undone in reverse order by
//! re-inserting what they captured.

use async_trait::async_trait;
use document_store::{Document, DocumentCollection, StoreError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What to do when a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SagaPolicy {
    /// Stop at the first failure and restore everything removed so far.
    #[default]
    AbortAndCompensate,
    /// Run every step and report the ones that failed.
    BestEffort,
}

impl std::str::FromStr for SagaPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "abort-and-compensate" | "abortandcompensate" => {
                Ok(SagaPolicy::AbortAndCompensate)
            }
            "best-effort" | "besteffort" => Ok(SagaPolicy::BestEffort),
            other => Err(format!("unknown CASCADE_POLICY: {}", other)),
        }
    }
}

/// One undoable unit of a saga.
#[async_trait]
pub trait SagaStep: Send {
    fn name(&self) -> &str;

    /// Run the step, returning how many documents it touched.
    async fn execute(&mut self) -> Result<usize, StoreError>;

    /// Undo a completed step.
    async fn compensate(&mut self) -> Result<(), StoreError>;
}

/// Deletes a fixed set of documents, keeping them for compensation.
pub struct DeleteDocuments<T: Document> {
    name: String,
    collection: Arc<dyn DocumentCollection<T>>,
    ids: Vec<String>,
    removed: Vec<T>,
}

impl<T: Document> DeleteDocuments<T> {
    pub fn new(
        name: impl Into<String>,
        collection: Arc<dyn DocumentCollection<T>>,
        ids: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            collection,
            ids,
            removed: Vec::new(),
        }
    }
}

#[async_trait]
impl<T: Document> SagaStep for DeleteDocuments<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self) -> Result<usize, StoreError> {
        for id in &self.ids {
            if let Some(doc) = self.collection.delete(id).await? {
                self.removed.push(doc);
            }
        }
        Ok(self.removed.len())
    }

    async fn compensate(&mut self) -> Result<(), StoreError> {
        while let Some(doc) = self.removed.pop() {
            match self.collection.insert(doc.clone()).await {
                Ok(_) | Err(StoreError::AlreadyExists { .. }) => {}
                Err(e) => {
                    self.removed.push(doc);
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub step: String,
    pub affected: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepFailure {
    pub step: String,
    pub error: String,
}

/// Result of running a saga.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SagaReport {
    pub saga: String,
    pub policy: SagaPolicy,
    pub completed: Vec<StepOutcome>,
    pub failed: Vec<StepFailure>,
    pub compensated: Vec<String>,
    pub compensation_failures: Vec<StepFailure>,
}

impl SagaReport {
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn affected(&self, step: &str) -> usize {
        self.completed
            .iter()
            .find(|o| o.step == step)
            .map(|o| o.affected)
            .unwrap_or(0)
    }
}

pub struct Saga {
    name: String,
    policy: SagaPolicy,
    steps: Vec<Box<dyn SagaStep>>,
}

impl Saga {
    pub fn new(name: impl Into<String>, policy: SagaPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: impl SagaStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub async fn run(mut self) -> SagaReport {
        let mut report = SagaReport {
            saga: self.name.clone(),
            policy: self.policy,
            completed: Vec::new(),
            failed: Vec::new(),
            compensated: Vec::new(),
            compensation_failures: Vec::new(),
        };
        let mut done = 0;

        for step in self.steps.iter_mut() {
            match step.execute().await {
                Ok(affected) => {
                    report.completed.push(StepOutcome {
                        step: step.name().to_string(),
                        affected,
                    });
                    done += 1;
                }
                Err(e) => {
                    warn!(saga = %self.name, step = step.name(), error = %e, "Saga step failed");
                    report.failed.push(StepFailure {
                        step: step.name().to_string(),
                        error: e.to_string(),
                    });
                    if self.policy == SagaPolicy::AbortAndCompensate {
                        break;
                    }
                }
            }
        }

        if !report.succeeded() && self.policy == SagaPolicy::AbortAndCompensate {
            // The failed step may have removed part of its set before failing.
            for step in self.steps[..done + 1].iter_mut().rev() {
                match step.compensate().await {
                    Ok(()) => report.compensated.push(step.name().to_string()),
                    Err(e) => {
                        error!(saga = %self.name, step = step.name(), error = %e, "Compensation failed");
                        report.compensation_failures.push(StepFailure {
                            step: step.name().to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        if report.succeeded() {
            info!(saga = %self.name, steps = report.completed.len(), "Saga completed");
        } else {
            warn!(
                saga = %self.name,
                policy = ?self.policy,
                failed = report.failed.len(),
                compensated = report.compensated.len(),
                "Saga finished with failures"
            );
        }
        report
    }
}
