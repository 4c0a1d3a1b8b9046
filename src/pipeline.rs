//! Pipeline Orchestrator
//!
//! One run per inbound question: translate, validate, execute, respond.
//! Translation and validation failures end the run early with the default
//! answer; execution cannot fail outward. Runs share nothing except the
//! translator and the store, and nothing is retried.

use crate::db::{ExecutionOutcome, QueryExecutor, DEFAULT_ANSWER};
use crate::error::Result;
use crate::llm::Translator;
use crate::policy::{self, PolicyRejection, Verdict};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Translating,
    Validating,
    Executing,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Translating => "translating",
            Stage::Validating => "validating",
            Stage::Executing => "executing",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

/// Why a run ended without executing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Translation,
    Policy(PolicyRejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Answered(ExecutionOutcome),
    Failed(Failure),
}

impl RunOutcome {
    /// Text sent back to the user. Every failure looks like `"0"`.
    pub fn reply_text(&self) -> &str {
        match self {
            RunOutcome::Answered(outcome) => outcome.as_text(),
            RunOutcome::Failed(_) => DEFAULT_ANSWER,
        }
    }
}

/// Delivers a reply to whoever asked.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;
}

pub struct Pipeline {
    translator: Arc<dyn Translator>,
    executor: QueryExecutor,
}

impl Pipeline {
    pub fn new(translator: Arc<dyn Translator>, executor: QueryExecutor) -> Self {
        Self {
            translator,
            executor,
        }
    }

    /// Run the first three stages and decide what to answer.
    pub async fn answer(&self, question: &str) -> RunOutcome {
        debug!(stage = %Stage::Translating);
        let sql = match self.translator.translate(question).await {
            Ok(sql) => sql,
            Err(e) => {
                error!(error = %e, "Translation unavailable");
                return RunOutcome::Failed(Failure::Translation);
            }
        };

        debug!(stage = %Stage::Validating);
        if let Verdict::Rejected(reason) = policy::validate(&sql) {
            warn!(reason = %reason, sql = %sql, "Unsafe SQL rejected");
            return RunOutcome::Failed(Failure::Policy(reason));
        }

        debug!(stage = %Stage::Executing);
        RunOutcome::Answered(self.executor.execute(&sql).await)
    }

    /// Full run, including delivery of the reply.
    ///
    /// Only a failure to deliver is returned as an error.
    pub async fn handle<R>(&self, question: &str, responder: &R) -> Result<RunOutcome>
    where
        R: Responder + ?Sized,
    {
        let span = info_span!("pipeline", run_id = %Uuid::new_v4());
        async move {
            info!(question, "Received question");
            let outcome = self.answer(question).await;

            debug!(stage = %Stage::Responding);
            let reply = outcome.reply_text();
            responder.send_text(reply).await?;
            info!(reply, "Reply sent");
            Ok(outcome)
        }
        .instrument(span)
        .await
    }
}
