// Booking commit workflow
// Idle -> Validating -> AwaitingClashResponse -> (no clash: submit | clashes: Reviewing) -> Idle
// One attempt at a time; the attempt owns the submit target and the cancellation token

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::booking_form::{
    BookingForm, FieldError, FormSubmitter, NativeSubmission, SubmitReceipt, SubmitTarget,
};
use crate::clash_api::{ClashAuthority, ClashRecord};
use crate::clash_query::{build_query, ClashQuery};
use crate::config::ClientConfig;
use crate::roster::ItemRoster;
use crate::view::ClashReview;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("Clash check failed: {0}")]
    Transport(String),

    #[error("Malformed clash response: {0}")]
    MalformedResponse(String),

    #[error("Cannot {operation} while {state}")]
    StateViolation {
        state: &'static str,
        operation: &'static str,
    },

    #[error("Response for {0} arrived after the attempt ended")]
    StaleResponse(AttemptId),

    #[error("Booking submission failed: {0}")]
    Submission(String),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(FieldError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ApiError> for WorkflowError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::MalformedResponse(detail) => WorkflowError::MalformedResponse(detail),
            other => WorkflowError::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Idle { last_error: Option<WorkflowError> },
    Validating,
    AwaitingClashResponse { attempt: AttemptId },
    Reviewing { attempt: AttemptId, review: ClashReview },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle { .. } => "idle",
            WorkflowState::Validating => "validating",
            WorkflowState::AwaitingClashResponse { .. } => "awaiting clash response",
            WorkflowState::Reviewing { .. } => "reviewing clashes",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, WorkflowState::Idle { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Submitted {
        attempt: AttemptId,
        reviewed: bool,
        receipt: SubmitReceipt,
    },
    ReviewRequired {
        attempt: AttemptId,
        clashes: usize,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkflowStats {
    pub attempts_started: usize,
    pub validation_failures: usize,
    pub submissions: usize,
    pub reviews_presented: usize,
    pub reviews_confirmed: usize,
    pub reviews_cancelled: usize,
    pub attempts_abandoned: usize,
    pub transport_failures: usize,
    pub malformed_responses: usize,
    pub submission_failures: usize,
    pub rejected_intents: usize,
    pub stale_responses: usize,
}

// The clash round trip of one attempt, detached from the workflow so the UI stays free while it runs
pub struct PendingCheck {
    attempt: AttemptId,
    query: ClashQuery,
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl PendingCheck {
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn query(&self) -> &ClashQuery {
        &self.query
    }

    pub async fn run<A: ClashAuthority + ?Sized>(self, authority: &A) -> ClashCheck {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
            result = bounded(self.timeout, authority.check(&self.query)) => result,
        };

        ClashCheck {
            attempt: self.attempt,
            result,
        }
    }
}

async fn bounded<F>(limit: Option<Duration>, request: F) -> Result<Vec<ClashRecord>, ApiError>
where
    F: Future<Output = Result<Vec<ClashRecord>, ApiError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, request)
            .await
            .unwrap_or_else(|_| Err(ApiError::Timeout(limit.as_millis() as u64))),
        None => request.await,
    }
}

// Answer to a PendingCheck, delivered back into the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClashCheck {
    pub attempt: AttemptId,
    pub result: Result<Vec<ClashRecord>, ApiError>,
}

struct ActiveAttempt {
    id: AttemptId,
    target: SubmitTarget,
    submission: NativeSubmission,
    cancel: CancellationToken,
}

pub struct BookingWorkflow {
    state: WorkflowState,
    roster: ItemRoster,
    active: Option<ActiveAttempt>,
    next_attempt: u64,
    timeout: Option<Duration>,
    stats: WorkflowStats,
}

impl BookingWorkflow {
    pub fn new(roster: ItemRoster) -> Self {
        Self {
            state: WorkflowState::Idle { last_error: None },
            roster,
            active: None,
            next_attempt: 1,
            timeout: ClientConfig::default().timeout(),
            stats: WorkflowStats::default(),
        }
    }

    pub fn with_config(roster: ItemRoster, config: &ClientConfig) -> Self {
        Self::new(roster).with_timeout(config.timeout())
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn roster(&self) -> &ItemRoster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut ItemRoster {
        &mut self.roster
    }

    pub fn stats(&self) -> &WorkflowStats {
        &self.stats
    }

    pub fn review(&self) -> Option<&ClashReview> {
        match &self.state {
            WorkflowState::Reviewing { review, .. } => Some(review),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&WorkflowError> {
        match &self.state {
            WorkflowState::Idle { last_error } => last_error.as_ref(),
            _ => None,
        }
    }

    // Submit intent: validate, build the query and hand back the round trip to run
    pub fn begin(
        &mut self,
        form: &BookingForm,
        target: SubmitTarget,
    ) -> Result<PendingCheck, WorkflowError> {
        if !self.state.is_idle() {
            self.stats.rejected_intents += 1;
            warn!(
                state = self.state.name(),
                control = target.control_id(),
                "submit intent rejected; an attempt is already active"
            );
            return Err(self.violation("start a booking attempt"));
        }

        self.transition(WorkflowState::Validating);

        if let Err(errors) = form.validate(&self.roster) {
            self.stats.validation_failures += 1;
            debug!(errors = errors.len(), "booking form failed validation");
            return Err(self.fail(WorkflowError::Validation(errors)));
        }

        let query = match build_query(&form.time, self.roster.kind(), &self.roster.snapshot()) {
            Ok(query) => query,
            Err(err) => {
                self.stats.validation_failures += 1;
                return Err(self.fail(WorkflowError::Validation(vec![FieldError::new(
                    "time",
                    err.to_string(),
                )])));
            }
        };

        let id = AttemptId(self.next_attempt);
        self.next_attempt += 1;
        self.stats.attempts_started += 1;

        let cancel = CancellationToken::new();
        self.active = Some(ActiveAttempt {
            id,
            target,
            // What was checked is what gets submitted
            submission: form.native_submission(&self.roster),
            cancel: cancel.clone(),
        });
        self.transition(WorkflowState::AwaitingClashResponse { attempt: id });

        info!(
            attempt = %id,
            items = query.items.len(),
            manual = query.time.is_manual(),
            "clash check started"
        );
        Ok(PendingCheck {
            attempt: id,
            query,
            cancel,
            timeout: self.timeout,
        })
    }

    // Deliver the round trip's answer
    pub async fn complete<S: FormSubmitter + ?Sized>(
        &mut self,
        check: ClashCheck,
        submitter: &S,
    ) -> Result<Outcome, WorkflowError> {
        let awaiting = matches!(
            self.state,
            WorkflowState::AwaitingClashResponse { attempt } if attempt == check.attempt
        );
        let active = match self.active.take() {
            Some(active) if awaiting && active.id == check.attempt => active,
            other => {
                self.active = other;
                self.stats.stale_responses += 1;
                warn!(attempt = %check.attempt, state = self.state.name(), "discarding stale clash response");
                return Err(WorkflowError::StaleResponse(check.attempt));
            }
        };

        match check.result {
            Ok(records) if records.is_empty() => {
                info!(attempt = %active.id, "no clashes; submitting booking");
                self.finish(active, false, submitter).await
            }
            Ok(records) => {
                let id = active.id;
                let review = ClashReview::from_records(&records);
                self.active = Some(active);
                self.stats.reviews_presented += 1;
                info!(attempt = %id, clashes = records.len(), "clashes found; awaiting review");
                self.transition(WorkflowState::Reviewing { attempt: id, review });
                Ok(Outcome::ReviewRequired {
                    attempt: id,
                    clashes: records.len(),
                })
            }
            Err(err) => {
                // The attempt ends here; its target must never fire
                active.cancel.cancel();
                let err = WorkflowError::from(err);
                match err {
                    WorkflowError::MalformedResponse(_) => self.stats.malformed_responses += 1,
                    _ => self.stats.transport_failures += 1,
                }
                warn!(attempt = %active.id, error = %err, "clash check did not complete");
                Err(self.fail(err))
            }
        }
    }

    // Book anyway: release the one native submission the attempt was holding
    pub async fn confirm<S: FormSubmitter + ?Sized>(
        &mut self,
        submitter: &S,
    ) -> Result<Outcome, WorkflowError> {
        if !matches!(self.state, WorkflowState::Reviewing { .. }) {
            return Err(self.violation("confirm a review"));
        }
        let Some(active) = self.active.take() else {
            return Err(self.violation("confirm a review"));
        };

        self.stats.reviews_confirmed += 1;
        info!(attempt = %active.id, "clash review confirmed");
        self.finish(active, true, submitter).await
    }

    // Abandon the active attempt; the form stays populated and nothing is submitted
    pub fn cancel(&mut self) -> Result<AttemptId, WorkflowError> {
        let reviewing = match self.state {
            WorkflowState::Reviewing { .. } => true,
            WorkflowState::AwaitingClashResponse { .. } => false,
            _ => return Err(self.violation("cancel")),
        };
        let Some(active) = self.active.take() else {
            return Err(self.violation("cancel"));
        };

        active.cancel.cancel();
        if reviewing {
            self.stats.reviews_cancelled += 1;
        } else {
            self.stats.attempts_abandoned += 1;
        }

        info!(attempt = %active.id, reviewing, "booking attempt cancelled");
        self.transition(WorkflowState::Idle { last_error: None });
        Ok(active.id)
    }

    // The whole attempt up to either submission or the review wait
    pub async fn submit<A, S>(
        &mut self,
        form: &BookingForm,
        target: SubmitTarget,
        authority: &A,
        submitter: &S,
    ) -> Result<Outcome, WorkflowError>
    where
        A: ClashAuthority + ?Sized,
        S: FormSubmitter + ?Sized,
    {
        let pending = self.begin(form, target)?;
        let check = pending.run(authority).await;
        self.complete(check, submitter).await
    }

    // Goes straight to the submitter; begin() is not re-entered, so interception cannot fire twice
    async fn finish<S: FormSubmitter + ?Sized>(
        &mut self,
        active: ActiveAttempt,
        reviewed: bool,
        submitter: &S,
    ) -> Result<Outcome, WorkflowError> {
        let ActiveAttempt {
            id,
            target,
            submission,
            ..
        } = active;

        match submitter.submit(target, submission).await {
            Ok(receipt) => {
                self.stats.submissions += 1;
                self.transition(WorkflowState::Idle { last_error: None });
                Ok(Outcome::Submitted {
                    attempt: id,
                    reviewed,
                    receipt,
                })
            }
            Err(err) => {
                self.stats.submission_failures += 1;
                warn!(attempt = %id, error = %err, "booking submission failed");
                Err(self.fail(WorkflowError::Submission(err.to_string())))
            }
        }
    }

    fn fail(&mut self, err: WorkflowError) -> WorkflowError {
        self.transition(WorkflowState::Idle {
            last_error: Some(err.clone()),
        });
        err
    }

    fn violation(&self, operation: &'static str) -> WorkflowError {
        WorkflowError::StateViolation {
            state: self.state.name(),
            operation,
        }
    }

    fn transition(&mut self, next: WorkflowState) {
        debug!(from = self.state.name(), to = next.name(), "workflow transition");
        self.state = next;
    }
}

impl Drop for BookingWorkflow {
    fn drop(&mut self) {
        // An in-flight round trip must not outlive the page that started it
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}
