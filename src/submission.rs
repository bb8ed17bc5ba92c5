//! Reconciliation session and return submission.
//!
//! A session moves `Closed -> Open -> Submitting -> Closed` on success, or
//! back to `Open` on failure with the operator's input intact. Every open and
//! close bumps a generation counter; a response carrying an older generation
//! is dropped instead of being applied to a session it no longer belongs to.
//!
//! Only approved requests can be opened. The `Idempotency-Key` lives on the
//! session: retries of an unchanged payload reuse it, and any change to the
//! returned quantities or a reopen rotates it.
//!
//! Front-ends that drive the network call themselves use
//! [`ReconciliationSession::begin_submit`] / [`ReconciliationSession::finish_submit`];
//! everyone else calls [`ReconciliationSession::submit`].

use tracing::{info, warn};
use uuid::Uuid;

use crate::api::InventoryApi;
use crate::error::{ApiError, WorkflowError};
use crate::models::{NotReturned, OperatorContext, RequestStatus, ReturnPayload, UsageRequest};
use crate::movements::MovementListStore;
use crate::reconciliation::ReturnCalculator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Closed,
    Open,
    Submitting,
}

/// Everything needed to send one submission, detached from the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    generation: u64,
    pub request_id: i64,
    pub payload: ReturnPayload,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Backend accepted the return; the session is closed.
    Completed { not_returned: Vec<NotReturned> },
    /// The session was closed or reopened while the request was in flight.
    Stale,
}

#[derive(Debug, Default)]
pub struct ReconciliationSession {
    state: SessionState,
    generation: u64,
    request: Option<UsageRequest>,
    calculator: ReturnCalculator,
    /// Sent with every attempt of the same payload; rotated when input changes.
    idempotency_key: String,
    last_error: Option<String>,
}

impl ReconciliationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn request(&self) -> Option<&UsageRequest> {
        self.request.as_ref()
    }

    pub fn calculator(&self) -> &ReturnCalculator {
        &self.calculator
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    /// Fetch the usage request behind a loan and open the session on it.
    pub async fn open<A>(&mut self, api: &A, request_id: i64) -> Result<(), WorkflowError>
    where
        A: InventoryApi + ?Sized,
    {
        if self.state == SessionState::Submitting {
            return Err(WorkflowError::AlreadySubmitting);
        }
        match api.get_usage_request(request_id).await {
            Ok(request) => self.open_with(request),
            Err(e) => {
                warn!(request_id, error = %e, "failed to load usage request for return");
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Open on already-loaded request details. Every line starts fully returned.
    ///
    /// Only approved loans can be returned; anything else leaves the session
    /// as it was.
    pub fn open_with(&mut self, request: UsageRequest) -> Result<(), WorkflowError> {
        if self.state == SessionState::Submitting {
            return Err(WorkflowError::AlreadySubmitting);
        }
        if request.status != Some(RequestStatus::Approved) {
            warn!(request_id = request.id, status = ?request.status, "request is not returnable");
            return Err(WorkflowError::NotReturnable {
                request_id: request.id,
                status: request.status,
            });
        }
        self.generation += 1;
        self.idempotency_key = Uuid::new_v4().to_string();
        self.calculator = ReturnCalculator::new(request.supplies.clone());
        info!(
            request_id = request.id,
            lines = request.supplies.len(),
            generation = self.generation,
            "reconciliation session opened"
        );
        self.request = Some(request);
        self.state = SessionState::Open;
        self.last_error = None;
        Ok(())
    }

    /// Discard the session. An in-flight submission becomes stale.
    pub fn close(&mut self) {
        if self.state == SessionState::Submitting {
            info!(generation = self.generation, "session closed with submission in flight");
        }
        self.generation += 1;
        self.state = SessionState::Closed;
        self.request = None;
        self.calculator.clear();
        self.idempotency_key.clear();
        self.last_error = None;
    }

    pub fn set_returned(&mut self, supply_id: i64, raw: &str) -> Result<i64, WorkflowError> {
        match self.state {
            SessionState::Open => {
                let before = self.calculator.returned_map().get(&supply_id).copied();
                let stored = self.calculator.set_returned(supply_id, raw);
                if before != Some(stored) {
                    self.idempotency_key = Uuid::new_v4().to_string();
                }
                Ok(stored)
            }
            SessionState::Submitting => Err(WorkflowError::AlreadySubmitting),
            SessionState::Closed => Err(WorkflowError::SessionClosed),
        }
    }

    pub fn compute_not_returned(&self) -> Vec<NotReturned> {
        self.calculator.compute_not_returned()
    }

    /// Freeze the current input into a ticket and mark the session busy.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket, WorkflowError> {
        let request_id = match (self.state, &self.request) {
            (SessionState::Open, Some(request)) => request.id,
            (SessionState::Submitting, _) => return Err(WorkflowError::AlreadySubmitting),
            _ => return Err(WorkflowError::SessionClosed),
        };
        self.state = SessionState::Submitting;
        self.last_error = None;
        Ok(SubmitTicket {
            generation: self.generation,
            request_id,
            payload: ReturnPayload {
                insumos_no_devueltos: self.calculator.compute_not_returned(),
            },
            idempotency_key: self.idempotency_key.clone(),
        })
    }

    /// Apply the backend's answer for `ticket`.
    pub fn finish_submit(
        &mut self,
        ticket: SubmitTicket,
        result: Result<(), ApiError>,
    ) -> Result<SubmitOutcome, WorkflowError> {
        if ticket.generation != self.generation || self.state != SessionState::Submitting {
            info!(
                request_id = ticket.request_id,
                ticket_generation = ticket.generation,
                generation = self.generation,
                "dropping stale return submission result"
            );
            return Ok(SubmitOutcome::Stale);
        }

        match result {
            Ok(()) => {
                let not_returned = ticket.payload.insumos_no_devueltos;
                info!(
                    request_id = ticket.request_id,
                    not_returned = not_returned.len(),
                    "return registered"
                );
                self.close();
                Ok(SubmitOutcome::Completed { not_returned })
            }
            Err(e) => {
                warn!(request_id = ticket.request_id, error = %e, "return submission failed");
                self.state = SessionState::Open;
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Submit the return and, once accepted, reload the movement list page.
    ///
    /// A failed reload does not undo the submission; it is left on the
    /// list's error flag.
    pub async fn submit<A>(
        &mut self,
        api: &A,
        operator: &OperatorContext,
        list: &mut MovementListStore,
    ) -> Result<SubmitOutcome, WorkflowError>
    where
        A: InventoryApi + ?Sized,
    {
        let ticket = self.begin_submit()?;
        let result = api
            .return_supplies(
                operator,
                ticket.request_id,
                &ticket.payload,
                &ticket.idempotency_key,
            )
            .await;
        let outcome = self.finish_submit(ticket, result)?;

        if let SubmitOutcome::Completed { .. } = outcome {
            if let Err(e) = list.reload(api, operator).await {
                warn!(error = %e, "movement list refresh after return failed");
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovementType, RequestStatus, SupplyLine};
    use crate::movements::tests::movement;
    use crate::testing::FakeApi;

    fn request() -> UsageRequest {
        UsageRequest {
            id: 40,
            responsible: Some("Ana".into()),
            teacher_name: Some("Dr. Vargas".into()),
            practice_title: None,
            laboratory_name: Some("Química 2".into()),
            starts_at: None,
            ends_at: None,
            status: Some(RequestStatus::Approved),
            supplies: vec![
                SupplyLine {
                    supply_id: 1,
                    name: "A".into(),
                    unit: None,
                    total_loaned: 10,
                    per_group: None,
                },
                SupplyLine {
                    supply_id: 2,
                    name: "B".into(),
                    unit: None,
                    total_loaned: 5,
                    per_group: None,
                },
            ],
        }
    }

    fn api() -> FakeApi {
        FakeApi::with_movements(
            vec![movement(1, MovementType::Loan, "A", "Ana", 40)],
            1,
        )
        .with_request(request())
    }

    fn operator() -> OperatorContext {
        OperatorContext::new("op-3", "Marta")
    }

    #[tokio::test]
    async fn test_open_initializes_full_return() {
        let api = api();
        let mut session = ReconciliationSession::new();
        session.open(&api, 40).await.unwrap();

        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.calculator().returned(1), 10);
        assert_eq!(session.calculator().returned(2), 5);
        assert!(session.compute_not_returned().is_empty());
    }

    #[tokio::test]
    async fn test_open_unknown_request_stays_closed() {
        let api = api();
        let mut session = ReconciliationSession::new();
        let err = session.open(&api, 99).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Api(ApiError::Server { status: 404, .. })));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_submit_success_closes_and_refreshes() {
        let api = api();
        let mut list = MovementListStore::new();
        let mut session = ReconciliationSession::new();
        session.open(&api, 40).await.unwrap();
        session.set_returned(1, "7").unwrap();
        session.set_returned(2, "5").unwrap();

        let outcome = session.submit(&api, &operator(), &mut list).await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Completed {
                not_returned: vec![NotReturned {
                    supply_id: 1,
                    quantity: 3
                }]
            }
        );
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.calculator().returned_map().is_empty());

        let returns = api.returns();
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].0, 40);
        assert_eq!(returns[0].1.insumos_no_devueltos.len(), 1);
        assert!(!returns[0].2.is_empty());

        assert_eq!(api.movement_calls(), vec![(1, 10)]);
        assert_eq!(list.movements().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_input_and_reopens() {
        let api = api();
        let mut list = MovementListStore::new();
        let mut session = ReconciliationSession::new();
        session.open(&api, 40).await.unwrap();
        session.set_returned(1, "7").unwrap();
        session.set_returned(2, "5").unwrap();

        api.fail_next(ApiError::Server {
            status: 500,
            message: "Inventory backend server error".into(),
        });
        let err = session.submit(&api, &operator(), &mut list).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Api(ApiError::Server { status: 500, .. })));

        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.calculator().returned(1), 7);
        assert_eq!(session.calculator().returned(2), 5);
        assert_eq!(session.calculator().returned_map().len(), 2);
        assert!(session.last_error().is_some());
        assert!(api.movement_calls().is_empty());

        // Operator retries by hand.
        session.submit(&api, &operator(), &mut list).await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_retry_after_failure_reuses_idempotency_key() {
        let api = api();
        let mut list = MovementListStore::new();
        let mut session = ReconciliationSession::new();
        session.open(&api, 40).await.unwrap();
        session.set_returned(1, "7").unwrap();

        api.fail_next(ApiError::Network("Connection timed out".into()));
        session.submit(&api, &operator(), &mut list).await.unwrap_err();
        session.submit(&api, &operator(), &mut list).await.unwrap();

        let keys = api.return_keys();
        assert_eq!(keys.len(), 2);
        assert!(!keys[0].is_empty());
        assert_eq!(keys[0], keys[1]);
        assert_eq!(api.returns().len(), 1);
    }

    #[test]
    fn test_changed_input_rotates_idempotency_key() {
        let mut session = ReconciliationSession::new();
        session.open_with(request()).unwrap();
        let opened = session.idempotency_key().to_string();
        assert!(!opened.is_empty());

        // Same value as already stored: payload unchanged, key kept.
        session.set_returned(1, "10").unwrap();
        assert_eq!(session.idempotency_key(), opened);

        session.set_returned(1, "6").unwrap();
        let changed = session.idempotency_key().to_string();
        assert_ne!(changed, opened);

        session.close();
        session.open_with(request()).unwrap();
        assert_ne!(session.idempotency_key(), changed);
    }

    #[tokio::test]
    async fn test_only_approved_requests_open() {
        for status in [
            Some(RequestStatus::Pending),
            Some(RequestStatus::Rejected),
            Some(RequestStatus::Completed),
            None,
        ] {
            let mut pending = request();
            pending.status = status;
            let api = FakeApi::default().with_request(pending);
            let mut session = ReconciliationSession::new();

            let err = session.open(&api, 40).await.unwrap_err();
            assert!(matches!(
                err,
                WorkflowError::NotReturnable { request_id: 40, status: s } if s == status
            ));
            assert_eq!(session.state(), SessionState::Closed);
            assert!(matches!(
                session.begin_submit(),
                Err(WorkflowError::SessionClosed)
            ));
            assert!(api.returns().is_empty());
        }
    }

    #[test]
    fn test_double_submit_rejected() {
        let mut session = ReconciliationSession::new();
        session.open_with(request()).unwrap();

        let ticket = session.begin_submit().unwrap();
        assert!(matches!(
            session.begin_submit(),
            Err(WorkflowError::AlreadySubmitting)
        ));
        assert!(matches!(
            session.set_returned(1, "2"),
            Err(WorkflowError::AlreadySubmitting)
        ));

        let outcome = session.finish_submit(ticket, Ok(())).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed { .. }));
    }

    #[test]
    fn test_late_response_after_close_is_dropped() {
        let mut session = ReconciliationSession::new();
        session.open_with(request()).unwrap();
        session.set_returned(2, "1").unwrap();
        let ticket = session.begin_submit().unwrap();

        session.close();
        session.open_with(request()).unwrap();

        let outcome = session
            .finish_submit(
                ticket,
                Err(ApiError::Network("Connection timed out".into())),
            )
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Stale);
        assert_eq!(session.state(), SessionState::Open);
        assert!(session.last_error().is_none());
        assert_eq!(session.calculator().returned(2), 5);
    }

    #[test]
    fn test_ticket_captures_latest_input() {
        let mut session = ReconciliationSession::new();
        session.open_with(request()).unwrap();
        session.set_returned(1, "4").unwrap();
        session.set_returned(1, "9").unwrap();

        let ticket = session.begin_submit().unwrap();
        assert_eq!(
            ticket.payload.insumos_no_devueltos,
            vec![NotReturned {
                supply_id: 1,
                quantity: 1
            }]
        );
    }

    #[test]
    fn test_closed_session_rejects_input() {
        let mut session = ReconciliationSession::new();
        assert!(matches!(
            session.set_returned(1, "1"),
            Err(WorkflowError::SessionClosed)
        ));
        assert!(matches!(
            session.begin_submit(),
            Err(WorkflowError::SessionClosed)
        ));
    }
}
