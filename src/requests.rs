//! Usage request review.
//!
//! Lists laboratory usage requests, narrows them to one status, counts them
//! per status for the summary cards, and moves a request through its review
//! (approve, reject, complete) on the backend.

use tracing::{info, warn};

use crate::api::InventoryApi;
use crate::error::{ApiError, WorkflowError};
use crate::models::{OperatorContext, RequestStatus, UsageRequest};

/// Requests currently in `status`.
pub fn filter_by_status(requests: &[UsageRequest], status: RequestStatus) -> Vec<&UsageRequest> {
    requests
        .iter()
        .filter(|r| r.status == Some(status))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub completed: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn get(&self, status: RequestStatus) -> usize {
        match status {
            RequestStatus::Pending => self.pending,
            RequestStatus::Approved => self.approved,
            RequestStatus::Completed => self.completed,
            RequestStatus::Rejected => self.rejected,
        }
    }
}

pub fn count_by_status(requests: &[UsageRequest]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for request in requests {
        match request.status {
            Some(RequestStatus::Pending) => counts.pending += 1,
            Some(RequestStatus::Approved) => counts.approved += 1,
            Some(RequestStatus::Completed) => counts.completed += 1,
            Some(RequestStatus::Rejected) => counts.rejected += 1,
            None => {}
        }
    }
    counts
}

#[derive(Debug, Clone)]
pub struct UsageRequestStore {
    requests: Vec<UsageRequest>,
    status_filter: RequestStatus,
    visible: Vec<UsageRequest>,
    last_error: Option<String>,
}

impl Default for UsageRequestStore {
    fn default() -> Self {
        Self {
            requests: Vec::new(),
            status_filter: RequestStatus::Pending,
            visible: Vec::new(),
            last_error: None,
        }
    }
}

impl UsageRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[UsageRequest] {
        &self.requests
    }

    pub fn visible(&self) -> &[UsageRequest] {
        &self.visible
    }

    pub fn status_filter(&self) -> RequestStatus {
        self.status_filter
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn counts(&self) -> StatusCounts {
        count_by_status(&self.requests)
    }

    pub async fn load<A>(&mut self, api: &A, operator: &OperatorContext) -> Result<(), ApiError>
    where
        A: InventoryApi + ?Sized,
    {
        match api.list_usage_requests(operator).await {
            Ok(requests) => {
                info!(count = requests.len(), "usage requests loaded");
                self.requests = requests;
                self.last_error = None;
                self.refresh_visible();
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to load usage requests");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn set_status_filter(&mut self, status: RequestStatus) -> &[UsageRequest] {
        self.status_filter = status;
        self.refresh_visible();
        &self.visible
    }

    /// Move a request to `next` and reload. The transition is checked against
    /// the locally known status before anything is sent.
    pub async fn change_status<A>(
        &mut self,
        api: &A,
        operator: &OperatorContext,
        request_id: i64,
        next: RequestStatus,
    ) -> Result<(), WorkflowError>
    where
        A: InventoryApi + ?Sized,
    {
        let current = self
            .requests
            .iter()
            .find(|r| r.id == request_id)
            .and_then(|r| r.status);
        if let Some(from) = current {
            if !from.can_transition_to(next) {
                return Err(WorkflowError::InvalidTransition { from, to: next });
            }
        }

        if let Err(e) = api.update_request_status(operator, request_id, next).await {
            warn!(request_id, status = %next, error = %e, "request status change failed");
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }
        info!(request_id, status = %next, "request status changed");

        self.load(api, operator).await?;
        Ok(())
    }

    fn refresh_visible(&mut self) {
        self.visible = filter_by_status(&self.requests, self.status_filter)
            .into_iter()
            .cloned()
            .collect();
    }
}
