//! In-memory backend used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::InventoryApi;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Alert, LocatedSupply, Movement, MovementPage, OperatorContext, Pagination, RequestStatus,
    ReturnPayload, TeacherRanking, UsageRequest,
};

#[derive(Default)]
pub(crate) struct FakeApi {
    movements: Vec<Movement>,
    total_pages: u32,
    requests: Mutex<Vec<UsageRequest>>,
    alerts: Vec<Alert>,
    locations: HashMap<String, Vec<LocatedSupply>>,
    teachers: Vec<TeacherRanking>,
    fail_next: Mutex<Option<ApiError>>,
    movement_calls: Mutex<Vec<(u32, u32)>>,
    returns: Mutex<Vec<(i64, ReturnPayload, String)>>,
    return_keys: Mutex<Vec<String>>,
    status_updates: Mutex<Vec<(i64, RequestStatus)>>,
}

impl FakeApi {
    pub(crate) fn with_movements(movements: Vec<Movement>, total_pages: u32) -> Self {
        Self {
            movements,
            total_pages,
            ..Self::default()
        }
    }

    pub(crate) fn with_request(self, request: UsageRequest) -> Self {
        self.requests.lock().unwrap().push(request);
        self
    }

    pub(crate) fn with_alerts(mut self, alerts: Vec<Alert>) -> Self {
        self.alerts = alerts;
        self
    }

    pub(crate) fn with_location(mut self, code: &str, supplies: Vec<LocatedSupply>) -> Self {
        self.locations.insert(code.to_string(), supplies);
        self
    }

    pub(crate) fn with_teachers(mut self, teachers: Vec<TeacherRanking>) -> Self {
        self.teachers = teachers;
        self
    }

    /// Make the next call, whatever it is, fail with `err`.
    pub(crate) fn fail_next(&self, err: ApiError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    pub(crate) fn movement_calls(&self) -> Vec<(u32, u32)> {
        self.movement_calls.lock().unwrap().clone()
    }

    pub(crate) fn returns(&self) -> Vec<(i64, ReturnPayload, String)> {
        self.returns.lock().unwrap().clone()
    }

    /// Idempotency key of every return attempt, failed ones included.
    pub(crate) fn return_keys(&self) -> Vec<String> {
        self.return_keys.lock().unwrap().clone()
    }

    pub(crate) fn status_updates(&self) -> Vec<(i64, RequestStatus)> {
        self.status_updates.lock().unwrap().clone()
    }

    fn check_failure(&self) -> ApiResult<()> {
        match self.fail_next.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn not_found() -> ApiError {
        ApiError::Server {
            status: 404,
            message: "Solicitud no encontrada".into(),
        }
    }
}

#[async_trait]
impl InventoryApi for FakeApi {
    async fn list_movements(
        &self,
        _operator: &OperatorContext,
        page: u32,
        page_size: u32,
    ) -> ApiResult<MovementPage> {
        self.check_failure()?;
        self.movement_calls.lock().unwrap().push((page, page_size));
        Ok(MovementPage {
            data: self.movements.clone(),
            paginacion: Pagination {
                page,
                page_size,
                total: self.movements.len() as u64,
                total_pages: self.total_pages,
            },
        })
    }

    async fn get_usage_request(&self, request_id: i64) -> ApiResult<UsageRequest> {
        self.check_failure()?;
        self.requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == request_id)
            .cloned()
            .ok_or_else(Self::not_found)
    }

    async fn return_supplies(
        &self,
        _operator: &OperatorContext,
        request_id: i64,
        payload: &ReturnPayload,
        idempotency_key: &str,
    ) -> ApiResult<()> {
        self.return_keys
            .lock()
            .unwrap()
            .push(idempotency_key.to_string());
        self.check_failure()?;
        self.returns
            .lock()
            .unwrap()
            .push((request_id, payload.clone(), idempotency_key.to_string()));
        Ok(())
    }

    async fn list_usage_requests(
        &self,
        _operator: &OperatorContext,
    ) -> ApiResult<Vec<UsageRequest>> {
        self.check_failure()?;
        Ok(self.requests.lock().unwrap().clone())
    }

    async fn update_request_status(
        &self,
        _operator: &OperatorContext,
        request_id: i64,
        status: RequestStatus,
    ) -> ApiResult<()> {
        self.check_failure()?;
        let mut requests = self.requests.lock().unwrap();
        let request = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(Self::not_found)?;
        request.status = Some(status);
        self.status_updates.lock().unwrap().push((request_id, status));
        Ok(())
    }

    async fn list_alerts(&self) -> ApiResult<Vec<Alert>> {
        self.check_failure()?;
        Ok(self.alerts.clone())
    }

    async fn supplies_at_location(&self, location_code: &str) -> ApiResult<Vec<LocatedSupply>> {
        self.check_failure()?;
        Ok(self
            .locations
            .get(location_code)
            .cloned()
            .unwrap_or_default())
    }

    async fn top_teachers(&self) -> ApiResult<Vec<TeacherRanking>> {
        self.check_failure()?;
        Ok(self.teachers.clone())
    }
}
