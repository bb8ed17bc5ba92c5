//! Inventory movement list.
//!
//! Holds one fetched page of movements plus the type filter and search term.
//! The visible subset is a pure derivation recomputed after every change.

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::api::InventoryApi;
use crate::error::ApiError;
use crate::models::{Movement, MovementType, OperatorContext, Pagination};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Only(MovementType),
}

impl TypeFilter {
    pub fn matches(&self, kind: MovementType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(wanted) => *wanted == kind && kind != MovementType::Other,
        }
    }
}

impl FromStr for TypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ALL" | "TODOS" => Ok(TypeFilter::All),
            "PRESTAMO" | "SALIDA" | "OUTBOUND" => Ok(TypeFilter::Only(MovementType::Loan)),
            "DEVOLUCION" | "ENTRADA" | "INBOUND" => Ok(TypeFilter::Only(MovementType::Return)),
            other => Err(format!("Unknown movement filter: {other}")),
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFilter::All => f.write_str("ALL"),
            TypeFilter::Only(kind) => f.write_str(kind.as_str()),
        }
    }
}

fn contains_ci(haystack: Option<&str>, needle_lower: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(needle_lower))
        .unwrap_or(false)
}

/// Visible subset of `movements` for a filter and search term.
///
/// A movement is visible when its type passes the filter and the term is
/// empty or found (case-insensitively) in the supply name, the responsible
/// party or the request id.
pub fn filter_movements<'a>(
    movements: &'a [Movement],
    filter: TypeFilter,
    search_term: &str,
) -> Vec<&'a Movement> {
    let term = search_term.to_lowercase();
    movements
        .iter()
        .filter(|m| filter.matches(m.kind))
        .filter(|m| {
            term.is_empty()
                || contains_ci(m.supply_name.as_deref(), &term)
                || contains_ci(m.responsible.as_deref(), &term)
                || m.request_id
                    .map(|id| id.to_string().contains(&term))
                    .unwrap_or(false)
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct MovementListStore {
    movements: Vec<Movement>,
    visible: Vec<Movement>,
    pagination: Pagination,
    filter: TypeFilter,
    search_term: String,
    last_error: Option<String>,
}

impl MovementListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            pagination: Pagination {
                page_size: page_size.max(1),
                ..Pagination::default()
            },
            ..Self::default()
        }
    }

    pub fn movements(&self) -> &[Movement] {
        &self.movements
    }

    pub fn visible(&self) -> &[Movement] {
        &self.visible
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn filter(&self) -> TypeFilter {
        self.filter
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Message from the last failed load, cleared by the next good one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Fetch one page, replacing the held page. On failure the previous page
    /// stays in place and the error is kept for display.
    pub async fn load<A>(
        &mut self,
        api: &A,
        operator: &OperatorContext,
        page: u32,
    ) -> Result<(), ApiError>
    where
        A: InventoryApi + ?Sized,
    {
        let page = page.max(1);
        let page_size = self.pagination.page_size.max(1);

        match api.list_movements(operator, page, page_size).await {
            Ok(result) => {
                let mut pagination = result.paginacion;
                if pagination.page == 0 {
                    pagination.page = page;
                }
                if pagination.page_size == 0 {
                    pagination.page_size = page_size;
                }
                self.movements = result.data;
                self.pagination = pagination;
                self.last_error = None;
                self.refresh_visible();
                info!(
                    page = pagination.page,
                    total_pages = pagination.total_pages,
                    count = self.movements.len(),
                    "inventory movements loaded"
                );
                Ok(())
            }
            Err(e) => {
                warn!(page, error = %e, "failed to load inventory movements");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Load the next page if there is one. Returns `false` on the last page.
    pub async fn load_more<A>(
        &mut self,
        api: &A,
        operator: &OperatorContext,
    ) -> Result<bool, ApiError>
    where
        A: InventoryApi + ?Sized,
    {
        if !self.pagination.has_next() {
            return Ok(false);
        }
        let next = self.pagination.page + 1;
        self.load(api, operator, next).await?;
        Ok(true)
    }

    /// Reload the page currently held.
    pub async fn reload<A>(&mut self, api: &A, operator: &OperatorContext) -> Result<(), ApiError>
    where
        A: InventoryApi + ?Sized,
    {
        let page = self.pagination.page;
        self.load(api, operator, page).await
    }

    /// Change filter and search term and return the new visible subset.
    pub fn apply_filter(&mut self, filter: TypeFilter, search_term: &str) -> &[Movement] {
        self.filter = filter;
        self.search_term = search_term.to_string();
        self.refresh_visible();
        &self.visible
    }

    fn refresh_visible(&mut self) {
        self.visible = filter_movements(&self.movements, self.filter, &self.search_term)
            .into_iter()
            .cloned()
            .collect();
    }
}
