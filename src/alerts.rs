//! Stock alert board: state filter plus date ordering.

use std::cmp::Ordering;
use std::str::FromStr;

use tracing::{info, warn};

use crate::api::InventoryApi;
use crate::error::ApiError;
use crate::models::{Alert, AlertState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertFilter {
    #[default]
    All,
    State(AlertState),
}

impl FromStr for AlertFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "todas" => Ok(AlertFilter::All),
            other => other.parse().map(AlertFilter::State),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "desc" | "newest" => Ok(SortOrder::NewestFirst),
            "asc" | "oldest" => Ok(SortOrder::OldestFirst),
            other => Err(format!("Unknown sort order: {other}")),
        }
    }
}

/// Filter and order alerts. Undated alerts go last in either order; ties
/// keep backend order.
pub fn arrange_alerts(alerts: &[Alert], filter: AlertFilter, order: SortOrder) -> Vec<&Alert> {
    let mut out: Vec<&Alert> = alerts
        .iter()
        .filter(|a| match filter {
            AlertFilter::All => true,
            AlertFilter::State(state) => a.state == state,
        })
        .collect();

    out.sort_by(|a, b| match (a.timestamp(), b.timestamp()) {
        (Some(x), Some(y)) => match order {
            SortOrder::NewestFirst => y.cmp(&x),
            SortOrder::OldestFirst => x.cmp(&y),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    out
}

#[derive(Debug, Clone, Default)]
pub struct AlertBoard {
    alerts: Vec<Alert>,
    filter: AlertFilter,
    order: SortOrder,
    last_error: Option<String>,
}

impl AlertBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn load<A>(&mut self, api: &A) -> Result<(), ApiError>
    where
        A: InventoryApi + ?Sized,
    {
        match api.list_alerts().await {
            Ok(alerts) => {
                info!(count = alerts.len(), "alerts loaded");
                self.alerts = alerts;
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to load alerts");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn set_filter(&mut self, filter: AlertFilter) {
        self.filter = filter;
    }

    pub fn set_order(&mut self, order: SortOrder) {
        self.order = order;
    }

    pub fn visible(&self) -> Vec<&Alert> {
        arrange_alerts(&self.alerts, self.filter, self.order)
    }
}
