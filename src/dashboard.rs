//! Home screen chart data.

use tracing::warn;

use crate::api::InventoryApi;
use crate::error::ApiError;
use crate::models::TeacherRanking;

/// Bar chart series: one label per teacher, one value per bar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeacherChart {
    pub labels: Vec<String>,
    pub values: Vec<i64>,
}

impl From<&[TeacherRanking]> for TeacherChart {
    fn from(rankings: &[TeacherRanking]) -> Self {
        Self {
            labels: rankings
                .iter()
                .map(|r| r.teacher_name.trim().to_string())
                .collect(),
            values: rankings.iter().map(|r| r.total_sessions).collect(),
        }
    }
}

pub async fn load_teacher_chart<A>(api: &A) -> Result<TeacherChart, ApiError>
where
    A: InventoryApi + ?Sized,
{
    let rankings = api.top_teachers().await.map_err(|e| {
        warn!(error = %e, "failed to load teacher chart");
        e
    })?;
    Ok(TeacherChart::from(rankings.as_slice()))
}
