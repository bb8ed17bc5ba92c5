//! Wire types for the inventory backend.
//!
//! Field names follow the backend's JSON (Spanish, snake_case for rows,
//! camelCase for pagination). Numeric fields are read leniently because the
//! backend sometimes returns SQL decimals and echoed query parameters as
//! strings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Lenient number decoding
// ---------------------------------------------------------------------------

fn value_to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

fn de_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    value_to_i64(&v).ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {v}")))
}

fn de_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(value_to_i64))
}

fn de_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = de_i64(deserializer)?;
    Ok(n.clamp(0, u32::MAX as i64) as u32)
}

fn de_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let n = de_i64(deserializer)?;
    Ok(n.max(0) as u64)
}

/// Parse a backend timestamp. Accepts RFC 3339, naive `YYYY-MM-DD[T ]HH:MM:SS`
/// (taken as UTC) and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    let utc = FixedOffset::east_opt(0)?;
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| utc.from_utc_datetime(&naive))
}

// ---------------------------------------------------------------------------
// Operator identity
// ---------------------------------------------------------------------------

/// The logged-in lab operator ("encargado"). Passed explicitly to every load
/// and write so requests can be attributed on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorContext {
    pub id: String,
    pub name: String,
}

impl OperatorContext {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Movements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    /// Outbound: supplies leave the store on loan.
    #[serde(rename = "PRESTAMO")]
    Loan,
    /// Inbound: supplies come back.
    #[serde(rename = "DEVOLUCION")]
    Return,
    #[serde(other)]
    Other,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Loan => "PRESTAMO",
            MovementType::Return => "DEVOLUCION",
            MovementType::Other => "OTRO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    #[serde(rename = "id_movimiento", deserialize_with = "de_i64")]
    pub id: i64,
    #[serde(rename = "tipo_movimiento")]
    pub kind: MovementType,
    #[serde(rename = "cantidad", default, deserialize_with = "de_opt_i64")]
    pub quantity: Option<i64>,
    #[serde(rename = "unidad_medida", default)]
    pub unit: Option<String>,
    #[serde(rename = "fecha_entregado", default)]
    pub delivered_at: Option<String>,
    #[serde(rename = "id_solicitud", default, deserialize_with = "de_opt_i64")]
    pub request_id: Option<i64>,
    #[serde(rename = "responsable", default)]
    pub responsible: Option<String>,
    #[serde(rename = "estado", default)]
    pub status: Option<String>,
    #[serde(rename = "insumo_nombre", default)]
    pub supply_name: Option<String>,
}

impl Movement {
    pub fn delivered_time(&self) -> Option<DateTime<FixedOffset>> {
        self.delivered_at.as_deref().and_then(parse_timestamp)
    }

    /// Only approved loans can be completed with a return.
    pub fn can_complete(&self) -> bool {
        self.status
            .as_deref()
            .and_then(|s| s.parse::<RequestStatus>().ok())
            == Some(RequestStatus::Approved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(rename = "paginaActual", deserialize_with = "de_u32")]
    pub page: u32,
    #[serde(rename = "porPagina", deserialize_with = "de_u32")]
    pub page_size: u32,
    #[serde(rename = "totalRegistros", deserialize_with = "de_u64")]
    pub total: u64,
    #[serde(rename = "totalPaginas", deserialize_with = "de_u32")]
    pub total_pages: u32,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            total: 0,
            total_pages: 1,
        }
    }
}

impl Pagination {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementPage {
    pub data: Vec<Movement>,
    pub paginacion: Pagination,
}

// ---------------------------------------------------------------------------
// Usage requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "Aprobada")]
    Approved,
    #[serde(rename = "Completada")]
    Completed,
    #[serde(rename = "Rechazada")]
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Completed,
        RequestStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pendiente",
            RequestStatus::Approved => "Aprobada",
            RequestStatus::Completed => "Completada",
            RequestStatus::Rejected => "Rechazada",
        }
    }

    /// Pending requests are approved or rejected; approved ones are completed.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::Approved, RequestStatus::Completed)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pendiente" | "pending" => Ok(RequestStatus::Pending),
            "aprobada" | "approved" => Ok(RequestStatus::Approved),
            "completada" | "completed" => Ok(RequestStatus::Completed),
            "rechazada" | "rejected" => Ok(RequestStatus::Rejected),
            other => Err(format!("Unknown request status: {other}")),
        }
    }
}

/// One supply entry within a usage request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyLine {
    #[serde(rename = "id_insumo", deserialize_with = "de_i64")]
    pub supply_id: i64,
    #[serde(rename = "insumo_nombre", default)]
    pub name: String,
    #[serde(rename = "unidad_medida", default)]
    pub unit: Option<String>,
    #[serde(rename = "cantidad_total", deserialize_with = "de_i64")]
    pub total_loaned: i64,
    #[serde(rename = "cantidad_por_grupo", default, deserialize_with = "de_opt_i64")]
    pub per_group: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRequest {
    #[serde(rename = "id_solicitud", deserialize_with = "de_i64")]
    pub id: i64,
    #[serde(rename = "responsable", default)]
    pub responsible: Option<String>,
    #[serde(rename = "docente_nombre", default)]
    pub teacher_name: Option<String>,
    #[serde(rename = "practica_titulo", default)]
    pub practice_title: Option<String>,
    #[serde(rename = "laboratorio_nombre", default)]
    pub laboratory_name: Option<String>,
    #[serde(rename = "fecha_hora_inicio", default)]
    pub starts_at: Option<String>,
    #[serde(rename = "fecha_hora_fin", default)]
    pub ends_at: Option<String>,
    #[serde(rename = "estado", default, deserialize_with = "de_opt_status")]
    pub status: Option<RequestStatus>,
    #[serde(rename = "insumos", default)]
    pub supplies: Vec<SupplyLine>,
}

fn de_opt_status<'de, D>(deserializer: D) -> Result<Option<RequestStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// Remainder the operator reports as not returned for one supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotReturned {
    #[serde(rename = "id_insumo")]
    pub supply_id: i64,
    #[serde(rename = "cantidad_no_devuelta")]
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnPayload {
    pub insumos_no_devueltos: Vec<NotReturned>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub estado: RequestStatus,
}

// ---------------------------------------------------------------------------
// Alerts, shelf lookups, dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertState {
    #[serde(rename = "Activa")]
    Active,
    #[serde(rename = "Inactiva")]
    Inactive,
    #[serde(rename = "Resuelta")]
    Resolved,
    #[serde(other)]
    Unknown,
}

impl FromStr for AlertState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "activa" | "active" => Ok(AlertState::Active),
            "inactiva" | "inactive" => Ok(AlertState::Inactive),
            "resuelta" | "resolved" => Ok(AlertState::Resolved),
            other => Err(format!("Unknown alert state: {other}")),
        }
    }
}

/// Stock alert raised by the backend when a supply leaves its min/max band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "id_alerta", default, deserialize_with = "de_opt_i64")]
    pub id: Option<i64>,
    #[serde(rename = "insumo_nombre", default)]
    pub supply_name: Option<String>,
    #[serde(rename = "estado")]
    pub state: AlertState,
    #[serde(rename = "stock_actual", default, deserialize_with = "de_opt_i64")]
    pub stock_current: Option<i64>,
    #[serde(rename = "stock_minimo", default, deserialize_with = "de_opt_i64")]
    pub stock_min: Option<i64>,
    #[serde(rename = "stock_maximo", default, deserialize_with = "de_opt_i64")]
    pub stock_max: Option<i64>,
    #[serde(rename = "fecha", default)]
    pub date: Option<String>,
}

impl Alert {
    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.date.as_deref().and_then(parse_timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedSupply {
    #[serde(rename = "id_insumo", deserialize_with = "de_i64")]
    pub supply_id: i64,
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(rename = "cantidad", default, deserialize_with = "de_opt_i64")]
    pub quantity: Option<i64>,
    #[serde(rename = "unidad_medida", default)]
    pub unit: Option<String>,
    #[serde(rename = "ubicacion", default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherRanking {
    #[serde(rename = "nombre_docente")]
    pub teacher_name: String,
    #[serde(rename = "total_laboratorios", deserialize_with = "de_i64")]
    pub total_sessions: i64,
}
