//! Shelf lookup from a scanned QR code.
//!
//! Shelf QR codes carry the shelf code only (e.g. `E3`); each shelf has five
//! slots numbered `0..=4`, and the backend location code is the shelf code
//! followed by the slot number.

use tracing::{info, warn};

use crate::api::InventoryApi;
use crate::error::WorkflowError;
use crate::models::LocatedSupply;

pub const SLOTS_PER_SHELF: u8 = 5;

/// Validate a scanned QR payload as a shelf code.
pub fn parse_shelf_code(scanned: &str) -> Option<String> {
    let code = scanned.trim();
    if code.is_empty() || code.len() > 32 || code.chars().any(char::is_control) {
        return None;
    }
    Some(code.to_string())
}

pub fn location_code(shelf: &str, slot: u8) -> String {
    format!("{shelf}{slot}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShelfLookup {
    shelf: String,
    location: Option<String>,
    supplies: Vec<LocatedSupply>,
}

impl ShelfLookup {
    /// `None` when the scan is not a usable shelf code.
    pub fn from_scan(scanned: &str) -> Option<Self> {
        let shelf = parse_shelf_code(scanned)?;
        info!(shelf = %shelf, "shelf code scanned");
        Some(Self {
            shelf,
            location: None,
            supplies: Vec::new(),
        })
    }

    pub fn shelf(&self) -> &str {
        &self.shelf
    }

    /// Location code of the last slot opened.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn supplies(&self) -> &[LocatedSupply] {
        &self.supplies
    }

    /// Fetch what is stored in `slot`. An empty result is a valid answer.
    pub async fn open_slot<A>(
        &mut self,
        api: &A,
        slot: u8,
    ) -> Result<&[LocatedSupply], WorkflowError>
    where
        A: InventoryApi + ?Sized,
    {
        if slot >= SLOTS_PER_SHELF {
            return Err(WorkflowError::NoSuchSlot(slot));
        }
        let code = location_code(&self.shelf, slot);
        match api.supplies_at_location(&code).await {
            Ok(supplies) => {
                info!(location = %code, count = supplies.len(), "shelf slot loaded");
                self.location = Some(code);
                self.supplies = supplies;
                Ok(&self.supplies)
            }
            Err(e) => {
                warn!(location = %code, error = %e, "failed to load shelf slot");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;

    fn supply(id: i64, name: &str) -> LocatedSupply {
        LocatedSupply {
            supply_id: id,
            name: name.into(),
            quantity: Some(3),
            unit: None,
            location: Some("E32".into()),
        }
    }

    #[test]
    fn test_parse_shelf_code() {
        assert_eq!(parse_shelf_code("  E3\n"), Some("E3".to_string()));
        assert_eq!(parse_shelf_code("   "), None);
        assert_eq!(parse_shelf_code("E\u{0}3"), None);
        assert_eq!(location_code("E3", 2), "E32");
    }

    #[tokio::test]
    async fn test_open_slot() {
        let api = FakeApi::default().with_location("E32", vec![supply(1, "Probeta")]);
        let mut lookup = ShelfLookup::from_scan("E3\r\n").unwrap();

        let found = lookup.open_slot(&api, 2).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(lookup.location(), Some("E32"));

        let empty = lookup.open_slot(&api, 0).await.unwrap();
        assert!(empty.is_empty());
        assert_eq!(lookup.location(), Some("E30"));

        assert!(matches!(
            lookup.open_slot(&api, 5).await,
            Err(WorkflowError::NoSuchSlot(5))
        ));
    }
}
