//! Operator identity storage using the OS credential store.
//!
//! On Windows this uses DPAPI (via the `keyring` crate), on macOS Keychain,
//! and on Linux the kernel keyring. The stored identity is only read at
//! start-up; stores receive it as an explicit [`OperatorContext`].

use keyring::Entry;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::models::OperatorContext;

const SERVICE_NAME: &str = "lab-supplies";

const KEY_OPERATOR: &str = "operator";

/// Serialized form kept in the credential store.
pub fn encode_operator(operator: &OperatorContext) -> Result<String, StorageError> {
    Ok(serde_json::to_string(operator)?)
}

/// Decode a stored operator, rejecting blank ids.
pub fn decode_operator(raw: &str) -> Result<Option<OperatorContext>, StorageError> {
    let operator: OperatorContext = serde_json::from_str(raw)?;
    if operator.id.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(operator))
}

fn entry(key: &str) -> Result<Entry, StorageError> {
    Ok(Entry::new(SERVICE_NAME, key)?)
}

/// Load the logged-in operator. `None` when nobody is logged in.
pub fn load_operator() -> Result<Option<OperatorContext>, StorageError> {
    match entry(KEY_OPERATOR)?.get_password() {
        Ok(raw) => decode_operator(&raw),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => {
            warn!(error = %e, "keyring: failed to read operator");
            Err(e.into())
        }
    }
}

pub fn save_operator(operator: &OperatorContext) -> Result<(), StorageError> {
    entry(KEY_OPERATOR)?.set_password(&encode_operator(operator)?)?;
    info!(operator_id = %operator.id, "operator identity stored");
    Ok(())
}

/// Forget the stored operator. Succeeds if nobody was stored.
pub fn clear_operator() -> Result<(), StorageError> {
    match entry(KEY_OPERATOR)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => {
            info!("operator identity cleared");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
