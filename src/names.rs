//! Local validation of hosts, ports and namespace names.
//!
//! These checks run before any round trip so that malformed identifiers
//! surface as `InvalidAddress`/`InvalidName` instead of opaque store errors.

use crate::error::{Error, Result};

const MAX_DATABASE_NAME_BYTES: usize = 64;
const MAX_NAMESPACE_BYTES: usize = 255;
const DATABASE_NAME_FORBIDDEN: &[char] = &['/', '\\', '.', '"', '$', '*', '<', '>', ':', '|', '?', ' '];
const HOST_FORBIDDEN: &[char] = &['/', '?', '#', '@'];

/// Check a database name.
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name("database name cannot be empty"));
    }
    if name.len() >= MAX_DATABASE_NAME_BYTES {
        return Err(Error::invalid_name(format!(
            "database name {name:?} must be shorter than {MAX_DATABASE_NAME_BYTES} bytes"
        )));
    }
    if name.contains('\0') {
        return Err(Error::invalid_name("database name cannot contain NUL"));
    }
    if let Some(c) = name.chars().find(|c| DATABASE_NAME_FORBIDDEN.contains(c)) {
        return Err(Error::invalid_name(format!(
            "database name {name:?} cannot contain {c:?}"
        )));
    }
    Ok(())
}

/// Check a collection name within `db_name`.
pub fn validate_collection_name(db_name: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name("collection name cannot be empty"));
    }
    if name.contains('$') {
        return Err(Error::invalid_name(format!(
            "collection name {name:?} cannot contain '$'"
        )));
    }
    if name.contains('\0') {
        return Err(Error::invalid_name("collection name cannot contain NUL"));
    }
    if name.starts_with("system.") {
        return Err(Error::invalid_name(format!(
            "collection name {name:?} is reserved"
        )));
    }
    // "db.collection"
    if db_name.len() + 1 + name.len() > MAX_NAMESPACE_BYTES {
        return Err(Error::invalid_name(format!(
            "namespace {db_name}.{name} exceeds {MAX_NAMESPACE_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Check the keys of a `$set` payload. Operators and empty keys are not field names.
pub fn validate_field_names(changes: &bson::Document) -> Result<()> {
    for key in changes.keys() {
        if key.is_empty() {
            return Err(Error::invalid_name("field name cannot be empty"));
        }
        if key.starts_with('$') {
            return Err(Error::invalid_name(format!(
                "field name {key:?} cannot start with '$'"
            )));
        }
    }
    Ok(())
}

/// Check a host/port pair.
pub fn validate_address(host: &str, port: u16) -> Result<()> {
    if host.is_empty() {
        return Err(Error::invalid_address("host cannot be empty"));
    }
    if host.chars().any(char::is_whitespace) {
        return Err(Error::invalid_address(format!(
            "host {host:?} cannot contain whitespace"
        )));
    }
    if let Some(c) = host.chars().find(|c| HOST_FORBIDDEN.contains(c)) {
        return Err(Error::invalid_address(format!(
            "host {host:?} cannot contain {c:?}"
        )));
    }
    if port == 0 {
        return Err(Error::invalid_address("port must be non-zero"));
    }
    Ok(())
}
