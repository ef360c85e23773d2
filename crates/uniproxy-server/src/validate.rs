//! Path-parameter validation

use crate::error::ApiError;

/// Universalis datacenters accepted in the path, matched case-insensitively.
pub const DATACENTERS: &[&str] = &[
    "Aether", "Crystal", "Dynamis", "Primal", "Chaos", "Light", "Shadow", "Elemental", "Gaia",
    "Mana", "Meteor", "Materia",
];

pub const MAX_ITEM_IDS: usize = 100;
pub const MAX_ITEM_ID: u64 = 1_000_000;

/// How many offending values an error body lists at most
const MAX_REPORTED: usize = 10;

/// Check the datacenter against the whitelist.
pub fn validate_datacenter(name: &str) -> Result<(), ApiError> {
    if DATACENTERS.iter().any(|dc| dc.eq_ignore_ascii_case(name)) {
        Ok(())
    } else {
        Err(ApiError::InvalidInput {
            message: format!("Invalid datacenter: {name}"),
            offending: vec![name.to_string()],
        })
    }
}

/// Decompose the raw `itemIds` segment into 1..=100 item ids, each in
/// `[1, 1_000_000]`.
pub fn parse_item_ids(raw: &str) -> Result<Vec<u32>, ApiError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit() || b == b',') {
        return Err(ApiError::InvalidInput {
            message: "Item ids must be a comma-separated list of numbers".to_string(),
            offending: vec![raw.chars().take(64).collect()],
        });
    }

    let mut ids = Vec::new();
    let mut offending = Vec::new();
    for segment in raw.split(',').filter(|s| !s.is_empty()) {
        match segment.parse::<u64>() {
            Ok(id) if (1..=MAX_ITEM_ID).contains(&id) => ids.push(id as u32),
            _ => {
                if offending.len() < MAX_REPORTED {
                    offending.push(segment.to_string());
                }
            }
        }
    }

    if !offending.is_empty() {
        return Err(ApiError::InvalidInput {
            message: format!("Item ids must be between 1 and {MAX_ITEM_ID}"),
            offending,
        });
    }
    if ids.is_empty() {
        return Err(ApiError::InvalidInput {
            message: "No item ids provided".to_string(),
            offending: Vec::new(),
        });
    }
    if ids.len() > MAX_ITEM_IDS {
        return Err(ApiError::InvalidInput {
            message: format!("Too many item ids: {} (max {MAX_ITEM_IDS})", ids.len()),
            offending: Vec::new(),
        });
    }

    Ok(ids)
}
