//! Tolerant parser for `subscription-manager list` output.
//!
//! The tool prints free-text blocks separated by blank lines, with
//! fields identified by literal label prefixes. The format is not a
//! stable contract, so the parser degrades gracefully: blocks without
//! a pool id are dropped, and a malformed numeric field becomes absent
//! instead of aborting the parse.

use tracing::debug;

/// One entitlement pool as printed by a `list` query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolRecord {
    pub pool_id: String,
    pub subscription_name: Option<String>,
    pub available: Option<u32>,
    pub service_level: Option<String>,
    pub quantity_used: Option<u32>,
    pub serial: Option<String>,
    pub active: Option<bool>,
}

/// Which `list` query produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    /// `list --available`: the `Available` count matters.
    Available,
    /// `list --consumed`: `Serial` and `Quantity Used` matter.
    Consumed,
}

/// Parse a listing into pool records, discarding blocks that lack a
/// `Pool ID` field.
pub fn parse_pools(raw: &str, kind: ListingKind) -> Vec<PoolRecord> {
    let mut records = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in raw.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !block.is_empty() {
                if let Some(record) = parse_block(&block, kind) {
                    records.push(record);
                }
                block.clear();
            }
        } else {
            block.push(line);
        }
    }

    records
}

fn parse_block(lines: &[&str], kind: ListingKind) -> Option<PoolRecord> {
    let mut record = PoolRecord::default();

    for line in lines {
        let line = line.trim();
        if let Some(value) = labeled(line, "Pool ID:") {
            record.pool_id = value.to_string();
        } else if let Some(value) = labeled(line, "Subscription Name:") {
            record.subscription_name = Some(value.to_string());
        } else if let Some(value) = labeled(line, "Service Level:") {
            record.service_level = Some(value.to_string());
        } else {
            match kind {
                ListingKind::Available => {
                    if let Some(value) = labeled(line, "Available:") {
                        record.available = parse_count(value, "Available");
                    }
                }
                ListingKind::Consumed => {
                    if let Some(value) = labeled(line, "Serial:") {
                        record.serial = Some(value.to_string());
                    } else if let Some(value) = labeled(line, "Quantity Used:") {
                        record.quantity_used = parse_count(value, "Quantity Used");
                    } else if let Some(value) = labeled(line, "Active:") {
                        record.active = match value {
                            "True" | "true" => Some(true),
                            "False" | "false" => Some(false),
                            _ => None,
                        };
                    }
                }
            }
        }
    }

    if record.pool_id.is_empty() {
        return None;
    }
    Some(record)
}

fn labeled<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.strip_prefix(label).map(str::trim)
}

fn parse_count(value: &str, field: &str) -> Option<u32> {
    match value.parse() {
        Ok(count) => Some(count),
        Err(_) => {
            debug!(field, value, "non-numeric field in listing, treating as absent");
            None
        }
    }
}
