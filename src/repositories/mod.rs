//! Typed repositories over the row store.
//!
//! Each repository owns one sheet's column layout: parsing is tolerant
//! (missing or malformed cells fall back to defaults) because the sheet is
//! hand-editable; serialization always writes the full fixed-width row.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::Row;

pub mod delivery;
pub mod orders;
pub mod products;
pub mod settings;
pub mod variants;

pub use delivery::DeliveryRepo;
pub use orders::OrderRepo;
pub use products::ProductRepo;
pub use settings::SettingsRepo;
pub use variants::VariantRepo;

pub(crate) fn cell(row: &Row, index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

pub(crate) fn parse_uuid(value: &str) -> Uuid {
    Uuid::parse_str(value).unwrap_or_else(|_| Uuid::nil())
}

pub(crate) fn parse_i64(value: &str) -> i64 {
    value.trim().parse().unwrap_or(0)
}

pub(crate) fn parse_u32(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}

pub(crate) fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

pub(crate) fn parse_datetime(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn bool_cell(value: bool) -> String {
    if value { "TRUE" } else { "FALSE" }.to_string()
}
