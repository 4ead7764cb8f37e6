//! Domain models for card-status-service.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

// ============================================================================
// Status Record
// ============================================================================

/// Latest known status for a tracked card.
///
/// At most one record exists per `card_id` in the store at any time - the one
/// with the latest timestamp.
#[derive(Debug, Clone, FromRow)]
pub struct StatusRecord {
    pub id: String,
    pub card_id: String,
    pub phone: String,
    pub timestamp: NaiveDateTime,
    pub status: String,
}

// ============================================================================
// Status Sources
// ============================================================================

/// One of the four categorized CSV exports, each representing a shipment
/// lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    Pickup,
    Delivered,
    Redelivery,
    Returned,
}

impl StatusSource {
    /// Ingestion order of the source files.
    pub const ALL: [StatusSource; 4] = [
        Self::Pickup,
        Self::Delivered,
        Self::Redelivery,
        Self::Returned,
    ];

    /// Default status label for rows from this source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Delivered => "delivered",
            Self::Redelivery => "redelivery",
            Self::Returned => "returned",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Pickup => "Sample Card Status Info - Pickup.csv",
            Self::Delivered => "Sample Card Status Info - Delivered.csv",
            Self::Redelivery => "Sample Card Status Info - Delivery exceptions.csv",
            Self::Returned => "Sample Card Status Info - Returned.csv",
        }
    }

    /// Timestamp layout used by this export. The formats differ per upstream
    /// system: pickup carries a 24-hour clock with a vestigial AM/PM token,
    /// delivered is ISO-8601 with a literal `Z`, returned is 12-hour with no
    /// space before the AM/PM marker.
    pub fn timestamp_format(&self) -> &'static str {
        match self {
            Self::Pickup => "%d-%m-%Y %H:%M %p",
            Self::Delivered => "%Y-%m-%dT%H:%M:%SZ",
            Self::Returned => "%d-%m-%Y %I:%M%p",
            Self::Redelivery => "%d-%m-%Y %H:%M",
        }
    }
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Response body for a successful lookup.
#[derive(Debug, Serialize)]
pub struct CardStatusResponse {
    pub card_id: String,
    pub phone_number: String,
    pub timestamp: String,
    pub status: String,
}

impl From<StatusRecord> for CardStatusResponse {
    fn from(r: StatusRecord) -> Self {
        Self {
            card_id: r.card_id,
            phone_number: r.phone,
            timestamp: r.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            status: r.status,
        }
    }
}
