//! Price-sync audit records
//!
//! Every sync attempt against a registrar produces one download session.
//! Every cost change it writes produces one change log row pointing at it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pricing::PriceSet;

/// Change source recorded when an admin schedules a cost
pub const CHANGE_SOURCE_MANUAL: &str = "manual";

/// Change source recorded by the registrar price sync
pub const CHANGE_SOURCE_SYNC: &str = "registrar_sync";

/// One sync attempt against one registrar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarTldPriceDownloadSession {
    pub id: i64,

    pub registrar_id: i32,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// False until completed; false afterwards iff an error was caught
    pub success: bool,

    /// Matched offerings that carried price data
    pub tlds_processed: i32,

    /// Offerings whose cost row was superseded
    pub price_changes_detected: i32,

    pub error_message: Option<String>,

    /// Who started the sync (e.g., "scheduler", "api")
    pub triggered_by: String,
}

impl RegistrarTldPriceDownloadSession {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Final counters written when a session completes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutcome {
    pub success: bool,
    pub tlds_processed: i32,
    pub price_changes_detected: i32,
    pub error_message: Option<String>,
}

/// Recorded change of a registrar-TLD cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarTldPriceChangeLog {
    pub id: i64,

    pub registrar_tld_id: i32,

    /// None for manual changes
    pub download_session_id: Option<i64>,

    pub old_registration_price: Option<Decimal>,
    pub new_registration_price: Decimal,

    pub old_renewal_price: Option<Decimal>,
    pub new_renewal_price: Decimal,

    pub old_transfer_price: Option<Decimal>,
    pub new_transfer_price: Decimal,

    pub old_currency: Option<String>,
    pub new_currency: String,

    pub change_source: String,

    pub changed_at: DateTime<Utc>,
}

/// Data for inserting a change log row
#[derive(Debug, Clone)]
pub struct NewPriceChangeLog {
    pub registrar_tld_id: i32,
    pub download_session_id: Option<i64>,
    pub old_costs: Option<PriceSet>,
    pub new_costs: PriceSet,
    pub old_currency: Option<String>,
    pub new_currency: String,
    pub change_source: String,
    pub changed_at: DateTime<Utc>,
}
