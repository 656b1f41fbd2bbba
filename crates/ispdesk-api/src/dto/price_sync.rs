//! Registrar price sync DTOs

use ispdesk_core::models::RegistrarTldPriceDownloadSession;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::{deserialize_number_from_string, PaginationParams};

/// Query parameters for a single registrar sync
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRegistrarQuery {
    /// Sync even if the registrar was already synced today
    #[serde(default)]
    pub force: bool,
}

/// Query parameters for listing download sessions
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SessionListQuery {
    pub registrar_id: Option<i32>,

    #[serde(default = "default_page", deserialize_with = "deserialize_number_from_string")]
    #[validate(range(min = 1))]
    pub page: i64,

    #[serde(default = "default_per_page", deserialize_with = "deserialize_number_from_string")]
    #[validate(range(min = 1, max = 200))]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

impl SessionListQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Query parameters for change log lookups
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangeLogQuery {
    #[serde(default = "default_change_limit", deserialize_with = "deserialize_number_from_string")]
    #[validate(range(min = 1, max = 500))]
    pub limit: i64,
}

fn default_change_limit() -> i64 {
    50
}

/// Summary of a sync run over several registrars
#[derive(Debug, Clone, Serialize)]
pub struct SyncRunResponse {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub price_changes_detected: i64,
    pub sessions: Vec<RegistrarTldPriceDownloadSession>,
}

impl From<Vec<RegistrarTldPriceDownloadSession>> for SyncRunResponse {
    fn from(sessions: Vec<RegistrarTldPriceDownloadSession>) -> Self {
        let succeeded = sessions.iter().filter(|s| s.success).count();
        let price_changes_detected = sessions
            .iter()
            .map(|s| i64::from(s.price_changes_detected))
            .sum();

        Self {
            attempted: sessions.len(),
            succeeded,
            failed: sessions.len() - succeeded,
            price_changes_detected,
            sessions,
        }
    }
}
