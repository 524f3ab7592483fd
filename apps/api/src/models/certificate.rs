use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::analysis::AnalysisRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRow {
    pub id: Uuid,
    pub user_id: String,
    pub certificate_number: String,
    pub laboratory: Option<String>,
    pub pdf_url: Option<String>,
    pub raw_data: Option<Value>,
    pub carat: Option<f64>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub cut: Option<String>,
    pub polish: Option<String>,
    pub symmetry: Option<String>,
    pub fluorescence: Option<String>,
    pub measurements: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateWithAnalyses {
    #[serde(flatten)]
    pub certificate: CertificateRow,
    pub analyses: Vec<AnalysisRow>,
}
