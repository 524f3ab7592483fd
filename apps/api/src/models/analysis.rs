use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::certificate::CertificateRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRow {
    pub id: Uuid,
    pub certificate_id: Uuid,
    pub user_id: String,
    pub summary: String,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
    pub value_assessment: String,
    pub questions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisWithCertificate {
    #[serde(flatten)]
    pub analysis: AnalysisRow,
    pub certificate: CertificateRow,
}
