use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::llm_client::Role;
use crate::models::analysis::{AnalysisRow, AnalysisWithCertificate};
use crate::models::certificate::{CertificateRow, CertificateWithAnalyses};
use crate::models::chat::{ChatMessageRow, ChatSessionRow, ChatSessionWithMessages};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertificate {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
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
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnalysis {
    pub certificate_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub value_assessment: String,
    #[serde(default)]
    pub questions: Vec<String>,
}

pub async fn insert_certificate(
    pool: &PgPool,
    new: &NewCertificate,
) -> Result<CertificateRow, sqlx::Error> {
    sqlx::query_as::<_, CertificateRow>(
        r#"
        INSERT INTO certificates
            (id, user_id, certificate_number, laboratory, pdf_url, raw_data, carat,
             color, clarity, cut, polish, symmetry, fluorescence, measurements)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new.user_id)
    .bind(&new.certificate_number)
    .bind(&new.laboratory)
    .bind(&new.pdf_url)
    .bind(&new.raw_data)
    .bind(new.carat)
    .bind(&new.color)
    .bind(&new.clarity)
    .bind(&new.cut)
    .bind(&new.polish)
    .bind(&new.symmetry)
    .bind(&new.fluorescence)
    .bind(&new.measurements)
    .fetch_one(pool)
    .await
}

/// All of a user's certificates, oldest first, each with its analyses.
pub async fn certificates_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<CertificateWithAnalyses>, sqlx::Error> {
    let certificates = sqlx::query_as::<_, CertificateRow>(
        "SELECT * FROM certificates WHERE user_id = $1 ORDER BY created_at, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let ids: Vec<Uuid> = certificates.iter().map(|c| c.id).collect();
    let analyses = sqlx::query_as::<_, AnalysisRow>(
        "SELECT * FROM analyses WHERE certificate_id = ANY($1) ORDER BY created_at, id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_certificate: HashMap<Uuid, Vec<AnalysisRow>> = HashMap::new();
    for analysis in analyses {
        by_certificate
            .entry(analysis.certificate_id)
            .or_default()
            .push(analysis);
    }

    Ok(certificates
        .into_iter()
        .map(|certificate| CertificateWithAnalyses {
            analyses: by_certificate.remove(&certificate.id).unwrap_or_default(),
            certificate,
        })
        .collect())
}

async fn certificate_by_id(pool: &PgPool, id: Uuid) -> Result<CertificateRow, sqlx::Error> {
    sqlx::query_as::<_, CertificateRow>("SELECT * FROM certificates WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn insert_analysis(
    pool: &PgPool,
    new: &NewAnalysis,
) -> Result<AnalysisWithCertificate, sqlx::Error> {
    let analysis = sqlx::query_as::<_, AnalysisRow>(
        r#"
        INSERT INTO analyses
            (id, certificate_id, user_id, summary, strengths, concerns, value_assessment, questions)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.certificate_id)
    .bind(&new.user_id)
    .bind(&new.summary)
    .bind(&new.strengths)
    .bind(&new.concerns)
    .bind(&new.value_assessment)
    .bind(&new.questions)
    .fetch_one(pool)
    .await?;

    let certificate = certificate_by_id(pool, analysis.certificate_id).await?;
    Ok(AnalysisWithCertificate {
        analysis,
        certificate,
    })
}

/// Most recent analysis of a certificate.
pub async fn latest_analysis(
    pool: &PgPool,
    certificate_id: Uuid,
) -> Result<Option<AnalysisWithCertificate>, sqlx::Error> {
    let analysis = sqlx::query_as::<_, AnalysisRow>(
        r#"
        SELECT * FROM analyses
        WHERE certificate_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(certificate_id)
    .fetch_optional(pool)
    .await?;

    match analysis {
        Some(analysis) => {
            let certificate = certificate_by_id(pool, certificate_id).await?;
            Ok(Some(AnalysisWithCertificate {
                analysis,
                certificate,
            }))
        }
        None => Ok(None),
    }
}

/// One session per (certificate, user). Concurrent callers get the same row.
pub async fn find_or_create_session(
    pool: &PgPool,
    certificate_id: Uuid,
    user_id: &str,
) -> Result<ChatSessionRow, sqlx::Error> {
    sqlx::query_as::<_, ChatSessionRow>(
        r#"
        INSERT INTO chat_sessions (id, certificate_id, user_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (certificate_id, user_id)
            DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(certificate_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn append_message(
    pool: &PgPool,
    session_id: Uuid,
    role: Role,
    content: &str,
) -> Result<ChatMessageRow, sqlx::Error> {
    sqlx::query_as::<_, ChatMessageRow>(
        r#"
        INSERT INTO chat_messages (id, chat_session_id, role, content)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .fetch_one(pool)
    .await
}

pub async fn session_with_messages(
    pool: &PgPool,
    certificate_id: Uuid,
    user_id: &str,
) -> Result<Option<ChatSessionWithMessages>, sqlx::Error> {
    let session = sqlx::query_as::<_, ChatSessionRow>(
        "SELECT * FROM chat_sessions WHERE certificate_id = $1 AND user_id = $2",
    )
    .bind(certificate_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    let messages = sqlx::query_as::<_, ChatMessageRow>(
        "SELECT * FROM chat_messages WHERE chat_session_id = $1 ORDER BY created_at, id",
    )
    .bind(session.id)
    .fetch_all(pool)
    .await?;

    Ok(Some(ChatSessionWithMessages { session, messages }))
}
