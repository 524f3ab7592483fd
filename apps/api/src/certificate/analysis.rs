//! Certificate analysis requests: one prompt per certificate, two response modes.
//!
//! - Structured: JSON mode, returns `{ specifications, analysis }`. The `analysis`
//!   object is validated strictly; `specifications` is best-effort and every field the
//!   model leaves out (or gets wrong) is filled from the regex extractor.
//! - Narrative: free text streamed straight through the chat relay.
//!
//! Both are single attempts; failures surface to the handler.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::certificate::extractor::SpecExtractor;
use crate::certificate::prompts::{NARRATIVE_ANALYSIS_PROMPT, STRUCTURED_ANALYSIS_PROMPT};
use crate::certificate::specs::{is_plausible_carat, parse_carat, CertificateSpecs};
use crate::llm_client::prompts::{ANALYST_PERSONA, JSON_ONLY_SYSTEM};
use crate::llm_client::{
    complete_json, ChatCompletions, ChatMessage, CompletionRequest, CompletionStream, LlmError,
    ANALYSIS_MODEL,
};

const STRUCTURED_TEMPERATURE: f32 = 0.5;
const STRUCTURED_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedAnalysis {
    pub cut: String,
    pub color: String,
    pub clarity: String,
    pub carat: String,
}

/// Plain-language explanation of one certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub overview: String,
    pub detailed_analysis: DetailedAnalysis,
    pub notable_features: Vec<String>,
    pub potential_concerns: Vec<String>,
    pub questions_for_jeweler: Vec<String>,
}

impl AnalysisReport {
    /// Renders the report as the sectioned text shown as the first assistant message.
    pub fn to_narrative(&self) -> String {
        let d = &self.detailed_analysis;
        let four_cs: Vec<String> = [
            ("Cut", &d.cut),
            ("Color", &d.color),
            ("Clarity", &d.clarity),
            ("Carat", &d.carat),
        ]
        .into_iter()
        .map(|(label, text)| format!("• {label}: {}", text.trim()))
        .collect();

        let mut sections = vec![
            format!("Overview:\n{}", self.overview.trim()),
            format!("Detailed Analysis of 4Cs:\n{}", four_cs.join("\n")),
        ];

        for (title, items) in [
            ("Notable Features", &self.notable_features),
            ("Potential Concerns", &self.potential_concerns),
            ("Questions for the Jeweler", &self.questions_for_jeweler),
        ] {
            if items.is_empty() {
                continue;
            }
            let bullets: Vec<String> =
                items.iter().map(|item| format!("• {}", item.trim())).collect();
            sections.push(format!("{title}:\n{}", bullets.join("\n")));
        }

        sections.join("\n\n").trim_end().to_string()
    }
}

/// Where the returned specifications came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecsSource {
    /// The model's structured output, gaps filled from the text.
    Llm,
    /// The model returned no usable `specifications` object.
    TextFallback,
}

#[derive(Debug, Clone)]
pub struct CertificateAnalysis {
    pub specifications: CertificateSpecs,
    pub analysis: AnalysisReport,
    pub specs_source: SpecsSource,
}

/// Shape of the structured-mode reply.
#[derive(Debug, Deserialize)]
struct StructuredResponse {
    #[serde(default)]
    specifications: Option<Value>,
    analysis: AnalysisReport,
}

/// Specifications as the model writes them: any JSON scalar per field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpecifications {
    carat: Option<Value>,
    color: Option<Value>,
    clarity: Option<Value>,
    cut: Option<Value>,
    certificate_number: Option<Value>,
    laboratory: Option<Value>,
    #[serde(rename = "type")]
    diamond_type: Option<Value>,
}

impl RawSpecifications {
    /// Keeps every field that parses, falling back per field.
    fn resolve(self, fallback: CertificateSpecs) -> CertificateSpecs {
        let certificate_number = scalar_text(&self.certificate_number)
            .map(|s| s.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>())
            .filter(|s| s.chars().any(|c| c.is_ascii_digit()))
            .unwrap_or(fallback.certificate_number);

        CertificateSpecs {
            carat: parse_carat_value(&self.carat).or(fallback.carat),
            color: parse_field(&self.color).or(fallback.color),
            clarity: parse_field(&self.clarity).or(fallback.clarity),
            cut: parse_field(&self.cut).or(fallback.cut),
            certificate_number,
            laboratory: parse_field(&self.laboratory).or(fallback.laboratory),
            diamond_type: parse_field(&self.diamond_type).unwrap_or(fallback.diamond_type),
        }
    }
}

fn scalar_text(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_field<T: std::str::FromStr>(value: &Option<Value>) -> Option<T> {
    scalar_text(value).and_then(|s| s.parse::<T>().ok())
}

fn parse_carat_value(value: &Option<Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| is_plausible_carat(*v)),
        Some(Value::String(s)) => parse_carat(s),
        _ => None,
    }
}

pub fn structured_request(certificate_text: &str) -> CompletionRequest {
    let prompt = STRUCTURED_ANALYSIS_PROMPT.replace("{certificate_text}", certificate_text);
    CompletionRequest::new(
        ANALYSIS_MODEL,
        vec![
            ChatMessage::system(format!("{ANALYST_PERSONA} {JSON_ONLY_SYSTEM}")),
            ChatMessage::user(prompt),
        ],
    )
    .temperature(STRUCTURED_TEMPERATURE)
    .max_tokens(STRUCTURED_MAX_TOKENS)
    .json_response()
}

pub fn narrative_request(certificate_text: &str) -> CompletionRequest {
    let prompt = NARRATIVE_ANALYSIS_PROMPT.replace("{certificate_text}", certificate_text);
    CompletionRequest::new(
        ANALYSIS_MODEL,
        vec![ChatMessage::system(ANALYST_PERSONA), ChatMessage::user(prompt)],
    )
}

/// Structured mode. A reply whose `analysis` does not match the schema is a
/// `LlmError::Parse`.
pub async fn analyze_structured(
    llm: &dyn ChatCompletions,
    extractor: &SpecExtractor,
    certificate_text: &str,
) -> Result<CertificateAnalysis, LlmError> {
    let response: StructuredResponse =
        complete_json(llm, &structured_request(certificate_text)).await?;

    let fallback = extractor.extract(certificate_text);
    let raw = response
        .specifications
        .filter(Value::is_object)
        .and_then(|v| serde_json::from_value::<RawSpecifications>(v).ok());

    let (specifications, specs_source) = match raw {
        Some(raw) => (raw.resolve(fallback), SpecsSource::Llm),
        None => {
            warn!("LLM reply had no usable specifications; using text extraction");
            (fallback, SpecsSource::TextFallback)
        }
    };

    info!(
        "Certificate analyzed: lab={:?} carat={:?} color={:?} clarity={:?} source={:?}",
        specifications.laboratory,
        specifications.carat,
        specifications.color,
        specifications.clarity,
        specs_source
    );

    Ok(CertificateAnalysis {
        specifications,
        analysis: response.analysis,
        specs_source,
    })
}

/// Narrative mode. Returns the raw upstream event stream for the relay.
pub async fn stream_narrative(
    llm: &dyn ChatCompletions,
    certificate_text: &str,
) -> Result<CompletionStream, LlmError> {
    llm.stream(&narrative_request(certificate_text)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::specs::{Clarity, Color, CutGrade, DiamondType, Laboratory};
    use crate::testing::{structured_reply, FakeCompletions, SAMPLE_CERTIFICATE_TEXT};
    use serde_json::json;

    fn extractor() -> SpecExtractor {
        SpecExtractor::new().unwrap()
    }

    #[tokio::test]
    async fn test_llm_specifications_are_kept() {
        let reply = structured_reply(json!({
            "carat": 0.72,
            "color": "F",
            "clarity": "VVS2",
            "cut": "Very Good",
            "certificateNumber": "IGI LG-5973 22534",
            "laboratory": "IGI",
            "type": "Lab-Grown"
        }));
        let llm = FakeCompletions::replying(&reply);
        let result = analyze_structured(&llm, &extractor(), SAMPLE_CERTIFICATE_TEXT)
            .await
            .unwrap();

        assert_eq!(result.specs_source, SpecsSource::Llm);
        let specs = result.specifications;
        assert_eq!(specs.carat, Some(0.72));
        assert_eq!(specs.color, Some(Color::F));
        assert_eq!(specs.clarity, Some(Clarity::VVS2));
        assert_eq!(specs.cut, Some(CutGrade::VeryGood));
        assert_eq!(specs.certificate_number, "IGILG597322534");
        assert_eq!(specs.laboratory, Some(Laboratory::IGI));
        assert_eq!(specs.diamond_type, DiamondType::LabGrown);
    }

    #[tokio::test]
    async fn test_unparseable_fields_fall_back_to_text() {
        let reply = structured_reply(json!({
            "carat": "numeric value",
            "color": "letter grade",
            "clarity": "VS1",
            "cut": null,
            "certificateNumber": "",
            "laboratory": "GIA or IGI",
            "type": "Natural or Lab-Grown"
        }));
        let llm = FakeCompletions::replying(&reply);
        let specs = analyze_structured(&llm, &extractor(), SAMPLE_CERTIFICATE_TEXT)
            .await
            .unwrap()
            .specifications;

        assert_eq!(specs.carat, Some(1.01));
        assert_eq!(specs.color, Some(Color::D));
        assert_eq!(specs.clarity, Some(Clarity::VS1));
        assert_eq!(specs.cut, Some(CutGrade::Excellent));
        assert_eq!(specs.certificate_number, "2141438171");
        assert_eq!(specs.laboratory, Some(Laboratory::GIA));
        assert_eq!(specs.diamond_type, DiamondType::Natural);
    }

    #[tokio::test]
    async fn test_missing_specifications_use_text_fallback() {
        let reply = structured_reply(Value::Null);
        let llm = FakeCompletions::replying(&reply);
        let result = analyze_structured(&llm, &extractor(), SAMPLE_CERTIFICATE_TEXT)
            .await
            .unwrap();
        assert_eq!(result.specs_source, SpecsSource::TextFallback);
        assert_eq!(result.specifications.carat, Some(1.01));
    }

    #[tokio::test]
    async fn test_malformed_analysis_fails_closed() {
        let llm = FakeCompletions::replying(r#"{"specifications": {}, "analysis": {"overview": 3}}"#);
        let err = analyze_structured(&llm, &extractor(), SAMPLE_CERTIFICATE_TEXT)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_structured_request_embeds_text_and_json_mode() {
        let request = structured_request("Carat Weight: 1.01 carat");
        assert!(request.json_response);
        assert_eq!(request.max_tokens, Some(2000));
        assert!(request.messages[1].content.contains("Carat Weight: 1.01 carat"));
        assert!(!request.messages[1].content.contains("{certificate_text}"));
    }

    #[test]
    fn test_narrative_rendering_skips_empty_sections() {
        let report = AnalysisReport {
            overview: "A top-tier stone.".into(),
            detailed_analysis: DetailedAnalysis {
                cut: "Excellent sparkle.".into(),
                color: "Colorless like spring water.".into(),
                clarity: "Eye-clean.".into(),
                carat: "About the weight of a paperclip's fifth.".into(),
            },
            notable_features: vec!["Strong light return".into()],
            potential_concerns: vec![],
            questions_for_jeweler: vec!["Can I see it under daylight?".into()],
        };
        let text = report.to_narrative();
        assert!(text.starts_with("Overview:\nA top-tier stone."));
        assert!(text.contains("• Color: Colorless like spring water."));
        assert!(text.contains("Notable Features:\n• Strong light return"));
        assert!(!text.contains("Potential Concerns"));
        assert!(text.ends_with("• Can I see it under daylight?"));
    }

    #[test]
    fn test_narrative_layout_separates_sections_with_blank_lines() {
        let report = AnalysisReport {
            overview: " Fine. ".into(),
            detailed_analysis: DetailedAnalysis {
                cut: "Ideal.".into(),
                color: "D.".into(),
                clarity: "VS1.".into(),
                carat: "1.01.".into(),
            },
            notable_features: vec![],
            potential_concerns: vec!["Thin girdle".into(), "Faint fluorescence ".into()],
            questions_for_jeweler: vec![],
        };
        assert_eq!(
            report.to_narrative(),
            "Overview:\nFine.\n\n\
             Detailed Analysis of 4Cs:\n• Cut: Ideal.\n• Color: D.\n• Clarity: VS1.\n• Carat: 1.01.\n\n\
             Potential Concerns:\n• Thin girdle\n• Faint fluorescence"
        );
    }
}
