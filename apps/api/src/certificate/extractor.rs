//! Specification extractor: ordered regex heuristics over raw certificate text.
//!
//! Used when the structured LLM response is missing or malformed, and to fill any
//! field the LLM left out. For each field the patterns are tried in order and the
//! first plausible match wins; no match leaves the field unset.
//!
//! Laboratory precedence: GIA indicators are checked before IGI indicators, so a
//! text mentioning both resolves to GIA.

use anyhow::Result;
use regex::Regex;

use crate::certificate::specs::{
    parse_carat, CertificateSpecs, Clarity, Color, CutGrade, DiamondType, Laboratory,
};

const CLARITY_GRADES: &str = "VVS1|VVS2|VS1|VS2|SI1|SI2|FL|IF|I1|I2|I3";
const CUT_GRADES: &str = r"excellent|very\s+good|good|fair|poor";
/// Matches a label separator: whitespace, colons, dot leaders, dashes.
const SEP: &str = r"[\s:.\-]*";

/// Grouped 3-3-4, or one unbroken run of digits.
const REPORT_NUMBER: &str = r"(\d{3}[ \-]\d{3}[ \-]\d{4}|\d{7,12})\b";

/// Reports carry 7 to 12 digit numbers; 10 is the common case.
const MIN_REPORT_DIGITS: usize = 7;
const MAX_REPORT_DIGITS: usize = 12;

pub struct SpecExtractor {
    gia: Vec<Regex>,
    igi: Vec<Regex>,
    carat: Vec<Regex>,
    color: Vec<Regex>,
    clarity: Vec<Regex>,
    cut: Vec<Regex>,
    report_number: Vec<Regex>,
    lab_grown: Regex,
}

impl SpecExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            gia: compile_all(&[
                r"(?i)\bGIA\b",
                r"(?i)gemological\s+institute\s+of\s+america",
            ])?,
            igi: compile_all(&[
                r"(?i)\bIGI\b",
                r"(?i)international\s+gemological\s+institute",
            ])?,
            carat: compile_all(&[
                &format!(r"(?i)\bcarat\s+weight{SEP}(\d{{1,3}}(?:[.,]\d{{1,3}})?)"),
                &format!(r"(?i)\bweight{SEP}(\d{{1,3}}(?:[.,]\d{{1,3}})?)"),
                r"(?i)(\d{1,3}(?:[.,]\d{1,3})?)\s*(?:carats?|cts?)\b",
            ])?,
            color: compile_all(&[
                &format!(r"(?i)\bcolou?r(?:\s+grade)?{SEP}([D-K])\b"),
                r"(?i)\b([D-K])\s+colou?r\b",
            ])?,
            clarity: compile_all(&[
                &format!(r"(?i)\bclarity(?:\s+grade)?{SEP}({CLARITY_GRADES})\b"),
                &format!(r"(?i)\b({CLARITY_GRADES})\s+clarity\b"),
            ])?,
            cut: compile_all(&[
                &format!(r"(?i)\bcut(?:\s+grade)?{SEP}({CUT_GRADES})\b"),
                &format!(r"(?i)\b({CUT_GRADES})\s+cut\b"),
            ])?,
            report_number: compile_all(&[
                &format!(
                    r"(?i)\b(?:report|certificate)(?:\s+(?:number|no\.?|#))?[\s:#.]*{REPORT_NUMBER}"
                ),
                &format!(r"(?i)(?:\bnumber|\bno\.?|#)[\s:#.]*{REPORT_NUMBER}"),
                r"\b(\d{10})\b",
            ])?,
            lab_grown: Regex::new(
                r"(?i)\blab(?:oratory)?[\s\-]?grown\b|\bsynthetic\b|\bman[\s\-]made\b",
            )
            .map_err(|e| anyhow::anyhow!("Failed to compile lab-grown regex: {e}"))?,
        })
    }

    /// Derives every field it can from `text`. Never fails.
    pub fn extract(&self, text: &str) -> CertificateSpecs {
        CertificateSpecs {
            carat: self.carat(text),
            color: first_parsed::<Color>(&self.color, text),
            clarity: first_parsed::<Clarity>(&self.clarity, text),
            cut: first_parsed::<CutGrade>(&self.cut, text),
            certificate_number: self.report_number(text).unwrap_or_default(),
            laboratory: self.laboratory(text),
            diamond_type: self.diamond_type(text),
        }
    }

    fn laboratory(&self, text: &str) -> Option<Laboratory> {
        if self.gia.iter().any(|re| re.is_match(text)) {
            Some(Laboratory::GIA)
        } else if self.igi.iter().any(|re| re.is_match(text)) {
            Some(Laboratory::IGI)
        } else {
            None
        }
    }

    fn carat(&self, text: &str) -> Option<f64> {
        self.carat.iter().find_map(|re| {
            re.captures_iter(text)
                .find_map(|caps| caps.get(1).and_then(|m| parse_carat(m.as_str())))
        })
    }

    fn report_number(&self, text: &str) -> Option<String> {
        self.report_number.iter().find_map(|re| {
            re.captures_iter(text).find_map(|caps| {
                let digits: String = caps
                    .get(1)?
                    .as_str()
                    .chars()
                    .filter(|c| c.is_ascii_digit())
                    .collect();
                (MIN_REPORT_DIGITS..=MAX_REPORT_DIGITS)
                    .contains(&digits.len())
                    .then_some(digits)
            })
        })
    }

    fn diamond_type(&self, text: &str) -> DiamondType {
        if self.lab_grown.is_match(text) {
            DiamondType::LabGrown
        } else {
            DiamondType::Natural
        }
    }
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| anyhow::anyhow!("Failed to compile regex '{p}': {e}")))
        .collect()
}

/// First capture across the ordered patterns that parses as `T`.
fn first_parsed<T: std::str::FromStr>(patterns: &[Regex], text: &str) -> Option<T> {
    patterns.iter().find_map(|re| {
        re.captures_iter(text)
            .find_map(|caps| caps.get(1).and_then(|m| m.as_str().parse::<T>().ok()))
    })
}
