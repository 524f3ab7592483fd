//! Certificate specification types, the structured view of a grading report.
//!
//! Every field is best-effort: an unknown value leaves the field unset rather than
//! failing the whole specification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("unrecognised {kind}: '{value}'")]
pub struct SpecParseError {
    pub kind: &'static str,
    pub value: String,
}

impl SpecParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// GIA color scale, D (colorless) through K (faint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Color {
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}

impl Color {
    fn from_letter(letter: char) -> Option<Self> {
        Some(match letter.to_ascii_uppercase() {
            'D' => Color::D,
            'E' => Color::E,
            'F' => Color::F,
            'G' => Color::G,
            'H' => Color::H,
            'I' => Color::I,
            'J' => Color::J,
            'K' => Color::K,
            _ => return None,
        })
    }
}

impl FromStr for Color {
    type Err = SpecParseError;

    /// Accepts "D", "d", or a grade followed by a description ("D (Colorless)").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s
            .trim()
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or("");
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => {
                Color::from_letter(letter).ok_or_else(|| SpecParseError::new("color", s))
            }
            _ => Err(SpecParseError::new("color", s)),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clarity {
    FL,
    IF,
    VVS1,
    VVS2,
    VS1,
    VS2,
    SI1,
    SI2,
    I1,
    I2,
    I3,
}

impl FromStr for Clarity {
    type Err = SpecParseError;

    /// Accepts grade tokens with or without inner spaces ("VS 1") and an optional
    /// parenthesised description. Spelled-out flawless grades are also recognised.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let head = upper.split(['(', ',', ';']).next().unwrap_or("");
        let compact: String = head.chars().filter(|c| !c.is_whitespace()).collect();

        Ok(match compact.as_str() {
            "FL" | "FLAWLESS" => Clarity::FL,
            "IF" | "INTERNALLYFLAWLESS" => Clarity::IF,
            "VVS1" => Clarity::VVS1,
            "VVS2" => Clarity::VVS2,
            "VS1" => Clarity::VS1,
            "VS2" => Clarity::VS2,
            "SI1" => Clarity::SI1,
            "SI2" => Clarity::SI2,
            "I1" => Clarity::I1,
            "I2" => Clarity::I2,
            "I3" => Clarity::I3,
            _ => return Err(SpecParseError::new("clarity", s)),
        })
    }
}

impl fmt::Display for Clarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutGrade {
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Fair,
    Poor,
}

impl FromStr for CutGrade {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let letters: String = s
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_lowercase();

        Ok(match letters.as_str() {
            "excellent" => CutGrade::Excellent,
            "verygood" => CutGrade::VeryGood,
            "good" => CutGrade::Good,
            "fair" => CutGrade::Fair,
            "poor" => CutGrade::Poor,
            _ => return Err(SpecParseError::new("cut grade", s)),
        })
    }
}

impl fmt::Display for CutGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CutGrade::Excellent => "Excellent",
            CutGrade::VeryGood => "Very Good",
            CutGrade::Good => "Good",
            CutGrade::Fair => "Fair",
            CutGrade::Poor => "Poor",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Laboratory {
    GIA,
    IGI,
}

impl FromStr for Laboratory {
    type Err = SpecParseError;

    /// GIA is checked first, matching the text extractor's precedence.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let has_word = |word: &str| {
            upper
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| token == word)
        };
        if has_word("GIA") || upper.contains("GEMOLOGICAL INSTITUTE OF AMERICA") {
            Ok(Laboratory::GIA)
        } else if has_word("IGI") || upper.contains("INTERNATIONAL GEMOLOGICAL INSTITUTE") {
            Ok(Laboratory::IGI)
        } else {
            Err(SpecParseError::new("laboratory", s))
        }
    }
}

impl fmt::Display for Laboratory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiamondType {
    #[default]
    Natural,
    #[serde(rename = "Lab-Grown")]
    LabGrown,
}

impl FromStr for DiamondType {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let lab_grown =
            lower.contains("lab") || lower.contains("synthetic") || lower.contains("man-made");
        let natural = lower.contains("natural");

        // "Natural or Lab-Grown" names both and decides nothing.
        match (lab_grown, natural) {
            (true, false) => Ok(DiamondType::LabGrown),
            (false, true) => Ok(DiamondType::Natural),
            _ => Err(SpecParseError::new("diamond type", s)),
        }
    }
}

impl fmt::Display for DiamondType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiamondType::Natural => "Natural",
            DiamondType::LabGrown => "Lab-Grown",
        })
    }
}

/// Structured fields of one certificate. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpecs {
    #[serde(default)]
    pub carat: Option<f64>,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub clarity: Option<Clarity>,
    #[serde(default)]
    pub cut: Option<CutGrade>,
    /// Separators stripped; empty when unknown.
    #[serde(default)]
    pub certificate_number: String,
    #[serde(default)]
    pub laboratory: Option<Laboratory>,
    #[serde(rename = "type", default)]
    pub diamond_type: DiamondType,
}

/// Parses a carat weight out of free text such as "1.01", "1.01 ct" or "1,01 carat".
/// Values outside (0, 100] are rejected as implausible.
pub fn parse_carat(s: &str) -> Option<f64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let number: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    number
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|v| is_plausible_carat(*v))
}

pub(crate) fn is_plausible_carat(value: f64) -> bool {
    value > 0.0 && value <= 100.0
}
