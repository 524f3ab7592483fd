// Certificate analysis prompt templates.
// All prompts for the certificate module are defined here.

pub const STRUCTURED_ANALYSIS_PROMPT: &str = r#"First, extract the key specifications from this diamond certificate, then provide a detailed analysis.

Certificate text:
{certificate_text}

Respond with a JSON object of exactly this shape:
{
  "specifications": {
    "carat": "numeric value",
    "color": "letter grade",
    "clarity": "clarity grade",
    "cut": "cut grade",
    "certificateNumber": "number",
    "laboratory": "GIA or IGI",
    "type": "Natural or Lab-Grown"
  },
  "analysis": {
    "overview": "Brief summary of key characteristics",
    "detailedAnalysis": {
      "cut": "Explanation of cut grade",
      "color": "Explanation of color grade",
      "clarity": "Explanation of clarity grade",
      "carat": "Explanation of carat weight"
    },
    "notableFeatures": ["List of special characteristics"],
    "potentialConcerns": ["List of areas needing attention"],
    "questionsForJeweler": ["List of suggested questions"]
  }
}

Extract all specifications precisely as they appear in the certificate.
For the analysis sections, use plain language that a non-expert can understand, with everyday analogies.
If you notice any unusual or noteworthy specifications, explain their significance."#;

pub const NARRATIVE_ANALYSIS_PROMPT: &str = r#"Analyze this diamond certificate and provide a detailed but easy-to-understand explanation of the diamond's characteristics. Focus on the 4Cs (Cut, Color, Clarity, and Carat), use analogies a beginner would relate to, and highlight any notable features or concerns. Also suggest questions the buyer should ask the jeweler.

Certificate text:
{certificate_text}

Structure your response in the following sections:
1. Overview
2. Detailed Analysis of 4Cs
3. Notable Features
4. Potential Concerns
5. Questions for the Jeweler"#;
