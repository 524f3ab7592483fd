// Follow-up chat prompt templates.

use crate::llm_client::prompts::{ANALYST_PERSONA, SCOPE_INSTRUCTION};

const CHAT_GUIDANCE: &str = "\
Explain the diamond's features in plain English for someone new to diamonds. \
Use analogies to everyday objects and keep the tone friendly and engaging.

When answering:
- Refer to carat, cut, color, clarity and any polish, symmetry, fluorescence or \
measurements listed on the certificate
- Say why a feature such as fluorescence or symmetry may be desirable or not, \
depending on personal preference
- Suggest questions the buyer could ask their jeweler when it helps
- Keep responses concise but informative";

/// System message sent first on every chat call. Embeds the whole certificate text.
pub fn system_message(certificate_text: &str) -> String {
    format!(
        "{ANALYST_PERSONA}\n\n\
         Here is the certificate text for context:\n\n\
         {certificate_text}\n\n\
         {CHAT_GUIDANCE}\n\n\
         {SCOPE_INSTRUCTION}"
    )
}
