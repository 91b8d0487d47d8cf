//! Prompt construction for ABAP refactoring requests.

use super::completion::{Content, GenerateContentRequest, GenerationConfig};

/// Sampling temperature sent with every request.
pub const TEMPERATURE: f32 = 0.2;

/// Instruction placed in front of the caller's source code.
pub const PROMPT_TEMPLATE: &str = "You are an expert SAP ABAP developer specialising in \
migrating legacy code to ABAP Cloud and S/4HANA. Analyze the legacy ABAP code below and \
refactor it into modern, clean ABAP. Replace obsolete statements with current syntax, use \
inline declarations and the new Open SQL syntax, and where the code reads database tables \
for reporting, propose equivalent CDS view entities. Keep the business logic unchanged. \
Return the refactored code first, followed by a short explanation of every change.";

/// Concatenate the fixed template and the caller's code, separated by a newline.
pub fn build_prompt(abap_code: &str) -> String {
    format!("{}\n{}", PROMPT_TEMPLATE, abap_code)
}

/// Build the single-message, low-temperature completion request.
pub fn build_request(abap_code: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::user_text(build_prompt(abap_code))],
        generation_config: Some(GenerationConfig {
            temperature: Some(TEMPERATURE),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("DATA: lv_x TYPE i.");
        assert_eq!(prompt, format!("{}\nDATA: lv_x TYPE i.", PROMPT_TEMPLATE));
    }

    #[test]
    fn test_build_request() {
        let request = build_request("WRITE 'hi'.");
        assert_eq!(request.contents.len(), 1);
        assert_eq!(request.contents[0].role.as_deref(), Some("user"));
        assert_eq!(request.contents[0].parts.len(), 1);
        assert_eq!(
            request.contents[0].parts[0].text.as_deref(),
            Some(build_prompt("WRITE 'hi'.").as_str())
        );
        assert_eq!(
            request.generation_config.and_then(|c| c.temperature),
            Some(TEMPERATURE)
        );
    }

    proptest! {
        #[test]
        fn prop_prompt_preserves_code_verbatim(code in ".{0,200}") {
            let prompt = build_prompt(&code);
            prop_assert!(prompt.starts_with(PROMPT_TEMPLATE));
            prop_assert_eq!(&prompt[PROMPT_TEMPLATE.len() + 1..], code.as_str());
        }
    }
}
