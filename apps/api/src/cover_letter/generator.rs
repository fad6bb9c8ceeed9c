use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::cover_letter::prompts::{letter_system_prompt, letter_user_prompt};
use crate::errors::AppError;
use crate::llm_client::{ChatCompletion, ChatMessage, CompletionRequest, SERVICE_NAME};

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.6;

/// Everything the letter is written from.
#[derive(Debug, Clone, Copy)]
pub struct LetterInput<'a> {
    pub resume_text: &'a str,
    pub job_description: &'a str,
    pub company_info: Option<&'a str>,
    pub word_limit: u32,
}

/// Writes the cover letter and cleans up the model output.
///
/// The completion goes through the client's retry policy; an empty or
/// too-short letter after formatting is reported as an API failure.
pub async fn generate_cover_letter(
    llm: &dyn ChatCompletion,
    input: &LetterInput<'_>,
    min_letter_chars: usize,
) -> Result<String, AppError> {
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(letter_system_prompt(input.word_limit)),
            ChatMessage::user(letter_user_prompt(
                input.resume_text,
                input.job_description,
                input.company_info,
            )),
        ],
        max_tokens: Some(MAX_TOKENS),
        temperature: Some(TEMPERATURE),
    };

    let raw = llm.complete(request).await?;
    let letter = format_cover_letter(&raw);

    let chars = letter.chars().count();
    if chars < min_letter_chars {
        return Err(AppError::api(
            SERVICE_NAME,
            format!("generated cover letter is too short or empty ({chars} characters); please try again"),
        ));
    }

    info!("Cover letter generated: {} characters", chars);
    Ok(letter)
}

fn blank_lines() -> &'static Regex {
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
    BLANK_LINES.get_or_init(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("blank line pattern is valid"))
}

/// Turns raw model output into display-ready text: literal escape sequences
/// become real characters, runs of blank lines collapse to one, and a quote
/// pair wrapping the whole letter is removed. Idempotent on clean text.
pub fn format_cover_letter(raw: &str) -> String {
    let text = raw
        .replace("\r\n", "\n")
        .replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\'", "'");

    let trimmed = text.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed);

    blank_lines()
        .replace_all(unquoted, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MessageContent;
    use crate::testing::FakeLlm;

    const LETTER: &str = "Dear Hiring Manager,\n\nI am excited to apply for the Platform Engineer role.\n\nSincerely,\n[Your Name]";

    fn input() -> LetterInput<'static> {
        LetterInput {
            resume_text: "Jane Doe, backend engineer",
            job_description: "Platform Engineer at Acme",
            company_info: None,
            word_limit: 300,
        }
    }

    #[test]
    fn test_literal_escapes_are_unescaped() {
        let raw = r#""Dear Hiring Manager,\n\nI\'m writing about the \"Rust\" role.\n\n\n\nSincerely,\tJane""#;
        assert_eq!(
            format_cover_letter(raw),
            "Dear Hiring Manager,\n\nI'm writing about the \"Rust\" role.\n\nSincerely,\tJane"
        );
    }

    #[test]
    fn test_crlf_and_blank_runs_collapse() {
        let raw = "Dear Hiring Manager,\r\n\r\n  \r\n\r\nBody\n \n\t\n\nSincerely,";
        assert_eq!(format_cover_letter(raw), "Dear Hiring Manager,\n\nBody\n\nSincerely,");
    }

    #[test]
    fn test_formatting_is_idempotent() {
        for raw in [
            LETTER,
            r#""Dear Hiring Manager,\n\n\nBody""#,
            "  Dear Hiring Manager,\r\n\r\n\r\nBody  ",
        ] {
            let once = format_cover_letter(raw);
            assert_eq!(format_cover_letter(&once), once);
        }
    }

    #[tokio::test]
    async fn test_generation_sends_word_target_and_sampling() {
        let llm = FakeLlm::replying(&[LETTER]);

        let letter = generate_cover_letter(llm.as_ref(), &input(), 50).await.unwrap();

        assert_eq!(letter, LETTER);
        let requests = llm.requests();
        assert_eq!(requests[0].max_tokens, Some(MAX_TOKENS));
        assert_eq!(requests[0].temperature, Some(TEMPERATURE));
        match &requests[0].messages[0].content {
            MessageContent::Text(system) => assert!(system.contains("about 300 words")),
            other => panic!("expected text content, got {other:?}"),
        }
        match &requests[0].messages[1].content {
            MessageContent::Text(user) => {
                assert!(user.contains("Platform Engineer at Acme"));
                assert!(user.contains("No additional company information"));
            }
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_short_letter_is_api_error() {
        let llm = FakeLlm::replying(&["\"Too short\""]);
        let err = generate_cover_letter(llm.as_ref(), &input(), 50).await.unwrap_err();
        assert!(matches!(err, AppError::ApiRequest { .. }));
    }

    #[tokio::test]
    async fn test_completion_failure_propagates() {
        let llm = FakeLlm::failing("upstream down");
        let err = generate_cover_letter(llm.as_ref(), &input(), 50).await.unwrap_err();
        assert!(err.to_string().contains("upstream down"));
    }
}
