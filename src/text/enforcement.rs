//! English Enforcement: detects non-Latin script in LLM output and, when
//! triggered, replaces the response with a synchronous rewrite produced by
//! a chat-completions call (falling back to a fixed sentence on failure).

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const TRANSLATION_MODEL: &str = "gpt-4o-mini";

const ENFORCEMENT_SYSTEM_PROMPT: &str = "You convert tutor replies into English-only messages for Pakistani students. \
Always respond ONLY in English and follow this structure:\n\
In English you say this: <translated sentence>.\n\
Add one short grammar or word-choice reminder in English.\n\
Ask the learner to repeat the sentence in English.\n\
Keep tone warm, encouraging, and concise. Never include non-English text.";

pub const FALLBACK_MESSAGE: &str = "In English you say this: Let's keep speaking in English only. \
Remember to translate your sentence, then repeat it in English for me.";

static NON_ENGLISH_SCRIPT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "[\u{0600}-\u{06FF}\u{0750}-\u{077F}\u{08A0}-\u{08FF}\u{FB50}-\u{FDFF}\u{FE70}-\u{FEFF}\u{0900}-\u{097F}]",
    )
    .expect("static enforcement regex is valid")
});

/// True if `text` contains a character from a script the tutor must never
/// reply in (Arabic, extended Arabic, Devanagari).
pub fn contains_non_english_script(text: &str) -> bool {
    NON_ENGLISH_SCRIPT_PATTERN.is_match(text)
}

/// Long-lived HTTP client for enforcement rewrite calls, built once per
/// process. Mirrors the teacher's `once_cell`-backed shared-client pattern.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("enforcement HTTP client builds with static config")
    });
    &CLIENT
}

/// Rewrite `original_text` into the fixed English-bridge structure via a
/// synchronous chat-completions call. Falls back to [`FALLBACK_MESSAGE`] on
/// any failure or empty response, never surfacing the error to the client.
pub async fn rewrite_to_english(api_key: &str, original_text: &str) -> String {
    let body = json!({
        "model": TRANSLATION_MODEL,
        "temperature": 0.2,
        "messages": [
            { "role": "system", "content": ENFORCEMENT_SYSTEM_PROMPT },
            { "role": "user", "content": original_text },
        ],
    });

    let response = http_client()
        .post(OPENAI_CHAT_COMPLETIONS_URL)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await;

    let parsed = match response {
        Ok(resp) => resp.json::<serde_json::Value>().await.ok(),
        Err(e) => {
            tracing::warn!(error = %e, "English enforcement rewrite call failed");
            None
        }
    };

    let rewritten = parsed
        .as_ref()
        .and_then(|v| v["choices"][0]["message"]["content"].as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    rewritten.unwrap_or_else(|| {
        tracing::warn!("English enforcement failed or returned empty, using fallback message");
        FALLBACK_MESSAGE.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_arabic_script() {
        assert!(contains_non_english_script("\u{0633}\u{0644}\u{0627}\u{0645}"));
    }

    #[test]
    fn detects_devanagari_script() {
        assert!(contains_non_english_script("\u{0928}\u{092E}\u{0938}\u{094D}\u{0924}\u{0947}"));
    }

    #[test]
    fn plain_english_is_not_flagged() {
        assert!(!contains_non_english_script("Hello, how are you today?"));
    }
}
