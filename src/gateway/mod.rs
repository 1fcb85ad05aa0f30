//! Model gateway abstraction.
//!
//! Provides the `ModelGateway` trait over the inference API so the
//! orchestrator and tests are decoupled from the HTTP client, plus the
//! pieces shared by every implementation: prompt composition, response
//! fence stripping, and the bounded retry/backoff loop.

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::cancel::CancelToken;

/// Request timeout for one inference call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(50);

/// Maximum number of retry attempts for transient API errors.
pub const MAX_RETRIES: u32 = 4;

/// Initial backoff delay between retries.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

/// Maximum backoff delay between retries.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Errors from the model gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// HTTP 429. Surfaced as its own kind (never retried in place) so
    /// the orchestrator can cool the model down and fail over.
    #[error("model rate limited")]
    RateLimited,

    /// Network failure, timeout, or 5xx. Retried with backoff up to
    /// [`MAX_RETRIES`], then surfaced as a file-level error.
    #[error("transient model API error: {0}")]
    Transient(String),

    /// Non-retryable API failure (4xx other than 429, malformed or
    /// empty response body).
    #[error("model API error: {0}")]
    Api(String),

    /// User-initiated halt. Not a failure: no counters are incremented
    /// and it is never logged as an error.
    #[error("inference cancelled")]
    Cancelled,
}

/// Abstract inference contract: one composed prompt in, one response
/// text out.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        cancel: &CancelToken,
    ) -> Result<String, GatewayError>;
}

/// Compose the single inference prompt.
///
/// Sections appear in a fixed structural order — project context,
/// custom instructions, persona/role, target content — so the model can
/// distinguish "what to do" from "what to do it to". `strict` appends a
/// spillover warning used when re-prompting after a guardrail rejection.
pub fn compose_prompt(
    context: Option<&str>,
    instructions: Option<&str>,
    persona: &str,
    content: &str,
    strict: bool,
) -> String {
    let mut prompt = String::new();

    if let Some(context) = context {
        prompt.push_str("PROJECT CONTEXT:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }
    if let Some(instructions) = instructions {
        prompt.push_str("CUSTOM INSTRUCTIONS:\n");
        prompt.push_str(instructions);
        prompt.push_str("\n\n");
    }

    prompt.push_str("ROLE:\n");
    prompt.push_str(persona);
    prompt.push_str("\n\n");

    if strict {
        prompt.push_str(
            "STRICT OUTPUT: respond with the raw file content only. \
             No markdown fences, no headers, no commentary of any kind.\n\n",
        );
    }

    prompt.push_str("TARGET CONTENT:\n");
    prompt.push_str(content);
    prompt
}

/// Strip a single optional leading/trailing triple-fence wrapper.
///
/// Models habitually wrap whole-file responses in ```lang fences. The
/// strip is unconditional on receipt and must not alter content that
/// lacks such wrapping; inner fences survive.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return text.to_string();
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text.to_string();
    };

    // Drop the language tag line after the opening fence, if any.
    let inner = match inner.split_once('\n') {
        Some((first_line, body)) if !first_line.contains(' ') => body,
        _ => inner,
    };
    inner.trim_end_matches('\n').trim_start_matches('\n').to_string()
}

/// Compute the backoff duration for a retry attempt using exponential
/// backoff (`base × 2^attempt`, capped).
pub fn retry_backoff(attempt: u32) -> Duration {
    let backoff = INITIAL_BACKOFF.saturating_mul(2u32.saturating_pow(attempt));
    backoff.min(MAX_BACKOFF)
}

/// Run `op` with bounded retries on [`GatewayError::Transient`].
///
/// Expressed as an explicit loop rather than recursion so the attempt
/// bound is independently testable. Rate limits, API errors, and
/// cancellation pass through on the first occurrence; the backoff sleep
/// itself is cancellable.
pub async fn with_retries<T, F, Fut>(
    mut op: F,
    cancel: &CancelToken,
) -> Result<T, GatewayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        match op(attempt).await {
            Err(GatewayError::Transient(reason)) if attempt < MAX_RETRIES => {
                let delay = retry_backoff(attempt);
                tracing::debug!(attempt, ?delay, %reason, "transient inference failure, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                }
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn prompt_section_order_is_fixed() {
        let prompt = compose_prompt(
            Some("ctx"),
            Some("instr"),
            "persona",
            "content",
            false,
        );
        let ctx = prompt.find("PROJECT CONTEXT:").unwrap();
        let instr = prompt.find("CUSTOM INSTRUCTIONS:").unwrap();
        let role = prompt.find("ROLE:").unwrap();
        let target = prompt.find("TARGET CONTENT:").unwrap();
        assert!(ctx < instr && instr < role && role < target);
    }

    #[test]
    fn prompt_omits_absent_sections() {
        let prompt = compose_prompt(None, None, "persona", "content", false);
        assert!(!prompt.contains("PROJECT CONTEXT:"));
        assert!(!prompt.contains("CUSTOM INSTRUCTIONS:"));
        assert!(prompt.contains("ROLE:\npersona"));
    }

    #[test]
    fn strict_variant_adds_warning() {
        let relaxed = compose_prompt(None, None, "p", "c", false);
        let strict = compose_prompt(None, None, "p", "c", true);
        assert!(!relaxed.contains("STRICT OUTPUT"));
        assert!(strict.contains("STRICT OUTPUT"));
        // The warning precedes the target so it reads as an instruction.
        assert!(strict.find("STRICT OUTPUT").unwrap() < strict.find("TARGET CONTENT:").unwrap());
    }

    #[test]
    fn strip_fence_with_language_tag() {
        assert_eq!(strip_code_fence("```js\nconst x = 1;\n```"), "const x = 1;");
    }

    #[test]
    fn strip_fence_without_language_tag() {
        assert_eq!(strip_code_fence("```\nlet y = 2\n```"), "let y = 2");
    }

    #[test]
    fn unwrapped_content_unchanged() {
        let text = "plain content, no fences";
        assert_eq!(strip_code_fence(text), text);
    }

    #[test]
    fn inner_fences_survive() {
        let text = "```md\nUsage:\n```sh\nrun it\n```\n```";
        assert_eq!(strip_code_fence(text), "Usage:\n```sh\nrun it\n```");
    }

    #[test]
    fn unterminated_fence_unchanged() {
        let text = "```js\nconst x = 1;";
        assert_eq!(strip_code_fence(text), text);
    }

    #[test]
    fn backoff_schedule_doubles() {
        assert_eq!(retry_backoff(0), Duration::from_secs(2));
        assert_eq!(retry_backoff(1), Duration::from_secs(4));
        assert_eq!(retry_backoff(2), Duration::from_secs(8));
        assert_eq!(retry_backoff(3), Duration::from_secs(16));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(retry_backoff(10), MAX_BACKOFF);
        assert_eq!(retry_backoff(u32::MAX), MAX_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_then_succeed() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancelToken::new();
        let counter = Arc::clone(&calls);

        let result = with_retries(
            move |_attempt| {
                let counter = Arc::clone(&counter);
                async move {
                    // 503 twice, then success on the third attempt.
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(GatewayError::Transient("HTTP 503".into()))
                    } else {
                        Ok("response".to_string())
                    }
                }
            },
            &cancel,
        )
        .await;

        assert_eq!(result.unwrap(), "response");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancelToken::new();
        let counter = Arc::clone(&calls);

        let result: Result<String, _> = with_retries(
            move |_attempt| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GatewayError::Api("HTTP 401".into()))
                }
            },
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(GatewayError::Api(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_transient() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancelToken::new();
        let counter = Arc::clone(&calls);

        let result: Result<String, _> = with_retries(
            move |_attempt| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GatewayError::Transient("HTTP 503".into()))
                }
            },
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(GatewayError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES + 1);
    }

    #[tokio::test]
    async fn rate_limit_passes_through_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancelToken::new();
        let counter = Arc::clone(&calls);

        let result: Result<String, _> = with_retries(
            move |_attempt| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GatewayError::RateLimited)
                }
            },
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(GatewayError::RateLimited)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let result: Result<String, _> = with_retries(
            |_attempt| async { Ok("never reached".to_string()) },
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(GatewayError::Cancelled)));
    }
}
