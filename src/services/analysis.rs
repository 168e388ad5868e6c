//! AI analysis of normalized judgments.
//!
//! The text-generation capability sits behind the `TextGenerator` trait so
//! the pipeline can be exercised without network access. Failures are
//! retried with backoff and then downgraded to an `analysis_failed` status:
//! one failed summary must never block the rest of a run.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{AnalysisConfig, AnalysisStatus, AnalyzedCase, NormalizedCaseText};
use crate::utils::BackoffPolicy;

const SYSTEM_PROMPT: &str = "Jesteś ekspertem od prawa administracyjnego. Analizujesz orzeczenia \
     sądów administracyjnych w Polsce i tworzysz zwięzłe biuletyny analityczne.";

const ANALYSIS_PROMPT: &str = "Na podstawie poniższego orzeczenia sądowego przygotuj artykuł do \
     newslettera prawniczego: tytuł, stan faktyczny, analiza prawna, praktyczne znaczenie wyroku, \
     a na końcu sygnatura sprawy, sąd i data wyroku.\n\nOrzeczenie do analizy:\n";

/// Fixed note used when a judgment carries no written justification; the
/// capability is not called for those.
const NO_JUSTIFICATION_NOTE: &str =
    "Brak uzasadnienia w orzeczeniu - nie wygenerowano podsumowania";

/// Opaque text-in/text-out capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Chat-completions client for an OpenAI-style endpoint.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_completion_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_completion_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(config: &AnalysisConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_completion_tokens: config.max_completion_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_completion_tokens: self.max_completion_tokens,
        };

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Analysis {
                message: format!("capability returned status {}", response.status()),
                attempts: 1,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Analysis {
                message: "capability returned no content".into(),
                attempts: 1,
            })
    }
}

/// Per-case analysis with retry and downgrade semantics.
pub struct AnalysisStage {
    generator: Arc<dyn TextGenerator>,
    backoff: BackoffPolicy,
}

impl AnalysisStage {
    pub fn new(generator: Arc<dyn TextGenerator>, backoff: BackoffPolicy) -> Self {
        Self { generator, backoff }
    }

    /// Analyze one case. Never returns an error: after the retry budget is
    /// spent the case comes back with `analysis_failed` and no summary.
    pub async fn analyze(&self, case: NormalizedCaseText) -> AnalyzedCase {
        if !has_justification(&case.text) {
            log::info!(
                "skipping capability call for {}: no justification section",
                case.source_id
            );
            return AnalyzedCase {
                case,
                summary: Some(NO_JUSTIFICATION_NOTE.to_string()),
                status: AnalysisStatus::Ok,
            };
        }

        let prompt = format!("{ANALYSIS_PROMPT}{}", case.text);

        for attempt in 1..=self.backoff.max_attempts {
            match self.generator.generate(SYSTEM_PROMPT, &prompt).await {
                Ok(summary) => {
                    return AnalyzedCase {
                        case,
                        summary: Some(summary),
                        status: AnalysisStatus::Ok,
                    };
                }
                Err(error) => {
                    log::warn!(
                        "analysis attempt {attempt} failed for {}: {error}",
                        case.source_id
                    );
                    if let Some(delay) = self.backoff.delay_after(attempt) {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        log::error!(
            "analysis failed for {} after {} attempts",
            case.source_id,
            self.backoff.max_attempts
        );
        AnalyzedCase {
            case,
            summary: None,
            status: AnalysisStatus::AnalysisFailed,
        }
    }
}

/// A judgment without a "Uzasadnienie" section has nothing to summarize.
fn has_justification(text: &str) -> bool {
    text.lines()
        .any(|line| line.trim().to_lowercase().starts_with("uzasadnienie"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct StubGenerator {
        calls: AtomicU32,
        fail: bool,
    }

    impl StubGenerator {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _system: &str, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AppError::Analysis {
                    message: "stub failure".into(),
                    attempts: 1,
                })
            } else {
                Ok("podsumowanie".into())
            }
        }
    }

    fn backoff(attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: attempts,
            base_delay: Duration::from_millis(1),
            multiplier: 1.0,
            jitter: Duration::ZERO,
        }
    }

    fn case(text: &str) -> NormalizedCaseText {
        NormalizedCaseText {
            source_id: "AAA111".into(),
            text: text.into(),
            signature: None,
            decision_date: None,
        }
    }

    #[tokio::test]
    async fn successful_analysis_carries_summary() {
        let generator = StubGenerator::new(false);
        let stage = AnalysisStage::new(generator.clone(), backoff(3));
        let analyzed = stage.analyze(case("Sentencja\nUzasadnienie\ntekst")).await;

        assert_eq!(analyzed.status, AnalysisStatus::Ok);
        assert_eq!(analyzed.summary.as_deref(), Some("podsumowanie"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_downgrade_to_failed_status() {
        let generator = StubGenerator::new(true);
        let stage = AnalysisStage::new(generator.clone(), backoff(3));
        let analyzed = stage.analyze(case("Uzasadnienie\ntekst")).await;

        assert_eq!(analyzed.status, AnalysisStatus::AnalysisFailed);
        assert!(analyzed.summary.is_none());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn missing_justification_skips_the_capability() {
        let generator = StubGenerator::new(true);
        let stage = AnalysisStage::new(generator.clone(), backoff(3));
        let analyzed = stage.analyze(case("Sentencja bez dalszej treści")).await;

        assert_eq!(analyzed.status, AnalysisStatus::Ok);
        assert_eq!(analyzed.summary.as_deref(), Some(NO_JUSTIFICATION_NOTE));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}
