//! Model gateway: retry and failure classification around a [`Generator`]

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{Generator, ModelRequest, ProviderError};
use crate::retry::RetryPolicy;

/// Sends prompts to the language model
pub struct ModelGateway {
    generator: Arc<dyn Generator>,
    retry: RetryPolicy,
}

impl ModelGateway {
    pub fn new(generator: Arc<dyn Generator>, retry: RetryPolicy) -> Self {
        Self { generator, retry }
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Raw model output for `request`
    ///
    /// Refusals surface as [`Error::ModelRefusal`] and are never retried.
    pub async fn generate(&self, request: &ModelRequest) -> Result<String> {
        tracing::debug!(
            "Calling {} model '{}'",
            self.generator.name(),
            self.generator.model()
        );

        self.retry
            .run("generation", |_attempt| self.generator.generate(request))
            .await
            .map_err(|failure| match failure.last_error {
                ProviderError::Refused(reason) => Error::ModelRefusal { reason },
                err => Error::ModelUnavailable {
                    attempts: failure.attempts,
                    code: Some(err.code()),
                    reason: err.to_string(),
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::GenerationParams;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Replays scripted outcomes, last one repeating
    struct ScriptedGenerator {
        outcomes: Mutex<Vec<std::result::Result<String, ProviderError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedGenerator {
        fn new(mut outcomes: Vec<std::result::Result<String, ProviderError>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, _request: &ModelRequest) -> std::result::Result<String, ProviderError> {
            *self.calls.lock() += 1;
            let mut outcomes = self.outcomes.lock();
            if outcomes.len() > 1 {
                outcomes.pop().unwrap_or(Err(ProviderError::Timeout))
            } else {
                outcomes.last().cloned().unwrap_or(Err(ProviderError::Timeout))
            }
        }

        fn model(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn request() -> ModelRequest {
        ModelRequest {
            system: "system".to_string(),
            prompt: "prompt".to_string(),
            schema: None,
            params: GenerationParams::default(),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(ProviderError::RateLimited { retry_after: None }),
            Ok("{}".to_string()),
        ]));
        let gateway = ModelGateway::new(generator.clone(), RetryPolicy::immediate(3));

        assert_eq!(gateway.generate(&request()).await.unwrap(), "{}");
        assert_eq!(*generator.calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_refusal_is_not_retried() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(ProviderError::Refused(
            "content policy".to_string(),
        ))]));
        let gateway = ModelGateway::new(generator.clone(), RetryPolicy::immediate(3));

        let err = gateway.generate(&request()).await.unwrap_err();
        assert!(matches!(err, Error::ModelRefusal { .. }));
        assert_eq!(*generator.calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts_and_code() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(ProviderError::Timeout)]));
        let gateway = ModelGateway::new(generator.clone(), RetryPolicy::immediate(3));

        match gateway.generate(&request()).await.unwrap_err() {
            Error::ModelUnavailable { attempts, code, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(code.as_deref(), Some("timeout"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_request_fails_once() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(ProviderError::from_status(
            404,
            "model not found",
        ))]));
        let gateway = ModelGateway::new(generator.clone(), RetryPolicy::immediate(3));

        match gateway.generate(&request()).await.unwrap_err() {
            Error::ModelUnavailable { attempts, code, .. } => {
                assert_eq!(attempts, 1);
                assert_eq!(code.as_deref(), Some("404"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
