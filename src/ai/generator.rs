use super::config::{SIMPLIFIED_MAX_MAX_TOKENS, SIMPLIFIED_MIN_MAX_TOKENS};
use super::openai::OpenAICompatibleTransport;
use super::prompts::{build_prompt, build_simplified_message, token_budget};
use super::{
    ChatMessage, CompletionRequest, CompletionTransport, FallbackProvider, GenerationConfig, GenerationError,
    GenerationParams, GenerationResult, HealthState, HealthStatus, MessageSource, RateLimiter,
    ResponseValidator, RetryPolicy, RetryingTransport, TemplateFallback,
};
use crate::state_machine::{GenerationState, GenerationStateMachine};
use crate::utils::logger::{log_event, preview, LogContext, LogEvent, OperationPhase};
use std::sync::Arc;
use std::time::Instant;

const OPERATION: &str = "GENERATE_TEMPLATE";

/// Composes prompt building, rate limiting, retries, validation and fallback
/// into one `generate()` call.
///
/// Cheap to share behind an `Arc`; `generate` takes `&self` and many calls may
/// run concurrently. The only cross-call state is the rate limiter.
pub struct MessageTemplateGenerator {
    config: Arc<GenerationConfig>,
    limiter: Arc<RateLimiter>,
    /// Single-attempt transport; wrapped with the current limiter and retry policy per call
    transport: Option<Arc<dyn CompletionTransport>>,
    fallback: Arc<dyn FallbackProvider>,
    validator: ResponseValidator,
}

impl MessageTemplateGenerator {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(config.min_interval()));
        let validator = ResponseValidator::new(config.placeholder_repair_clause.clone());

        Ok(Self {
            config: Arc::new(config),
            limiter,
            transport: None,
            fallback: Arc::new(TemplateFallback::default()),
            validator,
        })
    }

    /// Use a custom single-attempt transport instead of the HTTP client.
    /// Calls go through this generator's limiter and retry policy.
    pub fn with_transport(mut self, inner: Arc<dyn CompletionTransport>) -> Self {
        self.transport = Some(inner);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackProvider>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Share one spacing budget across generators
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        self.limiter.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.transport.is_some()
    }

    fn retrying(&self, inner: &Arc<dyn CompletionTransport>) -> RetryingTransport {
        RetryingTransport::new(
            inner.clone(),
            self.limiter.clone(),
            RetryPolicy::from_config(&self.config),
        )
    }

    /// Acquire the HTTP transport. No-op when AI is unavailable or already initialized.
    pub async fn initialize(&mut self) -> Result<(), GenerationError> {
        if self.transport.is_some() {
            return Ok(());
        }

        if !self.config.ai_available() {
            log::info!("No API key configured or AI disabled; using fallback templates only");
            return Ok(());
        }

        let http = OpenAICompatibleTransport::new(&self.config)?;
        log::info!(
            "AI transport initialized (endpoint: {}, model: {})",
            http.endpoint(),
            self.config.model
        );
        self.transport = Some(Arc::new(http));
        Ok(())
    }

    /// Release the transport. Later calls take the fallback path.
    pub async fn cleanup(&mut self) {
        if self.transport.take().is_some() {
            log::info!("AI transport released");
        }
    }

    pub fn health_check(&self) -> HealthStatus {
        let ai_enabled = self.config.ai_available() && self.transport.is_some();
        let status = if ai_enabled || self.config.enable_fallback_templates {
            HealthState::Healthy
        } else {
            HealthState::Degraded
        };

        HealthStatus {
            status,
            model: self.config.model.clone(),
            ai_enabled,
        }
    }

    pub async fn generate(&self, params: GenerationParams) -> GenerationResult {
        let start = Instant::now();
        let mut machine = GenerationStateMachine::new();

        log_event(LogEvent::Operation {
            name: OPERATION.to_string(),
            phase: OperationPhase::Start,
            context: Some(LogContext::from_pairs([
                ("tone", params.tone.to_string()),
                ("length", params.length.to_string()),
                ("placeholders", params.placeholder_names().join(",")),
            ])),
        });

        let result = self.run(&params, &mut machine).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match &result.error {
            None => log_event(LogEvent::Operation {
                name: OPERATION.to_string(),
                phase: OperationPhase::Complete { duration_ms },
                context: Some(LogContext::from_pairs([(
                    "source",
                    format!("{:?}", result.source),
                )])),
            }),
            Some(error) => log_event(LogEvent::Operation {
                name: OPERATION.to_string(),
                phase: OperationPhase::Failed { error: error.clone() },
                context: None,
            }),
        }
        log::debug!("[FLOW] path {:?}", machine.path());

        result
    }

    async fn run(&self, params: &GenerationParams, machine: &mut GenerationStateMachine) -> GenerationResult {
        if let Err(e) = params.validate() {
            advance(machine, GenerationState::Done);
            return GenerationResult::failed(params, &e);
        }

        let required = params.placeholder_names();

        let transport = match (&self.transport, self.config.ai_available()) {
            (Some(inner), true) => self.retrying(inner),
            (_, ai_available) => {
                let reason = if ai_available {
                    "AI client not initialized"
                } else {
                    "AI disabled or API key missing"
                };
                return self.fall_back_or_fail(
                    params,
                    &required,
                    GenerationError::AiUnavailable(reason.to_string()),
                    machine,
                );
            }
        };

        advance(machine, GenerationState::Building);
        let payload = build_prompt(params, &self.config);
        let max_tokens = token_budget(params.length, self.config.max_tokens);
        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: payload.into_messages(),
            max_tokens,
            temperature: self.config.temperature,
        };
        let simplified = CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(build_simplified_message(params))],
            max_tokens: max_tokens.clamp(SIMPLIFIED_MIN_MAX_TOKENS, SIMPLIFIED_MAX_MAX_TOKENS),
            temperature: self.config.temperature,
        };

        advance(machine, GenerationState::RateLimited);
        let outcome = transport
            .call_observed(&request, Some(&simplified), |attempt| {
                if attempt == 0 {
                    advance(machine, GenerationState::Calling);
                }
            })
            .await;

        match outcome {
            Ok(completion) => {
                advance(machine, GenerationState::Validating);
                if let Some(tokens) = completion.total_tokens {
                    log::info!("Token usage: {}", tokens);
                }
                let message = self.validator.validate(&completion.text, &required);
                if log::log_enabled!(log::Level::Info) {
                    log::info!("AI message preview: {}", preview(&message));
                }
                advance(machine, GenerationState::Done);
                GenerationResult::completed(params, message, MessageSource::Ai)
            }
            Err(e) => self.fall_back_or_fail(params, &required, e, machine),
        }
    }

    fn fall_back_or_fail(
        &self,
        params: &GenerationParams,
        required: &[String],
        error: GenerationError,
        machine: &mut GenerationStateMachine,
    ) -> GenerationResult {
        if error.allows_fallback() && self.config.enable_fallback_templates {
            log::warn!("Using fallback template: {}", error);
            advance(machine, GenerationState::FallingBack);
            let message = self.validator.validate(&self.fallback.fallback(params), required);
            advance(machine, GenerationState::Done);
            return GenerationResult::completed(params, message, MessageSource::Fallback);
        }

        advance(machine, GenerationState::Done);
        GenerationResult::failed(params, &error)
    }
}

fn advance(machine: &mut GenerationStateMachine, state: GenerationState) {
    if let Err(e) = machine.transition_to(state) {
        log::error!("[FLOW] {}", e);
    }
}
