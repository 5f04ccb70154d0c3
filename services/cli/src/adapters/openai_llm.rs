//! services/cli/src/adapters/openai_llm.rs
//!
//! This module contains the adapter for the live language model.
//! It implements the `StudyAssistantService` port from the `core` crate on top of
//! a `CompletionBackend`, which in production is an OpenAI chat completion.

use crate::adapters::offline_llm::{fallback_questions, overlap_evaluation};
use crate::adapters::prompts::{
    evaluation_input, generation_input, EVALUATE_INSTRUCTIONS, GENERATE_INSTRUCTIONS,
};
use crate::adapters::request_policy::RequestPolicy;
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use study_companion_core::{
    domain::{Evaluation, GeneratedQuestionSpec},
    ports::{
        check_evaluation_request, check_generation_request, LlmError, PortResult,
        StudyAssistantService,
    },
};
use tracing::{debug, info, warn};

//=========================================================================================
// Completion Backend
//=========================================================================================

/// One system + user exchange with a model, returning the raw reply text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// An OpenAI client that makes exactly one HTTP request per call. The client's
/// own retry loop is switched off so that `RequestPolicy` alone decides when
/// to try again and how long a call may take.
pub fn single_attempt_client(config: OpenAIConfig) -> Client<OpenAIConfig> {
    let no_retry = ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build();
    Client::with_config(config).with_backoff(no_retry)
}

/// A `CompletionBackend` using the OpenAI chat completion endpoint.
#[derive(Clone)]
pub struct OpenAiChatBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatBackend {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiChatBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(map_openai_error)?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(map_openai_error)?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(map_openai_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("the reply contained no text".to_string()))
    }
}

/// Sorts client errors into the retryable and the final ones.
///
/// The client turns every 5xx into an `ApiError` with no type, code or param
/// (the body becomes the message), and a 429 into an `ApiError` carrying the
/// rate limit type and code. An exhausted quota also answers 429 but never
/// clears on its own.
fn map_openai_error(error: OpenAIError) -> LlmError {
    match error {
        OpenAIError::Reqwest(e) if e.is_timeout() || e.is_connect() => {
            LlmError::Unavailable(e.to_string())
        }
        OpenAIError::Reqwest(e) => LlmError::RequestFailed {
            status: e.status().map(|status| status.as_u16()),
            message: e.to_string(),
        },
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.as_deref();
            let code = api.code.as_deref();
            if kind == Some("insufficient_quota") || code == Some("insufficient_quota") {
                LlmError::RequestFailed {
                    status: None,
                    message: api.message,
                }
            } else if code == Some("rate_limit_exceeded")
                || matches!(kind, Some("requests" | "tokens"))
            {
                LlmError::RateLimited
            } else if kind == Some("server_error")
                || (kind.is_none() && code.is_none() && api.param.is_none())
            {
                LlmError::Unavailable(api.message)
            } else {
                LlmError::RequestFailed {
                    status: None,
                    message: api.message,
                }
            }
        }
        malformed @ OpenAIError::JSONDeserialize(..) => {
            LlmError::InvalidResponse(malformed.to_string())
        }
        other => LlmError::RequestFailed {
            status: None,
            message: other.to_string(),
        },
    }
}

//=========================================================================================
// Response Parsing
//=========================================================================================

#[derive(Deserialize)]
struct GenerationPayload {
    #[serde(default)]
    mcq: Vec<serde_json::Value>,
    #[serde(default)]
    freeform: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct McqItem {
    question: String,
    options: Vec<String>,
    correct_index: usize,
}

#[derive(Deserialize)]
struct FreeformItem {
    question: String,
    reference_answer: String,
}

#[derive(Deserialize)]
struct EvaluationPayload {
    #[serde(alias = "is_correct")]
    correct: bool,
    #[serde(default)]
    explanation: Option<String>,
}

/// Cuts the JSON object out of a reply that may be wrapped in a code fence or prose.
fn json_body(raw: &str) -> Result<&str, LlmError> {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&raw[start..=end]),
        _ => Err(LlmError::InvalidResponse(
            "the reply did not contain a JSON object".to_string(),
        )),
    }
}

fn parse_generation(raw: &str) -> Result<Vec<GeneratedQuestionSpec>, LlmError> {
    let payload: GenerationPayload = serde_json::from_str(json_body(raw)?)
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    let mcq = payload.mcq.into_iter().map(|value| {
        serde_json::from_value::<McqItem>(value)
            .map(|item| {
                GeneratedQuestionSpec::mcq(
                    item.question.trim(),
                    item.options.iter().map(|o| o.trim().to_string()).collect(),
                    item.correct_index,
                )
            })
            .map_err(|e| e.to_string())
    });
    let freeform = payload.freeform.into_iter().map(|value| {
        serde_json::from_value::<FreeformItem>(value)
            .map(|item| {
                GeneratedQuestionSpec::freeform(item.question.trim(), item.reference_answer.trim())
            })
            .map_err(|e| e.to_string())
    });

    let mcq = keep_valid(mcq);
    let freeform = keep_valid(freeform);

    // Alternate the kinds so that truncating to the requested count keeps both.
    let mut specs = Vec::with_capacity(mcq.len() + freeform.len());
    let mut mcq = mcq.into_iter();
    let mut freeform = freeform.into_iter();
    loop {
        match (mcq.next(), freeform.next()) {
            (None, None) => break,
            (first, second) => specs.extend(first.into_iter().chain(second)),
        }
    }

    if specs.is_empty() {
        return Err(LlmError::InvalidResponse(
            "no usable questions in the reply".to_string(),
        ));
    }
    Ok(specs)
}

fn keep_valid(
    candidates: impl Iterator<Item = Result<GeneratedQuestionSpec, String>>,
) -> Vec<GeneratedQuestionSpec> {
    candidates
        .filter_map(|candidate| {
            let checked = candidate
                .and_then(|spec| spec.validate().map(|_| spec).map_err(|e| e.to_string()));
            match checked {
                Ok(spec) => Some(spec),
                Err(reason) => {
                    debug!("Dropping generated question: {}", reason);
                    None
                }
            }
        })
        .collect()
}

fn parse_evaluation(raw: &str) -> Result<Evaluation, LlmError> {
    let payload: EvaluationPayload = serde_json::from_str(json_body(raw)?)
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    let explanation = payload
        .explanation
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "No explanation provided.".to_string());

    Ok(Evaluation {
        correct: payload.correct,
        explanation,
    })
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `StudyAssistantService` using a live language model.
pub struct OpenAiStudyAdapter {
    backend: Arc<dyn CompletionBackend>,
    policy: RequestPolicy,
    fallback_on_error: bool,
}

impl OpenAiStudyAdapter {
    /// Creates a new `OpenAiStudyAdapter`. With `fallback_on_error` set, a call
    /// that still fails after every retry is answered by the offline heuristics.
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        policy: RequestPolicy,
        fallback_on_error: bool,
    ) -> Self {
        Self {
            backend,
            policy,
            fallback_on_error,
        }
    }

    async fn request<T>(
        &self,
        operation: &str,
        system: &str,
        user: &str,
        parse: fn(&str) -> Result<T, LlmError>,
    ) -> Result<T, LlmError> {
        let backend = self.backend.as_ref();
        self.policy
            .call_with_retry(operation, move || async move {
                let raw = backend.complete(system, user).await?;
                parse(&raw)
            })
            .await
    }
}

//=========================================================================================
// `StudyAssistantService` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyAssistantService for OpenAiStudyAdapter {
    async fn generate_questions(
        &self,
        topic: &str,
        count: usize,
    ) -> PortResult<Vec<GeneratedQuestionSpec>> {
        check_generation_request(topic, count)?;
        let topic = topic.trim();
        let input = generation_input(topic, count);

        match self
            .request("Question generation", GENERATE_INSTRUCTIONS, &input, parse_generation)
            .await
        {
            Ok(mut specs) => {
                specs.truncate(count);
                info!("Generated {} question(s) about '{}'.", specs.len(), topic);
                Ok(specs)
            }
            Err(e) if self.fallback_on_error => {
                warn!("Question generation failed ({}); using offline questions.", e);
                Ok(fallback_questions(topic, count))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn evaluate_freeform(
        &self,
        question_text: &str,
        reference_answer: &str,
        user_answer: &str,
    ) -> PortResult<Evaluation> {
        check_evaluation_request(question_text, reference_answer)?;
        let input = evaluation_input(question_text, reference_answer, user_answer);

        match self
            .request("Answer evaluation", EVALUATE_INSTRUCTIONS, &input, parse_evaluation)
            .await
        {
            Ok(evaluation) => Ok(evaluation),
            Err(e) if self.fallback_on_error => {
                warn!("Answer evaluation failed ({}); using the offline check.", e);
                Ok(overlap_evaluation(reference_answer, user_answer))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn is_live(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::request_policy::RetryPolicy;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use study_companion_core::ports::PortError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Replays canned replies in order; the last one repeats.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<&str, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|reply| reply.map(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap()
            }
        }
    }

    fn adapter(backend: Arc<ScriptedBackend>, fallback_on_error: bool) -> OpenAiStudyAdapter {
        let policy = RequestPolicy::new(
            Duration::ZERO,
            RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                attempt_timeout: Duration::from_secs(1),
            },
        );
        OpenAiStudyAdapter::new(backend, policy, fallback_on_error)
    }

    fn http(status: u16) -> LlmError {
        LlmError::RequestFailed {
            status: Some(status),
            message: "scripted".to_string(),
        }
    }

    const GOOD_GENERATION: &str = r#"```json
{
  "mcq": [
    {"question": "What is 2 + 2?", "options": ["3", "4", "5"], "correct_index": 1}
  ],
  "freeform": [
    {"question": "Define a prime number.", "reference_answer": "A number with exactly two divisors."},
    {"question": "Why is 1 not prime?", "reference_answer": "It has only one divisor."}
  ]
}
```"#;

    #[tokio::test]
    async fn fenced_generation_reply_is_parsed() {
        let backend = ScriptedBackend::new(vec![Ok(GOOD_GENERATION)]);
        let specs = adapter(backend.clone(), false)
            .generate_questions("arithmetic", 5)
            .await
            .unwrap();

        assert_eq!(specs.len(), 3);
        assert_eq!(
            specs[0],
            GeneratedQuestionSpec::mcq(
                "What is 2 + 2?",
                vec!["3".to_string(), "4".to_string(), "5".to_string()],
                1
            )
        );
        assert!(!specs[1].kind.is_mcq());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn generation_is_truncated_to_the_requested_count() {
        let backend = ScriptedBackend::new(vec![Ok(GOOD_GENERATION)]);
        let specs = adapter(backend, false)
            .generate_questions("arithmetic", 2)
            .await
            .unwrap();
        assert_eq!(specs.len(), 2);
    }

    #[tokio::test]
    async fn truncation_keeps_both_question_kinds() {
        let reply = r#"{
          "mcq": [
            {"question": "First?", "options": ["a", "b"], "correct_index": 0},
            {"question": "Second?", "options": ["a", "b"], "correct_index": 1},
            {"question": "Third?", "options": ["a", "b"], "correct_index": 0}
          ],
          "freeform": [
            {"question": "Explain it.", "reference_answer": "Like this."}
          ]
        }"#;
        let backend = ScriptedBackend::new(vec![Ok(reply)]);
        let specs = adapter(backend, false)
            .generate_questions("anything", 3)
            .await
            .unwrap();

        let kinds: Vec<bool> = specs.iter().map(|spec| spec.kind.is_mcq()).collect();
        assert_eq!(kinds, vec![true, false, true]);
        assert_eq!(specs[1], GeneratedQuestionSpec::freeform("Explain it.", "Like this."));
    }

    #[tokio::test]
    async fn invalid_items_are_dropped() {
        let reply = r#"{
          "mcq": [
            {"question": "Out of range", "options": ["a", "b"], "correct_index": 7},
            {"question": "Too few", "options": ["only"], "correct_index": 0},
            {"question": "Negative", "options": ["a", "b"], "correct_index": -1}
          ],
          "freeform": [
            {"question": "No reference"},
            {"question": "  ", "reference_answer": "blank question"},
            {"question": "Kept", "reference_answer": "yes"}
          ]
        }"#;
        let backend = ScriptedBackend::new(vec![Ok(reply)]);
        let specs = adapter(backend, false)
            .generate_questions("anything", 10)
            .await
            .unwrap();

        assert_eq!(specs, vec![GeneratedQuestionSpec::freeform("Kept", "yes")]);
    }

    #[tokio::test]
    async fn reply_without_valid_items_is_an_error_after_retries() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{"mcq": [], "freeform": []}"#)]);
        let result = adapter(backend.clone(), false)
            .generate_questions("anything", 3)
            .await;

        assert!(matches!(
            result,
            Err(PortError::Llm(LlmError::InvalidResponse(_)))
        ));
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn legacy_evaluation_key_is_accepted() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{"is_correct": true, "explanation": " "}"#)]);
        let evaluation = adapter(backend, false)
            .evaluate_freeform("Q?", "reference", "answer")
            .await
            .unwrap();

        assert!(evaluation.correct);
        assert_eq!(evaluation.explanation, "No explanation provided.");
    }

    #[tokio::test]
    async fn rate_limited_call_is_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(http(429)),
            Ok(r#"{"correct": false, "explanation": "Missing the key idea."}"#),
        ]);
        let evaluation = adapter(backend.clone(), false)
            .evaluate_freeform("Q?", "reference", "answer")
            .await
            .unwrap();

        assert!(!evaluation.correct);
        assert_eq!(evaluation.explanation, "Missing the key idea.");
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn bad_request_is_not_retried() {
        let backend = ScriptedBackend::new(vec![Err(http(400))]);
        let result = adapter(backend.clone(), false)
            .evaluate_freeform("Q?", "reference", "answer")
            .await;

        assert!(matches!(
            result,
            Err(PortError::Llm(LlmError::RequestFailed {
                status: Some(400),
                ..
            }))
        ));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_fall_back_when_enabled() {
        let backend = ScriptedBackend::new(vec![Err(http(503))]);
        let adapter = adapter(backend.clone(), true);

        let specs = adapter.generate_questions("gravity", 3).await.unwrap();
        assert_eq!(specs, fallback_questions("gravity", 3));
        assert_eq!(backend.calls(), 3);

        let evaluation = adapter
            .evaluate_freeform("Q?", "mass attracts mass", "Mass attracts mass")
            .await
            .unwrap();
        assert!(evaluation.correct);
        assert!(adapter.is_live());
    }

    //-------------------------------------------------------------------------------------
    // Against a local HTTP server
    //-------------------------------------------------------------------------------------

    const CHAT_REPLY: &str = r#"{"id":"chatcmpl-1","object":"chat.completion","created":1,"model":"m","choices":[{"index":0,"message":{"role":"assistant","content":"hello"},"finish_reason":"stop"}]}"#;

    /// Answers each connection with the next canned `(status, body)`; the last
    /// one repeats. Returns the base URL and the number of requests served.
    async fn serve(replies: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served = Arc::new(AtomicUsize::new(0));
        let counter = served.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let index = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = replies[index.min(replies.len() - 1)];
                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/v1"), served)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                return;
            }
            request.extend_from_slice(&chunk[..read]);
            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                break end + 4;
            }
        };
        let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
        let length: usize = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0);
        while request.len() < header_end + length {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                return;
            }
            request.extend_from_slice(&chunk[..read]);
        }
    }

    fn chat_backend(api_base: &str) -> OpenAiChatBackend {
        let config = OpenAIConfig::new()
            .with_api_base(api_base)
            .with_api_key("test");
        OpenAiChatBackend::new(single_attempt_client(config), "m".to_string())
    }

    fn policy(max_retries: u32) -> RequestPolicy {
        RequestPolicy::new(
            Duration::ZERO,
            RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                attempt_timeout: Duration::from_secs(5),
            },
        )
    }

    #[tokio::test]
    async fn server_error_is_sent_once_per_attempt() {
        let (api_base, served) = serve(vec![(503, "upstream overloaded")]).await;
        let backend = chat_backend(&api_base);

        let result = policy(0)
            .call_with_retry("chat", || backend.complete("system", "user"))
            .await;

        assert!(matches!(
            result,
            Err(LlmError::Unavailable(ref message)) if message.contains("overloaded")
        ));
        assert_eq!(served.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_reply_is_retried_by_the_policy() {
        let rate_limited = r#"{"error":{"message":"Rate limit reached","type":"requests","param":null,"code":"rate_limit_exceeded"}}"#;
        let (api_base, served) = serve(vec![(429, rate_limited), (200, CHAT_REPLY)]).await;
        let backend = chat_backend(&api_base);

        let reply = policy(1)
            .call_with_retry("chat", || backend.complete("system", "user"))
            .await;

        assert_eq!(reply, Ok("hello".to_string()));
        assert_eq!(served.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_quota_is_final() {
        let no_quota = r#"{"error":{"message":"You exceeded your quota","type":"insufficient_quota","param":null,"code":"insufficient_quota"}}"#;
        let (api_base, served) = serve(vec![(429, no_quota)]).await;
        let backend = chat_backend(&api_base);

        let result = policy(2)
            .call_with_retry("chat", || backend.complete("system", "user"))
            .await;

        assert!(matches!(result, Err(LlmError::RequestFailed { .. })));
        assert_eq!(served.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend = chat_backend(&format!("http://{addr}/v1"));

        let result = backend.complete("system", "user").await;

        assert!(matches!(result, Err(LlmError::Unavailable(_))));
        assert!(result.unwrap_err().is_transient());
    }

    #[test]
    fn reply_without_json_is_invalid() {
        assert!(matches!(
            parse_evaluation("I think it is correct."),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
