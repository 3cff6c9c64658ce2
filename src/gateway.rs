//! The message gateway: admission, routing, caching, and history in one flow.
//!
//! `handle` is the single entry point the transport adapter calls. It never
//! returns an error: every failure path resolves to a polite, structured
//! reply while the classification detail stays in the logs.

use crate::cache::{Deduplicator, ResponseCache};
use crate::config::Config;
use crate::conversation::{ConversationStore, EntryMetadata, Role};
use crate::error::GatewayError;
use crate::limits::RateLimiter;
use crate::orchestrator::{CitationBlock, Orchestrator, ServiceReply};
use crate::reliability::{CircuitBreaker, GuardedCall};
use crate::services::{ChatService, ServiceKind};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

// User-facing replies for the failure paths. Classification detail never
// leaks into these.
const MSG_EMPTY_MESSAGE: &str = "❓ Please send a message for me to respond to.";
const MSG_RATE_LIMITED: &str =
    "⏱️ Rate limit exceeded! Please wait a moment before sending another message.";
const MSG_WEB_UNAVAILABLE: &str =
    "🔍 Web search is temporarily unavailable. Please try again in a few moments.";
const MSG_CHAT_UNAVAILABLE: &str =
    "🤖 AI service is temporarily unavailable. Please try again in a few moments.";
const MSG_ALL_UNAVAILABLE: &str =
    "🔧 All AI services are temporarily unavailable. Please try again later.";
const MSG_CONFIGURATION: &str =
    "⚠️ AI services are not properly configured. Please contact the administrator.";
const MSG_UNEXPECTED: &str =
    "🔧 An unexpected error occurred while processing your request. Please try again.";

/// The upstream services available to the gateway. At least one must be set.
#[derive(Default)]
pub struct ServiceSet {
    pub conversational: Option<Arc<dyn ChatService>>,
    pub web_search: Option<Arc<dyn ChatService>>,
}

/// What the transport adapter receives for every handled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    pub text: String,
    pub suppress_preview: bool,
    pub citations: Option<CitationBlock>,
}

impl From<ServiceReply> for GatewayReply {
    fn from(reply: ServiceReply) -> Self {
        Self {
            text: reply.text,
            suppress_preview: reply.suppress_preview,
            citations: reply.citations,
        }
    }
}

impl GatewayReply {
    fn message(text: &str) -> Self {
        Self {
            text: text.to_string(),
            suppress_preview: false,
            citations: None,
        }
    }
}

/// Front door for incoming chat messages.
///
/// Flow per message: admission → routing → cache lookup → deduplicated,
/// breaker-guarded, retrying upstream call → conversation update → cache
/// store → reply.
pub struct MessageGateway {
    config: Config,
    store: Arc<ConversationStore>,
    limiter: RateLimiter,
    cache: ResponseCache<ServiceReply>,
    dedup: Deduplicator<Result<ServiceReply, GatewayError>>,
    orchestrator: Orchestrator,
}

impl std::fmt::Debug for MessageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageGateway").finish_non_exhaustive()
    }
}

impl MessageGateway {
    /// Wire up a gateway from configuration and the available services.
    ///
    /// Each service gets its own circuit breaker; both share the retry
    /// policy from the reliability config.
    pub fn new(config: Config, services: ServiceSet) -> Result<Self, GatewayError> {
        if services.conversational.is_none() && services.web_search.is_none() {
            return Err(GatewayError::Config(
                "at least one upstream service must be configured".to_string(),
            ));
        }

        let store = Arc::new(ConversationStore::new(
            config.conversation.max_history,
            config.conversation.lock_sweep_interval(),
        ));

        let retry = config.reliability.retry_policy();
        let breaker_config = config.reliability.breaker_config();
        let guard = |service: Arc<dyn ChatService>, kind: ServiceKind| {
            GuardedCall::new(
                service,
                Arc::new(CircuitBreaker::new(kind.as_str(), breaker_config.clone())),
                retry.clone(),
            )
        };

        let conversational = services
            .conversational
            .map(|s| guard(s, ServiceKind::Conversational));
        let web_search = services.web_search.map(|s| guard(s, ServiceKind::WebSearch));

        info!(
            conversational = conversational.is_some(),
            web_search = web_search.is_some(),
            "message gateway initialized"
        );

        let orchestrator = Orchestrator::new(
            conversational,
            web_search,
            Arc::clone(&store),
            &config.orchestrator,
            config.models.clone(),
        );

        Ok(Self {
            store,
            limiter: RateLimiter::new(),
            cache: ResponseCache::new(
                config.cache.max_entries,
                config.cache.default_ttl(),
                config.cache.long_ttl(),
            ),
            dedup: Deduplicator::new(),
            orchestrator,
            config,
        })
    }

    /// The conversation store backing this gateway.
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Handle one incoming message from `user`.
    pub async fn handle(&self, user: u64, message: &str) -> GatewayReply {
        let message = message.trim();
        if message.is_empty() {
            debug!(user, "empty message");
            return GatewayReply::message(MSG_EMPTY_MESSAGE);
        }

        if !self.limiter.check(
            user,
            self.config.rate_limit.max_requests,
            self.config.rate_limit.window(),
        ) {
            let err = GatewayError::RateLimitExceeded { user };
            warn!(user, %err, "admission denied");
            return self.failure_reply(&err);
        }

        let plan = self.orchestrator.plan(user, message);
        let key = ResponseCache::<ServiceReply>::key(
            message,
            &plan.model,
            self.config.models.system_prompt_for(plan.service),
        );

        if let Some(reply) = self.cache.get(&key) {
            info!(user, service = %reply.service, "serving cached reply");
            return reply.into();
        }

        let outcome = self
            .dedup
            .run(&key, || async {
                self.orchestrator.execute(user, message, &plan).await
            })
            .await;

        match outcome {
            Ok(reply) => {
                // History changes only after a successful upstream response;
                // each coalesced waiter records its own user's turns.
                self.store.append(user, Role::User, message, None);
                self.store.append(
                    user,
                    Role::Assistant,
                    &reply.text,
                    Some(EntryMetadata {
                        service_used: Some(reply.service),
                        citation_count: reply.citations.as_ref().map(|c| c.citations.len()),
                    }),
                );
                self.cache.store(&key, &reply.text, reply.clone(), None);
                reply.into()
            }
            Err(err) => {
                match &err {
                    GatewayError::Upstream(upstream) => {
                        error!(user, kind = %upstream.kind, %upstream, "upstream call failed");
                    }
                    other => error!(user, %other, "message handling failed"),
                }
                self.failure_reply(&err)
            }
        }
    }

    fn failure_reply(&self, err: &GatewayError) -> GatewayReply {
        let text = match err {
            GatewayError::RateLimitExceeded { .. } => MSG_RATE_LIMITED,
            GatewayError::Validation(_) => MSG_UNEXPECTED,
            GatewayError::Config(_) => MSG_CONFIGURATION,
            GatewayError::CircuitOpen { .. } | GatewayError::Upstream(_) => {
                // In hybrid mode both services were tried before we got here
                match self.orchestrator.single_service() {
                    None => MSG_ALL_UNAVAILABLE,
                    Some(ServiceKind::WebSearch) => MSG_WEB_UNAVAILABLE,
                    Some(ServiceKind::Conversational) => MSG_CHAT_UNAVAILABLE,
                }
            }
        };
        GatewayReply::message(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::services::CompletionRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockService {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        fail_first: usize,
        response: String,
        error: fn() -> ServiceError,
    }

    impl MockService {
        fn ok(name: &'static str, response: &str) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let service = Arc::new(Self {
                name,
                calls: Arc::clone(&calls),
                fail_first: 0,
                response: response.to_string(),
                error: || ServiceError::server("unused"),
            });
            (service, calls)
        }

        fn failing(name: &'static str, error: fn() -> ServiceError) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let service = Arc::new(Self {
                name,
                calls: Arc::clone(&calls),
                fail_first: usize::MAX,
                response: String::new(),
                error,
            });
            (service, calls)
        }
    }

    #[async_trait]
    impl ChatService for MockService {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ServiceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err((self.error)())
            } else {
                Ok(self.response.clone())
            }
        }
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.reliability.base_delay_ms = 1;
        config.reliability.max_delay_ms = 5;
        config
    }

    #[test]
    fn rejects_construction_without_any_service() {
        let err = MessageGateway::new(fast_config(), ServiceSet::default()).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[tokio::test]
    async fn empty_message_gets_polite_reply() {
        let (service, calls) = MockService::ok("chat", "hello!");
        let gateway = MessageGateway::new(
            fast_config(),
            ServiceSet {
                conversational: Some(service),
                web_search: None,
            },
        )
        .unwrap();

        let reply = gateway.handle(1, "   ").await;
        assert_eq!(reply.text, MSG_EMPTY_MESSAGE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(gateway.store().read(1).is_empty());
    }

    #[tokio::test]
    async fn rate_limit_denial_is_a_polite_reply() {
        let (service, _calls) = MockService::ok("chat", "a perfectly fine answer");
        let mut config = fast_config();
        config.rate_limit.max_requests = 1;
        let gateway = MessageGateway::new(
            config,
            ServiceSet {
                conversational: Some(service),
                web_search: None,
            },
        )
        .unwrap();

        let first = gateway.handle(1, "hello there friend").await;
        assert_eq!(first.text, "a perfectly fine answer");

        let second = gateway.handle(1, "hello again").await;
        assert_eq!(second.text, MSG_RATE_LIMITED);

        // Another user is unaffected
        let other = gateway.handle(2, "hello there friend").await;
        assert_eq!(other.text, "a perfectly fine answer");
    }

    #[tokio::test]
    async fn cached_reply_skips_upstream_and_history() {
        let (service, calls) = MockService::ok("chat", "Rust is a systems programming language.");
        let gateway = MessageGateway::new(
            fast_config(),
            ServiceSet {
                conversational: Some(service),
                web_search: None,
            },
        )
        .unwrap();

        let first = gateway.handle(1, "what is rust").await;
        let second = gateway.handle(1, "What is Rust  ").await;
        assert_eq!(first.text, second.text);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "cache miss on second call");

        // Only the upstream-backed exchange reached history
        assert_eq!(gateway.store().read(1).len(), 2);
    }

    #[tokio::test]
    async fn single_service_failure_maps_to_mode_message() {
        let (service, calls) = MockService::failing("chat", || ServiceError::auth("key revoked"));
        let gateway = MessageGateway::new(
            fast_config(),
            ServiceSet {
                conversational: Some(service),
                web_search: None,
            },
        )
        .unwrap();

        let reply = gateway.handle(1, "hello?").await;
        assert_eq!(reply.text, MSG_CHAT_UNAVAILABLE);
        // Auth errors skip retries entirely
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Failed calls never touch history
        assert!(gateway.store().read(1).is_empty());
    }

    #[tokio::test]
    async fn web_only_failure_names_web_search() {
        let (service, _calls) = MockService::failing("web", || ServiceError::server("500"));
        let gateway = MessageGateway::new(
            fast_config(),
            ServiceSet {
                conversational: None,
                web_search: Some(service),
            },
        )
        .unwrap();

        let reply = gateway.handle(1, "anything at all").await;
        assert_eq!(reply.text, MSG_WEB_UNAVAILABLE);
    }

    #[tokio::test]
    async fn hybrid_failure_of_both_services_reports_all_unavailable() {
        let (chat, _) = MockService::failing("chat", || ServiceError::server("chat down"));
        let (web, _) = MockService::failing("web", || ServiceError::server("web down"));
        let gateway = MessageGateway::new(
            fast_config(),
            ServiceSet {
                conversational: Some(chat),
                web_search: Some(web),
            },
        )
        .unwrap();

        let reply = gateway.handle(1, "What's the stock price today?").await;
        assert_eq!(reply.text, MSG_ALL_UNAVAILABLE);
    }

    #[tokio::test]
    async fn hybrid_falls_back_to_secondary_service() {
        let (web, web_calls) = MockService::failing("web", || ServiceError::timeout("slow"));
        let (chat, chat_calls) = MockService::ok("chat", "I can still help from memory.");
        let gateway = MessageGateway::new(
            fast_config(),
            ServiceSet {
                conversational: Some(chat),
                web_search: Some(web),
            },
        )
        .unwrap();

        // Routes to web search first, exhausts it, then recovers via chat
        let reply = gateway.handle(1, "What's the stock price today?").await;
        assert_eq!(reply.text, "I can still help from memory.");
        assert_eq!(web_calls.load(Ordering::SeqCst), 3, "web retries exhausted");
        assert_eq!(chat_calls.load(Ordering::SeqCst), 1);

        let history = gateway.store().read(1);
        assert_eq!(history.len(), 2);
        let metadata = history[1].metadata.unwrap();
        assert_eq!(metadata.service_used, Some(ServiceKind::Conversational));
    }

    #[tokio::test]
    async fn empty_completion_is_treated_as_failure() {
        let (service, _calls) = MockService::ok("chat", "   ");
        let gateway = MessageGateway::new(
            fast_config(),
            ServiceSet {
                conversational: Some(service),
                web_search: None,
            },
        )
        .unwrap();

        let reply = gateway.handle(1, "hello").await;
        assert_eq!(reply.text, MSG_CHAT_UNAVAILABLE);
        assert!(gateway.store().read(1).is_empty());
    }
}
