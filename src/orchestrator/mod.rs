//! Service selection and guarded execution.
//!
//! The router is a pure, data-driven decision list over lexical pattern
//! groups; the orchestrator owns the guarded service handles and applies
//! mode handling and cross-service fallback around the router's choice.

pub mod citations;
pub mod patterns;

mod router;

pub use citations::CitationBlock;
pub use router::{RouteChoice, Router};

use crate::config::{ModelsConfig, OrchestratorConfig};
use crate::conversation::ConversationStore;
use crate::error::{GatewayError, ServiceError};
use crate::reliability::GuardedCall;
use crate::services::{CompletionRequest, ServiceKind};
use std::sync::Arc;
use tracing::{error, info, warn};

/// A reply produced by one upstream service, ready for the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReply {
    pub service: ServiceKind,
    pub text: String,
    pub suppress_preview: bool,
    pub citations: Option<CitationBlock>,
}

/// Routing decision plus the context needed to execute it.
#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub service: ServiceKind,
    pub rule: &'static str,
    pub model: String,
}

/// Selects an upstream service for each message and executes the call with
/// fallback to the secondary service when the primary is exhausted.
pub struct Orchestrator {
    conversational: Option<GuardedCall>,
    web_search: Option<GuardedCall>,
    router: Router,
    store: Arc<ConversationStore>,
    models: ModelsConfig,
    lookback: usize,
}

impl Orchestrator {
    pub fn new(
        conversational: Option<GuardedCall>,
        web_search: Option<GuardedCall>,
        store: Arc<ConversationStore>,
        orchestrator_config: &OrchestratorConfig,
        models: ModelsConfig,
    ) -> Self {
        Self {
            conversational,
            web_search,
            router: Router::new(orchestrator_config.entity_min_words),
            store,
            models,
            lookback: orchestrator_config.lookback_messages,
        }
    }

    /// Whether both services are configured (hybrid mode).
    pub fn is_hybrid(&self) -> bool {
        self.conversational.is_some() && self.web_search.is_some()
    }

    /// The sole configured service, or `None` in hybrid mode.
    pub fn single_service(&self) -> Option<ServiceKind> {
        match (&self.conversational, &self.web_search) {
            (Some(_), None) => Some(ServiceKind::Conversational),
            (None, Some(_)) => Some(ServiceKind::WebSearch),
            _ => None,
        }
    }

    /// The service any upcoming call for `message` would use.
    ///
    /// Single-service modes short-circuit; the routing decision list only
    /// runs when both services exist.
    pub fn plan(&self, user: u64, message: &str) -> RoutePlan {
        let service = match (&self.conversational, &self.web_search) {
            (Some(_), None) => RouteChoice {
                service: ServiceKind::Conversational,
                rule: "conversational-only-mode",
            },
            (None, Some(_)) => RouteChoice {
                service: ServiceKind::WebSearch,
                rule: "web-search-only-mode",
            },
            _ => {
                let recent = self.store.recent_service(user, self.lookback);
                self.router.decide(message, recent)
            }
        };

        info!(
            user,
            service = %service.service,
            rule = service.rule,
            "routing decision"
        );

        RoutePlan {
            service: service.service,
            rule: service.rule,
            model: self.models.model_for(service.service).to_string(),
        }
    }

    /// Execute `plan`, falling back once to the secondary service when the
    /// primary fails after its retry and breaker budget.
    pub async fn execute(
        &self,
        user: u64,
        message: &str,
        plan: &RoutePlan,
    ) -> Result<ServiceReply, GatewayError> {
        let primary = plan.service;
        match self.call_service(user, message, primary).await {
            Ok(reply) => Ok(reply),
            Err(primary_err) => {
                let secondary = match primary {
                    ServiceKind::Conversational => ServiceKind::WebSearch,
                    ServiceKind::WebSearch => ServiceKind::Conversational,
                };
                if !self.has_service(secondary) {
                    return Err(primary_err);
                }

                warn!(
                    user,
                    primary = %primary,
                    %primary_err,
                    "primary service failed, trying secondary"
                );
                match self.call_service(user, message, secondary).await {
                    Ok(reply) => {
                        info!(user, secondary = %secondary, "secondary service recovered the request");
                        Ok(reply)
                    }
                    Err(secondary_err) => {
                        error!(
                            user,
                            %primary_err,
                            %secondary_err,
                            "both services failed"
                        );
                        Err(secondary_err)
                    }
                }
            }
        }
    }

    fn has_service(&self, kind: ServiceKind) -> bool {
        match kind {
            ServiceKind::Conversational => self.conversational.is_some(),
            ServiceKind::WebSearch => self.web_search.is_some(),
        }
    }

    fn guarded(&self, kind: ServiceKind) -> Option<&GuardedCall> {
        match kind {
            ServiceKind::Conversational => self.conversational.as_ref(),
            ServiceKind::WebSearch => self.web_search.as_ref(),
        }
    }

    async fn call_service(
        &self,
        user: u64,
        message: &str,
        kind: ServiceKind,
    ) -> Result<ServiceReply, GatewayError> {
        let Some(guarded) = self.guarded(kind) else {
            return Err(GatewayError::Config(format!(
                "no {kind} service configured"
            )));
        };

        // The conversational model gets paired history; the web model works
        // from the message alone, fresh each call.
        let history = match kind {
            ServiceKind::Conversational => self.store.summarize(user),
            ServiceKind::WebSearch => Vec::new(),
        };

        let request = CompletionRequest {
            model: self.models.model_for(kind).to_string(),
            system_prompt: self.models.system_prompt_for(kind).to_string(),
            history,
            user_message: message.to_string(),
            max_tokens: self.models.max_tokens,
        };

        let text = guarded.invoke(&request).await?;
        if text.trim().is_empty() {
            warn!(user, service = %kind, "upstream returned an empty completion");
            return Err(GatewayError::Upstream(ServiceError::server(
                "empty completion from upstream",
            )));
        }

        Ok(match kind {
            ServiceKind::Conversational => ServiceReply {
                service: kind,
                text: text.trim().to_string(),
                suppress_preview: false,
                citations: None,
            },
            ServiceKind::WebSearch => {
                let (clean_text, cites) = citations::extract_citations(&text);
                let formatted = citations::hyperlink_citations(&clean_text, &cites);
                let suppress_preview = citations::should_suppress_preview(&formatted);
                info!(
                    user,
                    chars = formatted.len(),
                    citations = cites.len(),
                    suppress_preview,
                    "web search reply processed"
                );
                ServiceReply {
                    service: kind,
                    text: formatted,
                    suppress_preview,
                    citations: (!cites.is_empty()).then_some(CitationBlock {
                        clean_text,
                        citations: cites,
                    }),
                }
            }
        })
    }
}
