use super::breaker::CircuitBreaker;
use super::retry::RetryPolicy;
use crate::error::GatewayError;
use crate::services::{ChatService, CompletionRequest};
use std::sync::Arc;

/// One upstream service bundled with its resilience policies.
///
/// Built once per service at wiring time and invoked uniformly afterwards:
/// no closures or decorators, just a value that knows how to make a guarded
/// call. The breaker sits outside the retry loop, so one exhausted retry
/// sequence counts as one breaker failure.
pub struct GuardedCall {
    service: Arc<dyn ChatService>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl GuardedCall {
    pub fn new(service: Arc<dyn ChatService>, breaker: Arc<CircuitBreaker>, retry: RetryPolicy) -> Self {
        Self {
            service,
            breaker,
            retry,
        }
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run one completion through retry and breaker policies.
    pub async fn invoke(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        let service = &self.service;
        let retry = &self.retry;
        self.breaker
            .wrap(|| async move {
                retry
                    .run(|| async move {
                        service
                            .complete(request)
                            .await
                            .map_err(GatewayError::from)
                    })
                    .await
            })
            .await
    }
}
