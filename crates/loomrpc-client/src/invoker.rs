use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use loomrpc_common::{LoomError, Message, Result};
use tracing::{info, warn};

use crate::client::LoomClient;
use crate::correlation::{ResponseCallback, ResponseFuture};
use crate::discovery::ServiceDiscovery;
use crate::retry::{RetryNTimes, RetryPolicy};
use crate::selector::{AddressSelector, RandomSelector};

/// One logical remote call, before any transport work happens.
///
/// The payload is opaque bytes; encoding it (and decoding the response
/// payload) is the caller's concern.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub service_path: String,
    pub service_method: String,
    pub metadata: HashMap<String, String>,
    pub payload: Vec<u8>,
    /// Total attempt budget for the default retry policy.
    pub retries: u32,
    /// Per-call timeout; the client default applies when absent.
    pub timeout_ms: Option<u64>,
}

impl Invocation {
    pub fn new(service_path: impl Into<String>, service_method: impl Into<String>) -> Self {
        Self {
            service_path: service_path.into(),
            service_method: service_method.into(),
            metadata: HashMap::new(),
            payload: Vec::new(),
            retries: 1,
            timeout_ms: None,
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    fn to_message(&self) -> Message {
        let mut message = Message::new(&self.service_path, &self.service_method)
            .with_payload(self.payload.clone());
        message.metadata.extend(
            self.metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        message
    }
}

/// Client-facing call entry point: discovery, selection, transport, retry.
///
/// Each attempt re-resolves the candidate list, selects one address, builds
/// a fresh envelope (a fresh opaque id; retries never reuse ids) and runs the
/// full call. Transport failures and application-level errors are treated
/// alike: capture the cause, consult the budget, try again. Only an
/// exhausted budget surfaces the last cause to the caller.
pub struct RetryingInvoker {
    client: Arc<LoomClient>,
    discovery: Arc<dyn ServiceDiscovery>,
    selector: Box<dyn AddressSelector>,
}

impl RetryingInvoker {
    /// Creates an invoker with the original's default random selection.
    pub fn new(client: Arc<LoomClient>, discovery: Arc<dyn ServiceDiscovery>) -> Self {
        Self {
            client,
            discovery,
            selector: Box::new(RandomSelector),
        }
    }

    pub fn with_selector(mut self, selector: Box<dyn AddressSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Synchronous invocation under the invocation's own attempt budget.
    pub async fn invoke(&self, invocation: Invocation) -> Result<Message> {
        let policy = RetryNTimes::new(invocation.retries);
        self.invoke_with_policy(invocation, &policy).await
    }

    /// Synchronous invocation under an explicit retry policy.
    ///
    /// An empty discovery result on the first attempt fails fast: there is
    /// nothing to retry against. Later attempts treat it like any other
    /// failure, since the registry may repopulate between attempts.
    pub async fn invoke_with_policy(
        &self,
        invocation: Invocation,
        policy: &dyn RetryPolicy,
    ) -> Result<Message> {
        let timeout = self.call_timeout(&invocation);
        let total = policy.max_attempts().max(1);
        let mut last_err = None;

        for attempt in 1..=total {
            if attempt > 1 {
                if let Some(delay) = policy.backoff(attempt) {
                    tokio::time::sleep(delay).await;
                }
            }

            match self.attempt(&invocation, timeout).await {
                Ok(response) => {
                    info!(
                        service = %invocation.service_path,
                        method = %invocation.service_method,
                        attempt,
                        "call succeeded"
                    );
                    return Ok(response);
                }
                Err(err) => {
                    warn!(
                        service = %invocation.service_path,
                        method = %invocation.service_method,
                        attempt,
                        %err,
                        "call attempt failed"
                    );
                    if attempt == 1 && matches!(err, LoomError::NoRoute(_)) {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            LoomError::Internal("retry budget exhausted without an attempt".to_string())
        }))
    }

    /// Asynchronous invocation: one attempt, admission-gated, callback-based.
    ///
    /// Retrying a callback-style call is the caller's decision; the budget on
    /// the invocation is ignored here.
    pub async fn invoke_async(
        &self,
        invocation: Invocation,
        callback: Option<ResponseCallback>,
    ) -> Result<Arc<ResponseFuture>> {
        let timeout = self.call_timeout(&invocation);
        let addr = self.route(&invocation)?;
        self.client
            .call_async(&addr, invocation.to_message(), timeout, callback)
            .await
    }

    /// One-way invocation: selected, written, forgotten.
    pub async fn invoke_oneway(&self, invocation: Invocation) -> Result<()> {
        let addr = self.route(&invocation)?;
        self.client
            .call_oneway(&addr, invocation.to_message())
            .await
    }

    async fn attempt(&self, invocation: &Invocation, timeout: Duration) -> Result<Message> {
        let addr = self.route(invocation)?;
        let response = self
            .client
            .call(&addr, invocation.to_message(), timeout)
            .await?;

        if let Some((code, message)) = response.application_error() {
            // A successful round trip carrying a failed outcome; still
            // eligible for retry.
            return Err(LoomError::Application { code, message });
        }

        Ok(response)
    }

    fn route(&self, invocation: &Invocation) -> Result<String> {
        let candidates = self.discovery.services(&invocation.service_path);
        if candidates.is_empty() {
            warn!(
                service = %invocation.service_path,
                method = %invocation.service_method,
                "discovery returned no providers"
            );
            return Err(LoomError::NoRoute(invocation.service_path.clone()));
        }

        self.selector
            .select(
                &invocation.service_path,
                &invocation.service_method,
                &candidates,
            )
            .ok_or_else(|| LoomError::NoRoute(invocation.service_path.clone()))
    }

    fn call_timeout(&self, invocation: &Invocation) -> Duration {
        invocation
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.client.config().call_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::discovery::StaticDiscovery;

    #[tokio::test]
    async fn test_empty_discovery_fails_fast() {
        let client = Arc::new(LoomClient::new(ClientConfig::default()));
        let invoker = RetryingInvoker::new(client, Arc::new(StaticDiscovery::new()));

        let err = invoker
            .invoke(Invocation::new("Nope", "call").with_retries(5))
            .await
            .unwrap_err();

        assert!(matches!(err, LoomError::NoRoute(_)));
    }

    #[test]
    fn test_invocation_builder() {
        let invocation = Invocation::new("Arith", "mul")
            .with_payload(vec![1, 2])
            .with_metadata("trace", "t1")
            .with_retries(3)
            .with_timeout_ms(750);

        assert_eq!(invocation.retries, 3);
        assert_eq!(invocation.timeout_ms, Some(750));

        let message = invocation.to_message();
        assert_eq!(message.service_path, "Arith");
        assert_eq!(message.payload, vec![1, 2]);
        assert_eq!(message.metadata.get("trace"), Some(&"t1".to_string()));
    }
}
