//! The `CompletionClient` trait -- the seam between plan orchestration and
//! whichever provider produces the model text.

use async_trait::async_trait;

use super::{CompletionRequest, UpstreamError};

/// Produces raw model text for a prompt.
///
/// Implementations make exactly one provider call per invocation: no
/// retries and no caching. The returned text is handed to the normalizer
/// verbatim.
///
/// # Object Safety
///
/// The orchestrator stores an `Arc<dyn CompletionClient>`, so the trait must
/// stay object-safe.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, UpstreamError>;
}

// Compile-time assertion: CompletionClient must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn CompletionClient) {}
};
