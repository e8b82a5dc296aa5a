use async_trait::async_trait;

/// Delivery failure reported by a [`Forward`] implementation.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ForwardError(pub String);

/// Delivery hook invoked when a transaction completes.
///
/// The envelope fields arrive exactly as the client sent them. An `Err`
/// makes the session answer `550 Failed to relay email`; the transaction
/// is cleared either way.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(
        &self,
        mail_from: &str,
        rcpt_to: &str,
        body: &str,
    ) -> Result<(), ForwardError>;
}
