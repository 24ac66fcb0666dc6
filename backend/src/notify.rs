use async_trait::async_trait;
use tracing::info;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Tells one giver who they are buying for. Failures are reported back to the
/// caller as-is; nothing is retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, address: &str, giver: &str, receiver: &str)
        -> Result<(), DeliveryError>;
}

/// Simulated email delivery: validates the address and logs the send.
/// The receiver's name is never written to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(
        &self,
        address: &str,
        giver: &str,
        _receiver: &str,
    ) -> Result<(), DeliveryError> {
        let address = validate_address(address)?;
        info!(to = %address, giver, "assignment delivered");
        Ok(())
    }
}

fn validate_address(address: &str) -> Result<&str, DeliveryError> {
    let address = address.trim();
    let invalid = || DeliveryError::InvalidAddress(address.to_string());

    if address.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = address.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels_ok = domain.split('.').count() >= 2 && domain.split('.').all(|l| !l.is_empty());
    if !labels_ok {
        return Err(invalid());
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_plain_addresses() {
        let notifier = LogNotifier;
        assert!(notifier
            .deliver(" alice@example.com ", "Alice", "Bob")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn rejects_malformed_addresses() {
        let notifier = LogNotifier;
        for bad in ["", "alice", "@example.com", "a@b", "a@@b.com", "a b@c.com", "a@b..com"] {
            assert!(
                matches!(
                    notifier.deliver(bad, "Alice", "Bob").await,
                    Err(DeliveryError::InvalidAddress(_))
                ),
                "{bad:?} accepted"
            );
        }
    }
}
