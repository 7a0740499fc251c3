use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    error::UplinkError,
    gateway::{LedgerGateway, LedgerTx},
};

/// Serializes payment-channel transactions for one account.
///
/// The ledger orders an account's transactions by sequence number, so two
/// in-flight submissions for the same account would race for the same
/// sequence. The session lock is held across the whole submission; later
/// callers queue behind it instead of being rejected.
pub struct Submitter {
    gateway: Arc<dyn LedgerGateway>,
    address: String,
    secret: String,
    session: Mutex<Session>,
}

#[derive(Default)]
struct Session {
    subscribed: bool,
}

impl Submitter {
    pub fn new(gateway: Arc<dyn LedgerGateway>, address: &str, secret: &str) -> Self {
        Self {
            gateway,
            address: address.to_owned(),
            secret: secret.to_owned(),
            session: Mutex::new(Session::default()),
        }
    }

    /// Submit a claim against `channel_id`, optionally requesting closure.
    ///
    /// The first submission of a session subscribes to the account's ledger
    /// stream; the flag is only set once the subscription succeeded, so a
    /// failed attempt retries on the next call.
    pub async fn submit_claim(&self, channel_id: &str, close: bool) -> Result<(), UplinkError> {
        let mut session = self.session.lock().await;
        if !session.subscribed {
            self.gateway.subscribe(&self.address).await?;
            session.subscribed = true;
            debug!(account = %self.address, "subscribed to account stream");
        }

        self.gateway
            .submit(
                &self.address,
                &self.secret,
                LedgerTx::ChannelClaim {
                    channel_id: channel_id.to_owned(),
                    close,
                },
            )
            .await
            .map_err(|err| UplinkError::Submission {
                channel_id: channel_id.to_owned(),
                cause: err.to_string(),
            })?;
        info!(channel = channel_id, close, "channel claim submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, atomic::Ordering};

    use super::*;
    use crate::gateway::tests::MockGateway;

    fn submitter(gateway: Arc<MockGateway>) -> Submitter {
        Submitter::new(gateway, "rAlice", "shDssKGbxxpJacxpQzxs9crg9bCvK")
    }

    #[tokio::test]
    async fn subscribes_exactly_once_per_session() {
        let gateway = Arc::new(MockGateway::default());
        let submitter = submitter(gateway.clone());

        submitter.submit_claim("A1", false).await.unwrap();
        submitter.submit_claim("B2", true).await.unwrap();

        assert_eq!(gateway.subscribe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.submitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_claims_never_overlap() {
        let gateway = Arc::new(MockGateway::default());
        let submitter = Arc::new(submitter(gateway.clone()));

        let (a, b, c) = tokio::join!(
            submitter.submit_claim("A1", false),
            submitter.submit_claim("B2", false),
            submitter.submit_claim("C3", true),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        assert_eq!(gateway.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.subscribe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_subscribe_does_not_mark_the_session() {
        // A gateway whose subscribe always fails keeps the session
        // unsubscribed; the error carries through as a gateway error.
        struct FailingSubscribe(MockGateway);

        #[async_trait::async_trait]
        impl crate::gateway::LedgerGateway for FailingSubscribe {
            async fn connect(&self) -> Result<(), crate::gateway::GatewayError> {
                self.0.connect().await
            }
            async fn account_info(
                &self,
                address: &str,
            ) -> Result<crate::gateway::AccountInfo, crate::gateway::GatewayError> {
                self.0.account_info(address).await
            }
            async fn server_info(
                &self,
            ) -> Result<crate::gateway::ReserveInfo, crate::gateway::GatewayError> {
                self.0.server_info().await
            }
            async fn channels(
                &self,
                address: &str,
            ) -> Result<Vec<crate::gateway::Channel>, crate::gateway::GatewayError> {
                self.0.channels(address).await
            }
            async fn subscribe(&self, _address: &str) -> Result<(), crate::gateway::GatewayError> {
                Err(crate::gateway::GatewayError::Rpc("noNetwork".to_owned()))
            }
            async fn submit(
                &self,
                account: &str,
                secret: &str,
                tx: LedgerTx,
            ) -> Result<(), crate::gateway::GatewayError> {
                self.0.submit(account, secret, tx).await
            }
            async fn derive_address(
                &self,
                secret: &str,
            ) -> Result<String, crate::gateway::GatewayError> {
                self.0.derive_address(secret).await
            }
            fn endpoint(&self) -> &str {
                self.0.endpoint()
            }
        }

        let gateway = Arc::new(FailingSubscribe(MockGateway::default()));
        let submitter = Submitter::new(gateway.clone(), "rAlice", "seed");

        assert!(matches!(
            submitter.submit_claim("A1", false).await,
            Err(UplinkError::Gateway(_))
        ));
        // Nothing was submitted while unsubscribed.
        assert!(gateway.0.submitted.lock().unwrap().is_empty());
    }
}
