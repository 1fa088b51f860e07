use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::backend::{AccountLinker, BackendClient};
use super::notifier::{DiscordSessionFactory, Notifier};
use super::retry::retry_with_backoff_if;
use super::signer::ServiceSigner;
use super::token::{OsRngTokenSource, TokenSource};
use super::types::*;
use crate::config::SharedBridgeConfig;
use crate::error::{Result, VerifyError};
use crate::messages::compose_message;

/// Runs one verification from token issuance to the edited Discord reply
pub struct VerificationOrchestrator {
    config: SharedBridgeConfig,
    tokens: Arc<dyn TokenSource>,
    backend: Arc<dyn AccountLinker>,
    notifier: Notifier,
}

impl VerificationOrchestrator {
    pub fn new(
        config: SharedBridgeConfig,
        tokens: Arc<dyn TokenSource>,
        backend: Arc<dyn AccountLinker>,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            tokens,
            backend,
            notifier,
        }
    }

    /// Wire the production collaborators from config
    pub fn from_config(config: SharedBridgeConfig) -> Result<Self> {
        let backend = Arc::new(BackendClient::from_config(&config)?);
        let notifier = Notifier::new(Arc::new(DiscordSessionFactory::new(
            config.bot_token.clone(),
        )));
        Ok(Self::new(config, Arc::new(OsRngTokenSource), backend, notifier))
    }

    /// Generate a token, link it with the backend and report back to the user.
    ///
    /// Credential setup failures (token, key, first signature) return before any
    /// network call and leave the deferred reply untouched. Once the backend has
    /// been tried the user is always notified, and a backend error is returned
    /// after the notification.
    pub async fn process_verification(&self, request: VerificationRequest) -> Result<()> {
        debug!("Processing verification for user {}", request.user_id);

        let token = self.tokens.generate()?;
        debug!("Generated unique token for user {}", request.user_id);

        let signer = ServiceSigner::from_pem(&self.config.bot_private_key, &self.config.service_name)?;
        let assertion = signer.sign_service_assertion()?;
        debug!("Signed service assertion for user {}", request.user_id);

        let linked = self.link_account(&request, &token, &signer, assertion).await;

        let message = compose_message(
            linked.as_ref().ok().copied(),
            &self.config.main_site_url,
            &token,
        );
        let notified = self
            .notifier
            .notify(&request.application_id, &request.interaction_token, &message)
            .await;

        match (linked, notified) {
            (Ok(outcome), Ok(())) => {
                info!(
                    "Verification for user {} finished with {:?}",
                    request.user_id, outcome
                );
                Ok(())
            }
            (Ok(_), Err(notify_err)) => Err(notify_err),
            (Err(backend_err), Ok(())) => {
                warn!(
                    "Notified user {} of failed verification: {}",
                    request.user_id, backend_err
                );
                Err(backend_err)
            }
            (Err(backend_err), Err(notify_err)) => {
                error!(
                    "Could not notify user {} of failed verification: {}",
                    request.user_id, notify_err
                );
                Err(backend_err)
            }
        }
    }

    // Only requests that never reached the backend are sent again: the token is
    // single-use, so a replay after a timeout would turn a stored link into a
    // conflict.
    async fn link_account(
        &self,
        request: &VerificationRequest,
        token: &UniqueToken,
        signer: &ServiceSigner,
        first_assertion: SignedAssertion,
    ) -> Result<BackendOutcome> {
        let mut presigned = Some(first_assertion);

        retry_with_backoff_if(
            self.config.max_retries,
            self.config.retry_base_delay,
            || self.attempt_link(request, token, signer, presigned.take()),
            VerifyError::is_retryable,
        )
        .await
    }

    // Every attempt after the first signs a fresh assertion so a retried call
    // never carries an expired credential.
    async fn attempt_link(
        &self,
        request: &VerificationRequest,
        token: &UniqueToken,
        signer: &ServiceSigner,
        presigned: Option<SignedAssertion>,
    ) -> Result<BackendOutcome> {
        let assertion = match presigned {
            Some(assertion) => assertion,
            None => signer.sign_service_assertion()?,
        };
        self.backend.link_account(request, token, &assertion).await
    }
}

/// Shared orchestrator type
pub type SharedVerificationOrchestrator = Arc<VerificationOrchestrator>;

pub fn create_shared_orchestrator(
    config: SharedBridgeConfig,
) -> Result<SharedVerificationOrchestrator> {
    Ok(Arc::new(VerificationOrchestrator::from_config(config)?))
}
