//! RDS backend client for linking Discord accounts

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use tracing::{debug, info};

use super::types::{BackendOutcome, SignedAssertion, UniqueToken, VerificationRequest};
use crate::config::BridgeConfig;
use crate::error::{Result, VerifyError};

pub const DISCORD_AVATAR_BASE_URL: &str = "https://cdn.discordapp.com/avatars";
pub const SERVICE_HEADER: &str = "Service-Name";
const ACCOUNT_TYPE: &str = "discord";
const ATTRIBUTES_VALIDITY_SECS: i64 = 2;

#[derive(Debug, Serialize)]
struct LinkAccountBody<'a> {
    #[serde(rename = "type")]
    account_type: &'static str,
    token: &'a str,
    attributes: LinkAccountAttributes<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkAccountAttributes<'a> {
    discord_id: &'a str,
    user_avatar: String,
    user_name: &'a str,
    discriminator: &'a str,
    discord_joined_at: &'a str,
    expiry: i64,
}

pub fn avatar_url(user_id: &str, avatar_hash: &str) -> String {
    format!("{}/{}/{}.jpg", DISCORD_AVATAR_BASE_URL, user_id, avatar_hash)
}

/// Anything that can submit a token-linking request to the backend
#[async_trait]
pub trait AccountLinker: Send + Sync {
    async fn link_account(
        &self,
        request: &VerificationRequest,
        token: &UniqueToken,
        assertion: &SignedAssertion,
    ) -> Result<BackendOutcome>;
}

/// Issues the token-linking request; never retries on its own
#[derive(Clone)]
pub struct BackendClient {
    http_client: reqwest::Client,
    external_accounts_url: String,
    service_name: String,
}

impl BackendClient {
    pub fn new(
        external_accounts_url: impl Into<String>,
        service_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| VerifyError::HttpClient { source })?;

        Ok(Self {
            http_client,
            external_accounts_url: external_accounts_url.into(),
            service_name: service_name.into(),
        })
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        Self::new(
            config.external_accounts_url(),
            config.service_name.clone(),
            config.backend_timeout,
        )
    }
}

#[async_trait]
impl AccountLinker for BackendClient {
    async fn link_account(
        &self,
        request: &VerificationRequest,
        token: &UniqueToken,
        assertion: &SignedAssertion,
    ) -> Result<BackendOutcome> {
        let body = LinkAccountBody {
            account_type: ACCOUNT_TYPE,
            token: token.as_str(),
            attributes: LinkAccountAttributes {
                discord_id: &request.user_id,
                user_avatar: avatar_url(&request.user_id, &request.avatar_hash),
                user_name: &request.user_name,
                discriminator: &request.discriminator,
                discord_joined_at: &request.joined_at,
                expiry: chrono::Utc::now().timestamp() + ATTRIBUTES_VALIDITY_SECS,
            },
        };

        let http_request = self
            .http_client
            .post(&self.external_accounts_url)
            .header(AUTHORIZATION, assertion.bearer())
            .header(CONTENT_TYPE, "application/json")
            .header(SERVICE_HEADER, &self.service_name)
            .json(&body)
            .build()
            .map_err(|source| VerifyError::RequestBuild { source })?;

        debug!(
            "Linking Discord account {} via {}",
            request.user_id, self.external_accounts_url
        );

        let response = self
            .http_client
            .execute(http_request)
            .await
            .map_err(|source| VerifyError::Transport { source })?;

        let status = response.status();
        let outcome = BackendOutcome::from_status(status.as_u16());
        match outcome {
            BackendOutcome::Created => {
                info!("RDS backend accepted token for Discord user {}", request.user_id)
            }
            BackendOutcome::Conflict { .. } => {
                let text = response.text().await.unwrap_or_default();
                info!(
                    "RDS backend rejected token for Discord user {}: {} - {}",
                    request.user_id, status, text
                );
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::verification::signer::tests::TEST_KEY_PEM;
    use crate::verification::signer::ServiceSigner;
    use httpmock::prelude::*;

    pub(crate) fn sample_request() -> VerificationRequest {
        VerificationRequest {
            user_id: "123".to_string(),
            user_name: "ankush".to_string(),
            discriminator: "0".to_string(),
            avatar_hash: "a1b2c3".to_string(),
            joined_at: "2024-01-01T00:00:00Z".to_string(),
            channel_id: "456".to_string(),
            interaction_token: "interaction-token".to_string(),
            application_id: "789".to_string(),
        }
    }

    fn assertion() -> SignedAssertion {
        ServiceSigner::from_pem(TEST_KEY_PEM, "discord-service")
            .unwrap()
            .sign_service_assertion()
            .unwrap()
    }

    fn client(url: String) -> BackendClient {
        BackendClient::new(url, "discord-service", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_avatar_url() {
        assert_eq!(
            avatar_url("123", "a1b2c3"),
            "https://cdn.discordapp.com/avatars/123/a1b2c3.jpg"
        );
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(BackendOutcome::from_status(200), BackendOutcome::Created);
        assert_eq!(BackendOutcome::from_status(201), BackendOutcome::Created);
        assert_eq!(
            BackendOutcome::from_status(409),
            BackendOutcome::Conflict { status: 409 }
        );
        assert_eq!(
            BackendOutcome::from_status(500),
            BackendOutcome::Conflict { status: 500 }
        );
    }

    #[tokio::test]
    async fn test_link_account_sends_expected_request() {
        let server = MockServer::start_async().await;
        let assertion = assertion();
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/external-accounts")
                    .header("authorization", assertion.bearer())
                    .header("content-type", "application/json")
                    .header("service-name", "discord-service")
                    .json_body_partial(
                        r#"{
                            "type": "discord",
                            "token": "the-token",
                            "attributes": {
                                "discordId": "123",
                                "userAvatar": "https://cdn.discordapp.com/avatars/123/a1b2c3.jpg",
                                "userName": "ankush",
                                "discriminator": "0",
                                "discordJoinedAt": "2024-01-01T00:00:00Z"
                            }
                        }"#,
                    );
                then.status(201);
            })
            .await;

        let outcome = client(server.url("/external-accounts"))
            .link_account(&sample_request(), &UniqueToken::new("the-token"), &assertion)
            .await
            .unwrap();

        assert_eq!(outcome, BackendOutcome::Created);
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_link_account_conflict() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/external-accounts");
                then.status(409).body("token already linked");
            })
            .await;

        let outcome = client(server.url("/external-accounts"))
            .link_account(&sample_request(), &UniqueToken::new("t"), &assertion())
            .await
            .unwrap();

        assert_eq!(outcome, BackendOutcome::Conflict { status: 409 });
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let err = client("http://127.0.0.1:1/external-accounts".to_string())
            .link_account(&sample_request(), &UniqueToken::new("t"), &assertion())
            .await
            .unwrap_err();

        assert!(matches!(err, VerifyError::Transport { .. }));
        assert!(err
            .to_string()
            .contains("error sending request to RDS Backend API"));
        // Nothing reached the backend, so the request may be sent again
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_timeout_is_not_retryable() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/external-accounts");
                then.status(201).delay(Duration::from_millis(1500));
            })
            .await;

        let err = BackendClient::new(
            server.url("/external-accounts"),
            "discord-service",
            Duration::from_secs(1),
        )
        .unwrap()
        .link_account(&sample_request(), &UniqueToken::new("t"), &assertion())
        .await
        .unwrap_err();

        assert!(matches!(err, VerifyError::Transport { .. }));
        assert!(!err.is_retryable());
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_malformed_url_is_request_build_error() {
        let err = client("http://localhost:1234\x7f/external-accounts".to_string())
            .link_account(&sample_request(), &UniqueToken::new("t"), &assertion())
            .await
            .unwrap_err();

        assert!(matches!(err, VerifyError::RequestBuild { .. }));
        assert!(err.to_string().contains("error creating http request"));
        assert!(!err.is_retryable());
    }
}
