// src/messages.rs
use crate::verification::{BackendOutcome, UniqueToken};

pub const PROCESSING_MESSAGE: &str = "Your request is being processed.";

pub const VERIFICATION_FAILED_MESSAGE: &str =
    "Something went wrong while generating verification link";

pub fn verification_link(main_site_url: &str, token: &UniqueToken) -> String {
    format!(
        "{}/discord?token={}",
        main_site_url,
        urlencoding::encode(token.as_str())
    )
}

pub fn verification_message(main_site_url: &str, token: &UniqueToken) -> String {
    format!(
        "🔗 **Link your Discord account**\n\
        Open the link below and log in to finish verification:\n\
        {}\n\n\
        **Note:** This link works only once. Run `/verify` again if it stops working.",
        verification_link(main_site_url, token)
    )
}

/// Text shown to the user for a backend outcome; only a created link carries the token
pub fn compose_message(
    outcome: Option<BackendOutcome>,
    main_site_url: &str,
    token: &UniqueToken,
) -> String {
    match outcome {
        Some(BackendOutcome::Created) => verification_message(main_site_url, token),
        _ => VERIFICATION_FAILED_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_message_contains_link_and_token() {
        let token = UniqueToken::new("abcDEF123_-abcDEF123_-abcDEF123_-abc");
        let message = compose_message(
            Some(BackendOutcome::Created),
            "http://localhost:4200",
            &token,
        );

        assert!(message.contains("http://localhost:4200/discord?token="));
        assert!(message.contains(token.as_str()));
    }

    #[test]
    fn test_other_outcomes_never_leak_token() {
        let token = UniqueToken::new("secret-token-value");

        for outcome in [None, Some(BackendOutcome::Conflict { status: 409 })] {
            let message = compose_message(outcome, "http://localhost:4200", &token);
            assert_eq!(message, VERIFICATION_FAILED_MESSAGE);
            assert!(!message.contains(token.as_str()));
        }
    }
}
