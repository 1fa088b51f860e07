//! Asynchronous verification pipeline
//!
//! token → signed assertion → backend link → composed message → edited reply

pub mod backend;
pub mod notifier;
pub mod orchestrator;
pub mod retry;
pub mod signer;
pub mod token;
pub mod types;

pub use backend::{AccountLinker, BackendClient};
pub use notifier::{DiscordSessionFactory, Notifier, Session, SessionFactory};
pub use orchestrator::{
    create_shared_orchestrator, SharedVerificationOrchestrator, VerificationOrchestrator,
};
pub use retry::{retry_with_backoff, retry_with_backoff_if, with_retry};
pub use signer::ServiceSigner;
pub use token::{OsRngTokenSource, TokenSource};
pub use types::{AssertionClaims, BackendOutcome, SignedAssertion, UniqueToken, VerificationRequest};
