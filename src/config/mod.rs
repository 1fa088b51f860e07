pub mod bridge;

pub use bridge::{BridgeConfig, SharedBridgeConfig, MAX_WORKERS};
