pub mod consumer;
pub mod packet;

pub use consumer::{create_queue, run_consumer, QueueReceiver, VerificationProcessor, VerificationQueue};
pub use packet::DataPacket;
