//! Queue transport and verification workers
//!
//! The queue is an opaque byte channel; each payload is a JSON [`DataPacket`].
//! Every decoded request runs to completion on its own task, with at most
//! `workers` requests in flight.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use super::packet::DataPacket;
use crate::config::MAX_WORKERS;
use crate::error::{Result, VerifyError};
use crate::verification::{VerificationOrchestrator, VerificationRequest};

pub type QueueReceiver = mpsc::Receiver<Vec<u8>>;

/// Anything that can take a verification request to completion
#[async_trait]
pub trait VerificationProcessor: Send + Sync + 'static {
    async fn process(&self, request: VerificationRequest) -> Result<()>;
}

#[async_trait]
impl VerificationProcessor for VerificationOrchestrator {
    async fn process(&self, request: VerificationRequest) -> Result<()> {
        self.process_verification(request).await
    }
}

/// Sending half of the verification queue
#[derive(Clone)]
pub struct VerificationQueue {
    tx: mpsc::Sender<Vec<u8>>,
}

impl VerificationQueue {
    pub async fn send(&self, packet: &DataPacket) -> Result<()> {
        let payload = packet.encode()?;
        self.tx
            .send(payload)
            .await
            .map_err(|_| VerifyError::QueueClosed)?;
        debug!("Queued packet {} for user {}", packet.id, packet.user_id);
        Ok(())
    }
}

pub fn create_queue(capacity: usize) -> (VerificationQueue, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (VerificationQueue { tx }, rx)
}

/// Consume the queue until every sender is dropped, then wait for in-flight work
pub async fn run_consumer<P>(mut receiver: QueueReceiver, processor: Arc<P>, workers: usize)
where
    P: VerificationProcessor + ?Sized,
{
    if workers > MAX_WORKERS {
        warn!("Capping {} requested workers at {}", workers, MAX_WORKERS);
    }
    let workers = workers.clamp(1, MAX_WORKERS);
    let permits = Arc::new(Semaphore::new(workers));
    info!("Verification consumer started with {} workers", workers);

    while let Some(payload) = receiver.recv().await {
        let packet = match DataPacket::decode(&payload) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Dropping undecodable packet: {}", e);
                continue;
            }
        };
        let packet_id = packet.id;

        let request = match VerificationRequest::try_from(packet) {
            Ok(request) => request,
            Err(e) => {
                warn!("Dropping packet {}: {}", packet_id, e);
                continue;
            }
        };

        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let processor = processor.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let user_id = request.user_id.clone();
            match processor.process(request).await {
                Ok(()) => debug!("Packet {} processed for user {}", packet_id, user_id),
                Err(e) => error!(
                    "Verification failed at {} stage (packet {}, user {}): {}",
                    e.stage(),
                    packet_id,
                    user_id,
                    e
                ),
            }
        });
    }

    // Every permit back means every spawned worker has finished
    match u32::try_from(workers) {
        Ok(all) => match permits.acquire_many(all).await {
            Ok(_) => info!("Verification consumer stopped"),
            Err(e) => error!("Could not wait for in-flight verifications: {}", e),
        },
        Err(e) => error!("Could not wait for {} in-flight verifications: {}", workers, e),
    }
}
