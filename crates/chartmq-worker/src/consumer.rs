//! Consumption loops
//!
//! One loop per queue. Deliveries are handled one at a time and settled only
//! after the handler returns, so a crash mid-message leads to redelivery.
//! A failed settle is logged and the loop moves on; the broker redelivers
//! the message once the channel closes. An error from the delivery stream
//! ends the loop and the worker's supervisor stops the other queues.

use futures::StreamExt;
use lapin::Consumer;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions, BasicRejectOptions};
use std::sync::Arc;
use tokio::sync::watch;

use crate::dispatcher::{Disposition, Dispatcher};
use crate::error::Result;
use crate::topology::QueueKind;

/// Consume `kind` deliveries until shutdown or the stream ends
pub async fn consume(
    mut consumer: Consumer,
    kind: QueueKind,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    tracing::info!(queue = %kind, "consumer started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let delivery = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            next = consumer.next() => match next {
                Some(delivery) => delivery?,
                None => {
                    tracing::warn!(queue = %kind, "delivery stream closed");
                    break;
                }
            },
        };

        let disposition = dispatcher.dispatch(kind, &delivery.data).await;
        if let Err(e) = settle(&delivery, disposition).await {
            tracing::error!(
                queue = %kind,
                delivery_tag = delivery.delivery_tag,
                ?disposition,
                error = %e,
                "failed to settle delivery"
            );
        }
    }

    tracing::info!(queue = %kind, "consumer stopped");
    Ok(())
}

async fn settle(delivery: &Delivery, disposition: Disposition) -> Result<()> {
    match disposition {
        Disposition::Ack => delivery.acker.ack(BasicAckOptions::default()).await?,
        Disposition::Reject => {
            delivery
                .acker
                .reject(BasicRejectOptions { requeue: false })
                .await?
        }
        Disposition::Requeue => {
            delivery
                .acker
                .nack(BasicNackOptions {
                    requeue: true,
                    ..BasicNackOptions::default()
                })
                .await?
        }
    }
    Ok(())
}
