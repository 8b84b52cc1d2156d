use crate::{Event, ItemResult, Observer};
use tokio::sync::mpsc;

/// Outcome counts gathered by the collector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Tally {
    /// Results without an error.
    pub(crate) processed: u64,
    /// Results carrying an [`ItemError`](crate::ItemError).
    pub(crate) errored: u64,
}

/// Fan-in: drains the result queue until it is closed.
///
/// Failed items are reported and counted without stopping the drain. The
/// collector only owns the receiving half; it never closes the queue, it
/// simply runs until every sender is gone.
pub(crate) async fn collect<O: Observer + ?Sized>(
    mut results: mpsc::Receiver<ItemResult>,
    observer: &O,
) -> Tally {
    let mut tally = Tally::default();

    while let Some(result) = results.recv().await {
        match &result.error {
            Some(error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("ERR: id={} err={error}", result.id);
                observer.on_event(&Event::ItemFailed {
                    id: result.id,
                    error,
                });
                tally.errored += 1;
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!("OK:  id={:02} msg={}", result.id, result.outcome);
                observer.on_event(&Event::ItemSucceeded {
                    id: result.id,
                    outcome: &result.outcome,
                });
                tally.processed += 1;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::info!("done. processed={} errored={}", tally.processed, tally.errored);

    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ItemError, NoopObserver};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Seen(Mutex<Vec<(u64, bool)>>);

    impl Observer for Seen {
        fn on_event(&self, event: &Event<'_>) {
            match *event {
                Event::ItemSucceeded { id, .. } => self.0.lock().push((id, true)),
                Event::ItemFailed { id, .. } => self.0.lock().push((id, false)),
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn tallies_successes_and_failures_until_closed() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(ItemResult::success(0, "a".into())).await.unwrap();
        tx.send(ItemResult::failure(
            1,
            ItemError::Failed {
                reason: "boom".into(),
            },
        ))
        .await
        .unwrap();
        tx.send(ItemResult::success(2, "c".into())).await.unwrap();
        drop(tx);

        let seen = Seen::default();
        let tally = collect(rx, &seen).await;

        assert_eq!(
            tally,
            Tally {
                processed: 2,
                errored: 1
            }
        );
        assert_eq!(*seen.0.lock(), vec![(0, true), (1, false), (2, true)]);
    }

    #[tokio::test]
    async fn closed_empty_queue_yields_zero() {
        let (tx, rx) = mpsc::channel::<ItemResult>(1);
        drop(tx);
        assert_eq!(collect(rx, &NoopObserver).await, Tally::default());
    }
}
