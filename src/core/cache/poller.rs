use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Query;

/// Refetch `query` on its policy interval until `cancel` fires.
///
/// The first fetch happens immediately. On-demand queries are fetched once
/// and the task then just waits for cancellation.
pub fn spawn_poller<T>(query: Arc<Query<T>>, cancel: CancellationToken) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let Some(period) = query.policy().refetch_interval else {
            query.refetch().await;
            cancel.cancelled().await;
            return;
        };

        info!(key = %query.key(), ?period, "poller started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(key = %query.key(), "poller stopping");
                    break;
                }
                _ = ticker.tick() => {
                    query.refetch().await;
                }
            }
        }
    })
}
