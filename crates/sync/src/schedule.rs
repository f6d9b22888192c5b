//! Periodic sync runs.

use crate::Synchronizer;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run `sync` immediately, then every `interval`, until `cancel` fires.
///
/// Runs never overlap: a run that takes longer than `interval` pushes the
/// next one back. A failed run is logged and the schedule carries on.
pub async fn run_periodically(sync: &Synchronizer, interval: Duration, cancel: &CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {},
        }
        match sync.run(cancel).await {
            Ok(report) => {
                for (source, manga, kind) in report.failures() {
                    warn!(source, manga, kind = %kind, "sync failure");
                }
                info!(state = %report.state, updates = report.updates(), "periodic sync finished");
            },
            Err(err) => warn!(error = ?err, "periodic sync failed"),
        }
    }
    info!("periodic sync stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncOptions;
    use hondana_extension::CapabilityHandle;
    use hondana_extension::capability::{ScriptedSource, StaticResolver};
    use hondana_graph::Database;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_until_cancelled() {
        let db = Database::connect_in_memory().await.unwrap();
        let source: CapabilityHandle = ScriptedSource::new("alpha");
        let sync = Arc::new(Synchronizer::new(db.repository(), Arc::new(StaticResolver::with_sources([source])), SyncOptions::default()));
        let mut states = sync.subscribe();
        let cancel = CancellationToken::new();

        let schedule = tokio::spawn({
            let sync = sync.clone();
            let cancel = cancel.clone();
            async move { run_periodically(&sync, Duration::from_millis(10), &cancel).await }
        });
        for _ in 0..2 {
            states.changed().await.unwrap();
            states.wait_for(|state| *state == crate::RunState::Completed).await.unwrap();
            states.mark_unchanged();
        }
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), schedule).await.unwrap().unwrap();
    }
}
