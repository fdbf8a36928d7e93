//! Periodic idle polling for a focused document.
//!
//! Each focus session gets one tokio task that calls
//! [`AutoStops::tick`] every `poll_interval` until the tick reports the
//! session is over. The task only holds a weak reference to the engine, so
//! dropping the engine also ends every chain.

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::app::{AutoStops, TickOutcome};
use crate::host::DocumentId;
use crate::model::activity::PollToken;

/// A running polling chain
#[derive(Debug)]
pub struct PollerHandle {
    token: PollToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn token(&self) -> PollToken {
        self.token
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the chain without waiting for its next tick
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Start polling `doc` for the focus session identified by `token`
pub fn spawn(
    runtime: &Handle,
    engine: Weak<AutoStops>,
    doc: DocumentId,
    token: PollToken,
    period: Duration,
) -> PollerHandle {
    let task = runtime.spawn(async move {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        timer.tick().await;

        loop {
            timer.tick().await;

            let Some(engine) = engine.upgrade() else {
                break;
            };
            if engine.tick(doc, token) == TickOutcome::Finished {
                break;
            }
        }
        tracing::trace!("{doc}: polling chain {token:?} ended");
    });

    PollerHandle { token, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::host::MemoryHost;
    use crate::model::stop::StopRange;
    use crate::services::time_source::ManualTimeSource;
    use std::sync::Arc;

    const DOC: DocumentId = DocumentId(1);
    const PERIOD: Duration = Duration::from_millis(10);

    fn engine(host: &Arc<MemoryHost>, time: &Arc<ManualTimeSource>) -> Arc<AutoStops> {
        let config = Config {
            poll_interval_ms: 10,
            ..Config::default()
        };
        Arc::new(AutoStops::new(host.clone(), config, time.clone()))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            tokio::time::sleep(PERIOD).await;
        }
        condition()
    }

    #[tokio::test]
    async fn test_polling_records_idle_caret() {
        let host = MemoryHost::shared();
        host.open(DOC, "hello world");
        host.focus(DOC);
        let time = ManualTimeSource::shared();
        let engine = engine(&host, &time);

        engine.start_polling(DOC);
        host.select(DOC, &[StopRange::caret(6)]);
        time.advance(Duration::from_secs(3));

        let recorded = wait_until(|| match engine.context(DOC) {
            Some(context) => {
                let state = context.lock_state();
                state.stops.contains(StopRange::caret(6))
            }
            None => false,
        })
        .await;
        assert!(recorded);
    }

    #[tokio::test]
    async fn test_stale_token_ends_the_chain() {
        let host = MemoryHost::shared();
        host.open(DOC, "text");
        host.focus(DOC);
        let time = ManualTimeSource::shared();
        let engine = engine(&host, &time);

        let stale = engine.on_activated(DOC);
        let handle = spawn(&Handle::current(), Arc::downgrade(&engine), DOC, stale, PERIOD);
        engine.on_activated(DOC);

        assert!(wait_until(|| handle.is_finished()).await);
        assert_eq!(handle.token(), stale);
    }

    #[tokio::test]
    async fn test_dropped_engine_ends_the_chain() {
        let host = MemoryHost::shared();
        host.open(DOC, "text");
        host.focus(DOC);
        let time = ManualTimeSource::shared();
        let engine = engine(&host, &time);

        let token = engine.on_activated(DOC);
        let handle = spawn(&Handle::current(), Arc::downgrade(&engine), DOC, token, PERIOD);
        drop(engine);

        assert!(wait_until(|| handle.is_finished()).await);
    }

    #[tokio::test]
    async fn test_abort_stops_a_live_chain() {
        let host = MemoryHost::shared();
        host.open(DOC, "text");
        host.focus(DOC);
        let time = ManualTimeSource::shared();
        let engine = engine(&host, &time);

        let token = engine.on_activated(DOC);
        let handle = spawn(&Handle::current(), Arc::downgrade(&engine), DOC, token, PERIOD);
        tokio::time::sleep(PERIOD * 3).await;
        assert!(!handle.is_finished());

        handle.abort();
        assert!(wait_until(|| handle.is_finished()).await);
    }

    #[tokio::test]
    async fn test_closing_stops_recording() {
        let host = MemoryHost::shared();
        host.open(DOC, "hello world");
        host.focus(DOC);
        let time = ManualTimeSource::shared();
        let engine = engine(&host, &time);

        engine.start_polling(DOC);
        engine.on_close(DOC);
        host.select(DOC, &[StopRange::caret(2)]);
        time.advance(Duration::from_secs(3));
        tokio::time::sleep(PERIOD * 5).await;

        assert!(engine.context(DOC).is_none());
        assert_eq!(host.persisted(DOC, crate::model::stop::STOPS_KEY), None);
    }
}
