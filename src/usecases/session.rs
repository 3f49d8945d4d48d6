//! Feed Session - Scheduled Refresh Lifecycle
//!
//! Owns the single scheduled task that drives a `PriceFeed`. The task
//! runs in exactly one mode at a time, recomputed whenever the wallet
//! connection changes:
//! - `Polling`: provider refresh every poll interval, first tick immediately
//! - `Synthetic`: synthetic animation every synthetic interval
//! - `Paused`: no ticks
//!
//! Manual refreshes are funneled through the same task so every append
//! is sequential. `stop()` tears the feed down before cancelling the
//! task, so a fetch still in flight cannot write into a dead session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::price_feed::{PriceFeed, RefreshReport};
use crate::config::FeedConfig;

/// Which timer, if any, is driving the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
  /// Wallet connected: poll providers.
  Polling,
  /// Wallet disconnected and no live credential: animate synthetic data.
  Synthetic,
  /// Wallet disconnected with a live credential configured: idle.
  Paused,
}

impl FeedMode {
  /// Mode for a wallet state and credential configuration.
  pub fn select(connected: bool, live_credentials: bool) -> Self {
    if connected {
      Self::Polling
    } else if live_credentials {
      Self::Paused
    } else {
      Self::Synthetic
    }
  }
}

/// Tick cadences.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
  /// Provider refresh cadence.
  pub poll_interval: Duration,
  /// Synthetic animation cadence.
  pub synthetic_interval: Duration,
}

impl ScheduleConfig {
  pub fn from_config(config: &FeedConfig) -> Self {
    Self {
      poll_interval: Duration::from_millis(config.poll_interval_ms),
      synthetic_interval: Duration::from_millis(config.synthetic_interval_ms),
    }
  }

  /// Fresh interval for `mode`. Polling fires immediately, the others
  /// wait one period first.
  fn ticker(&self, mode: FeedMode) -> Interval {
    let mut ticker = match mode {
      FeedMode::Polling => tokio::time::interval(self.poll_interval),
      FeedMode::Synthetic => tokio::time::interval_at(
        Instant::now() + self.synthetic_interval,
        self.synthetic_interval,
      ),
      FeedMode::Paused => tokio::time::interval_at(
        Instant::now() + self.poll_interval,
        self.poll_interval,
      ),
    };
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
  }
}

type RefreshReply = oneshot::Sender<RefreshReport>;

/// Cloneable handle for manual refreshes (e.g. an export button).
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
  tx: mpsc::Sender<RefreshReply>,
}

impl RefreshTrigger {
  /// Ask the session for a refresh and wait for its report.
  pub async fn refresh(&self) -> Result<RefreshReport> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .tx
      .send(reply_tx)
      .await
      .map_err(|_| anyhow::anyhow!("Feed session is stopped"))?;
    reply_rx.await.context("Feed session dropped the refresh request")
  }
}

/// A running feed session.
pub struct FeedSession {
  /// Feed driven by this session.
  feed: Arc<PriceFeed>,
  /// Manual refresh handle.
  trigger: RefreshTrigger,
  /// Shutdown broadcaster for the session task.
  shutdown_tx: broadcast::Sender<()>,
  /// Session task.
  handle: JoinHandle<()>,
}

impl FeedSession {
  /// Spawn the session task.
  pub fn start(
    feed: Arc<PriceFeed>,
    schedule: ScheduleConfig,
    connected: watch::Receiver<bool>,
  ) -> Self {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let (refresh_tx, refresh_rx) = mpsc::channel(8);

    let handle = tokio::spawn(run_session(
      Arc::clone(&feed),
      schedule,
      connected,
      refresh_rx,
      shutdown_rx,
    ));

    Self {
      feed,
      trigger: RefreshTrigger { tx: refresh_tx },
      shutdown_tx,
      handle,
    }
  }

  /// Handle for manual refreshes.
  pub fn trigger(&self) -> RefreshTrigger {
    self.trigger.clone()
  }

  /// Tear down the feed, cancel the task and wait for it (up to 5s).
  pub async fn stop(self) {
    self.feed.teardown().await;
    let _ = self.shutdown_tx.send(());

    let mut handle = self.handle;
    if tokio::time::timeout(Duration::from_secs(5), &mut handle)
      .await
      .is_err()
    {
      warn!("Feed session did not stop in time, aborting");
      handle.abort();
    }
    info!("Feed session stopped");
  }
}

#[instrument(skip_all, name = "feed_session")]
async fn run_session(
  feed: Arc<PriceFeed>,
  schedule: ScheduleConfig,
  mut connected: watch::Receiver<bool>,
  mut refresh_rx: mpsc::Receiver<RefreshReply>,
  mut shutdown_rx: broadcast::Receiver<()>,
) {
  let live_credentials = feed.has_live_credentials();
  let mut mode = FeedMode::select(*connected.borrow_and_update(), live_credentials);
  let mut ticker = schedule.ticker(mode);
  let mut wallet_open = true;

  info!(?mode, live_credentials, "Feed session started");

  loop {
    tokio::select! {
      biased;
      _ = shutdown_rx.recv() => {
        info!("Feed session received shutdown signal");
        break;
      }
      changed = connected.changed(), if wallet_open => {
        if changed.is_err() {
          debug!("Wallet channel closed, keeping current mode");
          wallet_open = false;
          continue;
        }
        let next = FeedMode::select(*connected.borrow_and_update(), live_credentials);
        if next != mode {
          info!(from = ?mode, to = ?next, "Feed mode changed");
          mode = next;
          ticker = schedule.ticker(mode);
        }
      }
      Some(reply) = refresh_rx.recv() => {
        let report = feed.refresh().await;
        let _ = reply.send(report);
      }
      _ = ticker.tick(), if mode != FeedMode::Paused => {
        let report = if mode == FeedMode::Polling {
          feed.try_refresh().await
        } else {
          feed.try_advance_synthetic().await
        };
        debug!(?mode, provenance = report.provenance(), "Scheduled tick");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_mode_selection() {
    assert_eq!(FeedMode::select(true, true), FeedMode::Polling);
    assert_eq!(FeedMode::select(true, false), FeedMode::Polling);
    assert_eq!(FeedMode::select(false, false), FeedMode::Synthetic);
    assert_eq!(FeedMode::select(false, true), FeedMode::Paused);
  }
}
