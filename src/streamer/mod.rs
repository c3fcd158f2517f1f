//! Streamer (C3) — keeps one (exchange, symbol) order book fresh in the
//! store. Prefers a push subscription; falls back to REST polling with
//! backoff when the adapter can't stream or the stream drops.

use crate::exchange::ExchangeAdapter;
use crate::model::Symbol;
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SNAPSHOT_TTL_SECONDS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Starting,
    Streaming,
    Polling,
    Stopped,
}

/// Resolves `canonical` against `adapter`'s markets, streams or polls its
/// order book into `store` until `cancel` fires. Re-resolves the venue
/// symbol if a fetch ever reports `SymbolNotFound` (the venue's market
/// list may have changed since startup).
pub async fn run(
    adapter: Arc<dyn ExchangeAdapter>,
    store: Arc<dyn Store>,
    canonical: Symbol,
    depth: usize,
    cancel: CancellationToken,
) {
    let mut state = State::Starting;
    let mut venue_symbol = match adapter.resolve_symbol(&canonical).await {
        Ok(s) => s,
        Err(e) => {
            warn!(exchange = %adapter.id(), symbol = %canonical, error = %e, "symbol resolution failed, streamer exiting");
            return;
        }
    };

    let mut poll_interval = Duration::from_secs(1);
    let mut consecutive_errors: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            state = State::Stopped;
            debug!(exchange = %adapter.id(), symbol = %canonical, "streamer stopped");
            return;
        }

        match adapter.watch_order_book(&canonical, depth).await {
            Ok(mut rx) => {
                state = State::Streaming;
                info!(exchange = %adapter.id(), symbol = %canonical, "streaming order book via push subscription");
                if !stream_until_closed(&mut rx, &store, &adapter, &canonical, &cancel).await {
                    return;
                }
                // Channel closed: fall through and retry (possibly via polling).
            }
            Err(_) => {
                state = State::Polling;
            }
        }

        if state != State::Streaming {
            if !poll_once(
                &adapter,
                &store,
                &canonical,
                &mut venue_symbol,
                depth,
                &mut consecutive_errors,
                &mut poll_interval,
            )
            .await
            {
                return;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = cancel.cancelled() => {
                debug!(exchange = %adapter.id(), symbol = %canonical, "streamer stopped");
                return;
            }
        }
    }
}

/// Drains push-subscription updates into the store. Returns `false` if
/// cancellation fired (caller should stop), `true` if the channel simply
/// closed and polling should resume.
async fn stream_until_closed(
    rx: &mut mpsc::Receiver<crate::model::OrderBookSnapshot>,
    store: &Arc<dyn Store>,
    adapter: &Arc<dyn ExchangeAdapter>,
    canonical: &Symbol,
    cancel: &CancellationToken,
) -> bool {
    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(snapshot) => {
                        if let Err(e) = store
                            .put(adapter.id().as_str(), canonical.as_str(), &snapshot, SNAPSHOT_TTL_SECONDS)
                            .await
                        {
                            warn!(exchange = %adapter.id(), symbol = %canonical, error = %e, "failed to persist streamed snapshot");
                        }
                    }
                    None => return true,
                }
            }
            _ = cancel.cancelled() => return false,
        }
    }
}

/// Performs one REST poll, writing the snapshot on success and growing the
/// backoff on failure. Returns `false` if symbol resolution fails hard
/// (adapter no longer lists any venue symbol for this canonical pair).
async fn poll_once(
    adapter: &Arc<dyn ExchangeAdapter>,
    store: &Arc<dyn Store>,
    canonical: &Symbol,
    venue_symbol: &mut String,
    depth: usize,
    consecutive_errors: &mut u32,
    poll_interval: &mut Duration,
) -> bool {
    let base_poll = Duration::from_secs_f64(2.0);

    match adapter.fetch_order_book(canonical, depth).await {
        Ok(snapshot) => {
            *consecutive_errors = 0;
            *poll_interval = base_poll;
            if let Err(e) = store
                .put(adapter.id().as_str(), canonical.as_str(), &snapshot, SNAPSHOT_TTL_SECONDS)
                .await
            {
                warn!(exchange = %adapter.id(), symbol = %canonical, error = %e, "failed to persist polled snapshot");
            }
            true
        }
        Err(crate::error::AdapterError::SymbolNotFound { .. }) => {
            match adapter.resolve_symbol(canonical).await {
                Ok(resolved) => {
                    *venue_symbol = resolved;
                    true
                }
                Err(e) => {
                    warn!(exchange = %adapter.id(), symbol = %canonical, error = %e, "symbol no longer resolvable, streamer exiting");
                    false
                }
            }
        }
        Err(e) => {
            *consecutive_errors += 1;
            *poll_interval = base_poll * 2;
            warn!(exchange = %adapter.id(), symbol = %canonical, error = %e, attempt = *consecutive_errors, "poll failed, backing off");
            true
        }
    }
}
