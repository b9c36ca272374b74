//! Subscription Registry
//!
//! Maps (channel kind, symbol) pairs to caller-supplied handlers and
//! resolves inbound events against that map: exact symbol first, then the
//! wildcard entry, then nothing. A single mutex serializes mutation and
//! snapshot reads.
//!
//! # Locking Discipline
//!
//! No handler is ever invoked while the registry lock is held. `resolve`
//! clones the handler `Arc` and releases the lock before returning, so a
//! slow handler cannot block a concurrent `subscribe` call and handlers
//! may themselves call back into the registry without deadlocking.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::domain::channel::ChannelKind;
use crate::domain::streaming::StreamEvent;

// =============================================================================
// Types
// =============================================================================

/// A symbol string (stock ticker, crypto pair, or OCC option symbol).
pub type Symbol = String;

/// Wildcard symbol: matches any symbol without an exact entry.
pub const WILDCARD: &str = "*";

/// A stored event handler.
///
/// Handlers are callable values owned by the registry; capture state by
/// value or behind an `Arc` of your own.
pub type Handler = Arc<dyn Fn(StreamEvent) + Send + Sync>;

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe handler registry keyed by (channel kind, symbol).
///
/// At most one handler exists per pair; a later registration for the same
/// pair replaces the earlier handler.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<ChannelKind, HashMap<Symbol, Handler>>>,
    version: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace entries for every symbol under `kind`.
    ///
    /// An empty symbol list registers the wildcard entry, which is how
    /// symbol-less channels (trade updates) attach their handler.
    pub fn register(&self, kind: ChannelKind, symbols: &[Symbol], handler: Handler) {
        let mut entries = self.entries.lock();
        let bucket = entries.entry(kind).or_default();

        if symbols.is_empty() {
            bucket.insert(WILDCARD.to_string(), Arc::clone(&handler));
        } else {
            for symbol in symbols {
                bucket.insert(symbol.clone(), Arc::clone(&handler));
            }
        }
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Remove entries for the given symbols under `kind`.
    ///
    /// An empty symbol list removes the wildcard entry.
    pub fn unregister(&self, kind: ChannelKind, symbols: &[Symbol]) {
        let mut entries = self.entries.lock();
        if let Some(bucket) = entries.get_mut(&kind) {
            if symbols.is_empty() {
                bucket.remove(WILDCARD);
            } else {
                for symbol in symbols {
                    bucket.remove(symbol);
                }
            }
            if bucket.is_empty() {
                entries.remove(&kind);
            }
            self.version.fetch_add(1, Ordering::Release);
        }
    }

    /// Monotonic counter bumped by every `register`/`unregister` call.
    ///
    /// Comparing two readings tells whether the registry changed in
    /// between, which is how the session closes the gap between taking
    /// a snapshot and entering the running state.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Resolve the handler for an event: exact symbol match first, then
    /// the wildcard entry.
    ///
    /// The returned `Arc` is cloned under the lock; invoke it after this
    /// call returns.
    #[must_use]
    pub fn resolve(&self, kind: ChannelKind, symbol: &str) -> Option<Handler> {
        let entries = self.entries.lock();
        let bucket = entries.get(&kind)?;
        bucket
            .get(symbol)
            .or_else(|| bucket.get(WILDCARD))
            .map(Arc::clone)
    }

    /// Subscribed symbols under `kind`, sorted for deterministic frames.
    #[must_use]
    pub fn symbols(&self, kind: ChannelKind) -> Vec<Symbol> {
        let entries = self.entries.lock();
        let mut symbols: Vec<Symbol> = entries
            .get(&kind)
            .map(|bucket| bucket.keys().cloned().collect())
            .unwrap_or_default();
        symbols.sort_unstable();
        symbols
    }

    /// Snapshot of every non-empty channel bucket, for building a
    /// subscribe frame. Kinds with no entries are omitted.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ChannelKind, Vec<Symbol>)> {
        let entries = self.entries.lock();
        let mut snapshot: Vec<(ChannelKind, Vec<Symbol>)> = ChannelKind::all()
            .iter()
            .filter_map(|kind| {
                entries.get(kind).map(|bucket| {
                    let mut symbols: Vec<Symbol> = bucket.keys().cloned().collect();
                    symbols.sort_unstable();
                    (*kind, symbols)
                })
            })
            .collect();
        snapshot.retain(|(_, symbols)| !symbols.is_empty());
        snapshot
    }

    /// Check whether any handler is registered under `kind`.
    #[must_use]
    pub fn has_any(&self, kind: ChannelKind) -> bool {
        self.entries
            .lock()
            .get(&kind)
            .is_some_and(|bucket| !bucket.is_empty())
    }

    /// Check whether the registry has no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        let mut map = f.debug_map();
        for (kind, bucket) in entries.iter() {
            let mut symbols: Vec<&Symbol> = bucket.keys().collect();
            symbols.sort_unstable();
            map.entry(kind, &symbols);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    use super::*;
    use crate::domain::streaming::StreamPayload;

    fn counting_handler(counter: Arc<AtomicUsize>) -> Handler {
        Arc::new(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn noop_handler() -> Handler {
        Arc::new(|_event| {})
    }

    fn event(kind: ChannelKind, symbol: &str) -> StreamEvent {
        StreamEvent {
            kind,
            symbol: symbol.to_string(),
            payload: StreamPayload::Raw(serde_json::Value::Null),
        }
    }

    #[test]
    fn exact_match_beats_wildcard() {
        let registry = SubscriptionRegistry::new();
        let exact_calls = Arc::new(AtomicUsize::new(0));
        let wildcard_calls = Arc::new(AtomicUsize::new(0));

        registry.register(
            ChannelKind::Trades,
            &["AAPL".to_string()],
            counting_handler(Arc::clone(&exact_calls)),
        );
        registry.register(
            ChannelKind::Trades,
            &[WILDCARD.to_string()],
            counting_handler(Arc::clone(&wildcard_calls)),
        );

        let handler = registry.resolve(ChannelKind::Trades, "AAPL").unwrap();
        handler(event(ChannelKind::Trades, "AAPL"));

        assert_eq!(exact_calls.load(Ordering::SeqCst), 1);
        assert_eq!(wildcard_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn wildcard_catches_unmatched_symbols() {
        let registry = SubscriptionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        registry.register(
            ChannelKind::Quotes,
            &[WILDCARD.to_string()],
            counting_handler(Arc::clone(&calls)),
        );

        let handler = registry.resolve(ChannelKind::Quotes, "TSLA").unwrap();
        handler(event(ChannelKind::Quotes, "TSLA"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn version_bumps_on_every_mutation() {
        let registry = SubscriptionRegistry::new();
        let v0 = registry.version();

        registry.register(ChannelKind::Trades, &["AAPL".to_string()], noop_handler());
        let v1 = registry.version();
        assert!(v1 > v0);

        registry.unregister(ChannelKind::Trades, &["AAPL".to_string()]);
        let v2 = registry.version();
        assert!(v2 > v1);

        // Reads leave the counter alone.
        let _ = registry.snapshot();
        let _ = registry.resolve(ChannelKind::Trades, "AAPL");
        assert_eq!(registry.version(), v2);
    }

    #[test]
    fn no_handler_without_entry() {
        let registry = SubscriptionRegistry::new();
        registry.register(ChannelKind::Trades, &["AAPL".to_string()], noop_handler());

        assert!(registry.resolve(ChannelKind::Trades, "MSFT").is_none());
        assert!(registry.resolve(ChannelKind::Quotes, "AAPL").is_none());
    }

    #[test]
    fn replace_semantics_keep_latest_handler() {
        let registry = SubscriptionRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        registry.register(
            ChannelKind::Bars,
            &["SPY".to_string()],
            counting_handler(Arc::clone(&first)),
        );
        registry.register(
            ChannelKind::Bars,
            &["SPY".to_string()],
            counting_handler(Arc::clone(&second)),
        );

        assert_eq!(registry.symbols(ChannelKind::Bars), vec!["SPY"]);

        let handler = registry.resolve(ChannelKind::Bars, "SPY").unwrap();
        handler(event(ChannelKind::Bars, "SPY"));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_is_precise() {
        let registry = SubscriptionRegistry::new();
        let symbols: Vec<Symbol> = ["A", "B", "C"].iter().map(ToString::to_string).collect();
        registry.register(ChannelKind::Trades, &symbols, noop_handler());

        registry.unregister(ChannelKind::Trades, &["B".to_string()]);

        assert_eq!(registry.symbols(ChannelKind::Trades), vec!["A", "C"]);
        assert!(registry.resolve(ChannelKind::Trades, "B").is_none());
        assert!(registry.resolve(ChannelKind::Trades, "A").is_some());
    }

    #[test]
    fn empty_symbol_list_registers_wildcard() {
        let registry = SubscriptionRegistry::new();
        registry.register(ChannelKind::TradeUpdates, &[], noop_handler());

        assert!(registry.has_any(ChannelKind::TradeUpdates));
        assert!(registry.resolve(ChannelKind::TradeUpdates, "AAPL").is_some());

        registry.unregister(ChannelKind::TradeUpdates, &[]);
        assert!(!registry.has_any(ChannelKind::TradeUpdates));
    }

    #[test]
    fn snapshot_omits_empty_kinds() {
        let registry = SubscriptionRegistry::new();
        registry.register(ChannelKind::Trades, &["AAPL".to_string()], noop_handler());
        registry.register(
            ChannelKind::Quotes,
            &["MSFT".to_string(), "AMD".to_string()],
            noop_handler(),
        );

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0], (ChannelKind::Trades, vec!["AAPL".to_string()]));
        assert_eq!(
            snapshot[1],
            (
                ChannelKind::Quotes,
                vec!["AMD".to_string(), "MSFT".to_string()]
            )
        );
    }

    #[test]
    fn handler_can_reenter_registry() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let inner = Arc::clone(&registry);
        registry.register(
            ChannelKind::Trades,
            &["AAPL".to_string()],
            Arc::new(move |_event| {
                // Re-entrant mutation from inside a handler must not
                // deadlock: resolve released the lock before invocation.
                inner.register(ChannelKind::Quotes, &["AAPL".to_string()], Arc::new(|_| {}));
            }),
        );

        let handler = registry.resolve(ChannelKind::Trades, "AAPL").unwrap();
        handler(event(ChannelKind::Trades, "AAPL"));
        assert!(registry.has_any(ChannelKind::Quotes));
    }

    proptest! {
        #[test]
        fn resolve_never_invents_handlers(
            registered in proptest::collection::vec("[A-Z]{1,4}", 1..8),
            probe in "[A-Z]{1,4}",
        ) {
            let registry = SubscriptionRegistry::new();
            let symbols: Vec<Symbol> = registered.clone();
            registry.register(ChannelKind::Trades, &symbols, noop_handler());

            let resolved = registry.resolve(ChannelKind::Trades, &probe).is_some();
            prop_assert_eq!(resolved, registered.contains(&probe));
        }

        #[test]
        fn wildcard_resolves_everything(
            probe in "[A-Z]{1,4}",
        ) {
            let registry = SubscriptionRegistry::new();
            registry.register(ChannelKind::Trades, &[WILDCARD.to_string()], noop_handler());
            prop_assert!(registry.resolve(ChannelKind::Trades, &probe).is_some());
        }
    }
}
