//! Product List
//!
//! Holds every product page fetched so far. Pages are appended in the order
//! they arrive and the list is never reordered, deduplicated or shrunk. Only
//! one fetch may be in flight per store; callers that race it are turned away
//! rather than blocked. Subscribers are told about each committed append.

use {
    super::State,
    crate::catalog::{
        api::{
            FetchErrorKind,
            Product,
            ProductRequest,
            ProductsChanged,
            SubscriptionID,
            Transport,
        },
        metrics::StoreMetrics,
    },
    prometheus_client::registry::Registry,
    std::sync::{
        Arc,
        atomic::{
            AtomicBool,
            AtomicI64,
            Ordering,
        },
    },
    tokio::sync::{
        RwLock,
        mpsc,
        watch,
    },
    tracing::instrument,
};

/// Result of a single `fetch_next_products` call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Another fetch was already in flight; nothing was requested.
    Skipped,
    /// The page was appended. Holds the number of new products.
    Appended(usize),
    /// The fetch failed and the list was left untouched.
    Failed(FetchErrorKind),
}

struct ProductsSubscription {
    subscription_id: SubscriptionID,
    notify_tx:       mpsc::Sender<ProductsChanged>,
}

pub struct ProductsState {
    transport:           Arc<dyn Transport + Send + Sync>,
    products:            RwLock<Vec<Product>>,
    is_fetching:         AtomicBool,
    /// Kind of the most recent failure, cleared by the next successful fetch.
    last_error:          RwLock<Option<FetchErrorKind>>,
    subscription_id_seq: AtomicI64,
    subscriptions:       RwLock<Vec<ProductsSubscription>>,
    /// Bumped each time a fetch finishes, whether it appended or failed.
    settled:             watch::Sender<u64>,
    metrics:             StoreMetrics,
}

impl ProductsState {
    pub fn new(transport: Arc<dyn Transport + Send + Sync>, registry: &mut Registry) -> Self {
        Self {
            transport,
            products: RwLock::new(Vec::new()),
            is_fetching: AtomicBool::new(false),
            last_error: RwLock::new(None),
            subscription_id_seq: 1.into(),
            subscriptions: RwLock::new(Vec::new()),
            settled: watch::channel(0).0,
            metrics: StoreMetrics::new(registry),
        }
    }

    #[cfg(test)]
    pub(crate) fn settled_waiters(&self) -> usize {
        self.settled.receiver_count()
    }

    async fn notify(&self, total: usize) {
        for subscription in self.subscriptions.read().await.iter() {
            // Never await here, a slow subscriber must not hold up the store.
            if let Err(err) = subscription.notify_tx.try_send(ProductsChanged {
                subscription: subscription.subscription_id,
                total,
            }) {
                tracing::warn!(
                    subscription = subscription.subscription_id,
                    err = %err,
                    "Could not notify product subscriber.",
                );
            }
        }
    }
}

#[async_trait::async_trait]
pub trait ProductList {
    async fn fetch_next_products(&self) -> FetchOutcome;
    async fn products(&self) -> Vec<Product>;
    async fn product_count(&self) -> usize;
    fn is_fetching(&self) -> bool;
    async fn last_error(&self) -> Option<FetchErrorKind>;
    async fn subscribe(&self, notify_tx: mpsc::Sender<ProductsChanged>) -> SubscriptionID;
    async fn drop_closed_subscriptions(&self);
    /// Receiver that changes once per finished fetch. Unlike subscriptions it
    /// also fires when a fetch fails.
    fn fetch_settled(&self) -> watch::Receiver<u64>;
}

// Allow downcasting State into ProductsState for functions that depend on the `ProductList` service.
impl<'a> From<&'a State> for &'a ProductsState {
    fn from(state: &'a State) -> &'a ProductsState {
        &state.products
    }
}

#[async_trait::async_trait]
impl<T> ProductList for T
where
    for<'a> &'a T: Into<&'a ProductsState>,
    T: Sync,
{
    #[instrument(skip(self))]
    async fn fetch_next_products(&self) -> FetchOutcome {
        let store: &ProductsState = self.into();

        if store
            .is_fetching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Product fetch already in flight, skipping.");
            let outcome = FetchOutcome::Skipped;
            store.metrics.record(&outcome, 0);
            return outcome;
        }
        store.metrics.fetch_started();

        // Only the fetch holding the flag appends, so the count cannot move
        // until this call commits.
        let offset = store.products.read().await.len();
        let result = ProductRequest::new(&*store.transport, offset).fetch().await;

        // Record before releasing the flag, the next fetch owns the gauges.
        let outcome = match result {
            Ok(page) => {
                let appended = page.len();
                let total = {
                    let mut products = store.products.write().await;
                    products.extend(page);
                    products.len()
                };
                *store.last_error.write().await = None;
                tracing::info!(offset, appended, total, "Appended product page.");

                let outcome = FetchOutcome::Appended(appended);
                store.metrics.record(&outcome, total);
                store.is_fetching.store(false, Ordering::SeqCst);
                store.notify(total).await;
                outcome
            }
            Err(err) => {
                let kind = err.kind();
                *store.last_error.write().await = Some(kind);
                tracing::warn!(offset, err = %err, "Failed to fetch product page.");

                let outcome = FetchOutcome::Failed(kind);
                store.metrics.record(&outcome, offset);
                store.is_fetching.store(false, Ordering::SeqCst);
                outcome
            }
        };

        store.settled.send_modify(|settled| *settled += 1);
        outcome
    }

    async fn products(&self) -> Vec<Product> {
        self.into().products.read().await.clone()
    }

    async fn product_count(&self) -> usize {
        self.into().products.read().await.len()
    }

    fn is_fetching(&self) -> bool {
        self.into().is_fetching.load(Ordering::SeqCst)
    }

    async fn last_error(&self) -> Option<FetchErrorKind> {
        *self.into().last_error.read().await
    }

    async fn subscribe(&self, notify_tx: mpsc::Sender<ProductsChanged>) -> SubscriptionID {
        let subscription_id = self
            .into()
            .subscription_id_seq
            .fetch_add(1, Ordering::SeqCst);
        self.into()
            .subscriptions
            .write()
            .await
            .push(ProductsSubscription {
                subscription_id,
                notify_tx,
            });
        subscription_id
    }

    async fn drop_closed_subscriptions(&self) {
        self.into()
            .subscriptions
            .write()
            .await
            .retain(|subscription| !subscription.notify_tx.is_closed());
    }

    fn fetch_settled(&self) -> watch::Receiver<u64> {
        self.into().settled.subscribe()
    }
}
