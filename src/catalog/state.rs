use {
    crate::catalog::{
        api::Transport,
        metrics::PROMETHEUS_REGISTRY,
    },
    std::sync::Arc,
};

pub mod products;
pub use products::{
    FetchOutcome,
    ProductList,
};

/// State contains all relevant shared application state.
pub struct State {
    /// Accumulated product pages and their subscribers.
    products: products::ProductsState,
}

impl State {
    pub async fn new(transport: Arc<dyn Transport + Send + Sync>) -> Self {
        let registry = &mut *PROMETHEUS_REGISTRY.lock().await;
        State {
            products: products::ProductsState::new(transport, registry),
        }
    }
}
