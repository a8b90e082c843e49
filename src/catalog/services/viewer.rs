//! Viewer
//!
//! Headless stand-in for the product grid screen. On mount it renders
//! placeholders and triggers the first fetch, then re-renders whenever the
//! product list notifies it, requesting more pages until `pages` have been
//! requested, a page comes back empty, or a fetch fails.

use {
    crate::catalog::{
        grid::{
            self,
            Cell,
        },
        state::{
            FetchOutcome,
            ProductList,
        },
    },
    serde::Deserialize,
    std::sync::Arc,
    tokio::sync::mpsc,
    tracing::instrument,
};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of placeholder cells shown while the list is empty.
    pub placeholder_cells: usize,
    /// Number of pages to request before the viewer stops.
    pub pages:             usize,
    /// Size of the buffer of the viewer's notification channel.
    pub notify_buffer:     usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            placeholder_cells: 6,
            pages:             1,
            notify_buffer:     1000,
        }
    }
}

#[instrument(skip(config, state))]
pub async fn viewer<S>(config: Config, state: Arc<S>)
where
    S: ProductList,
    S: Send + Sync + 'static,
{
    let (notify_tx, mut notify_rx) = mpsc::channel(config.notify_buffer.max(1));
    let subscription = state.subscribe(notify_tx).await;
    let mut exit = crate::catalog::EXIT.subscribe();
    tracing::debug!(subscription, "Viewer subscribed to product list.");

    render(&*state, config.placeholder_cells).await;

    for page in 0..config.pages {
        let outcome = match state.fetch_next_products().await {
            // Someone else's fetch is in flight. Follow it until it settles,
            // since a failure there never notifies.
            FetchOutcome::Skipped => {
                let mut settled = state.fetch_settled();
                if state.is_fetching() {
                    tokio::select! {
                        _ = exit.changed() => {
                            tracing::info!("Shutdown signal received.");
                            return;
                        }
                        _ = settled.changed() => {}
                    }
                }
                match state.last_error().await {
                    Some(kind) => FetchOutcome::Failed(kind),
                    None => FetchOutcome::Skipped,
                }
            }
            outcome => outcome,
        };
        if let FetchOutcome::Failed(kind) = outcome {
            // No retry: the list stays as it was and paging stops.
            tracing::warn!(page, error = ?kind, "Viewer stopped paging.");
            break;
        }

        // Every committed page notifies, including one appended by another
        // caller.
        tokio::select! {
            _ = exit.changed() => {
                tracing::info!("Shutdown signal received.");
                return;
            }
            changed = notify_rx.recv() => {
                let Some(changed) = changed else {
                    return;
                };
                tracing::debug!(total = changed.total, "Product list changed.");
                render(&*state, config.placeholder_cells).await;
            }
        }

        if outcome == FetchOutcome::Appended(0) {
            tracing::info!(page, "Product listing exhausted.");
            break;
        }
    }

    let products = state.product_count().await;
    let last_error = state.last_error().await;
    tracing::info!(products, error = ?last_error, "Viewer finished.");
}

/// Renders the current snapshot and returns the number of product cells.
pub async fn render<S>(state: &S, placeholder_cells: usize) -> usize
where
    S: ProductList + ?Sized,
{
    let products = state.products().await;
    let cells = grid::cells(&products, placeholder_cells);

    let mut product_cells = 0;
    for (index, cell) in cells.iter().enumerate() {
        match cell {
            Cell::Placeholder => tracing::debug!(index, "placeholder"),
            Cell::Product {
                title,
                price_label,
                image,
            } => {
                product_cells += 1;
                tracing::info!(
                    index,
                    title = %title,
                    price = %price_label,
                    image = %image,
                    "product",
                );
            }
        }
    }

    tracing::info!(
        cells = cells.len(),
        products = product_cells,
        fetching = state.is_fetching(),
        "Rendered product grid.",
    );
    product_cells
}
