/* ###################################################### System Architecture #######################################################

                                                   +-----------------------+
                                                   |      Product API      |
                                                   +-----------------------+
                                                              ^
                                                              | GET /products?offset=N
                                                              |
+-----------------+   fetch_next_products   +-----------------------------------------+
|                 |------------------------>|               State                     |
|     Viewer      |                         |                                         |
|                 |<------------------------|   Product List  ->  ProductRequest      |
+-----------------+     ProductsChanged     |                                         |
                                            +-----------------------------------------+
                                                              |
                                                              v
                                                   +-----------------------+
                                                   |    Metrics Server     |
                                                   +-----------------------+

- The Viewer subscribes to the Product List, renders placeholder cells, and triggers the first fetch.
- The Product List issues one ProductRequest per fetch, using the number of products it already holds
  as the offset. Only one fetch may be in flight; overlapping calls are skipped.
- A successful page is appended in one step and every subscriber is notified. A failed page leaves
  the list untouched and is recorded as the last error.
- The Viewer re-renders on each notification and keeps requesting pages until it has requested the
  configured number, the listing runs dry, or a fetch fails.

################################################################################################################################## */

use {
    self::config::Config,
    anyhow::Result,
    api::HttpTransport,
    futures_util::future::join_all,
    lazy_static::lazy_static,
    std::sync::Arc,
    tokio::sync::watch,
};

pub mod api;
pub mod config;
pub mod grid;
pub mod metrics;
pub mod services;
pub mod state;

lazy_static! {
    /// Process-wide exit flag. Flipped to `true` once on shutdown; services subscribe and stop
    /// when it changes.
    pub static ref EXIT: watch::Sender<bool> = watch::channel(false).0;
}

pub struct Catalog {
    config: Config,
}

impl Catalog {
    pub fn new(config: Config) -> Self {
        Catalog { config }
    }

    pub async fn start(&self) {
        tracing::info!(
            base_url = %self.config.api.base_url,
            pages = self.config.viewer.pages,
            "Starting product grid.",
        );

        if let Err(err) = self.spawn().await {
            tracing::error!(err = ?err, "Product grid failed.");
        };
    }

    async fn spawn(&self) -> Result<()> {
        // Create the Application State.
        let transport = Arc::new(HttpTransport::new(&self.config.api)?);
        let state = Arc::new(state::State::new(transport).await);

        // Flip the exit flag on ctrl-c so long-running services can wind down.
        tokio::spawn(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(err = ?err, "Could not listen for ctrl-c.");
                return;
            }
            tracing::info!("Received ctrl-c, shutting down.");
            let _ = EXIT.send_replace(true);
        });

        let mut handles = Vec::new();
        if let Some(metrics_config) = &self.config.metrics_server {
            handles.push(tokio::spawn(metrics::run(metrics_config.clone())));
        }

        // The viewer finishes on its own once it has loaded its pages. The
        // metrics server, when enabled, keeps the process alive until ctrl-c.
        services::viewer(self.config.viewer.clone(), state.clone()).await;
        if !handles.is_empty() {
            tracing::info!("Viewer finished, serving metrics until shutdown.");
        }

        join_all(handles).await;
        Ok(())
    }
}
