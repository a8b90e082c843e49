use {
    crate::catalog::state::FetchOutcome,
    anyhow::Result,
    lazy_static::lazy_static,
    prometheus_client::{
        encoding::{
            EncodeLabelSet,
            text::encode,
        },
        metrics::{
            counter::Counter,
            family::Family,
            gauge::Gauge,
        },
        registry::Registry,
    },
    serde::Deserialize,
    std::net::SocketAddr,
    tokio::sync::Mutex,
    warp::{
        Filter,
        Rejection,
        http::StatusCode,
        reply,
    },
};

lazy_static! {
    pub static ref PROMETHEUS_REGISTRY: Mutex<Registry> = Mutex::new(<Registry>::default());
}

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8888))
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FetchLabels {
    pub outcome: String,
}

/// Metrics describing the product store.
pub struct StoreMetrics {
    fetches:   Family<FetchLabels, Counter>,
    products:  Gauge,
    in_flight: Gauge,
}

impl StoreMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let fetches = Family::default();
        registry.register(
            "product_fetches",
            "Calls to fetch the next product page, by outcome",
            fetches.clone(),
        );

        let products = Gauge::default();
        registry.register(
            "products_loaded",
            "Number of products held by the store",
            products.clone(),
        );

        let in_flight = Gauge::default();
        registry.register(
            "product_fetch_in_flight",
            "1 while a product page fetch is running",
            in_flight.clone(),
        );

        Self {
            fetches,
            products,
            in_flight,
        }
    }

    pub fn fetch_started(&self) {
        self.in_flight.set(1);
    }

    pub fn record(&self, outcome: &FetchOutcome, total: usize) {
        let outcome_label = match outcome {
            FetchOutcome::Skipped => "skipped",
            FetchOutcome::Appended(_) => "appended",
            FetchOutcome::Failed(kind) => kind.as_label(),
        };
        self.fetches
            .get_or_create(&FetchLabels {
                outcome: outcome_label.to_string(),
            })
            .inc();

        if !matches!(outcome, FetchOutcome::Skipped) {
            self.in_flight.set(0);
            self.products.set(i64::try_from(total).unwrap_or(i64::MAX));
        }
    }
}

pub async fn run(config: Config) {
    if let Err(err) = serve(config).await {
        tracing::error!(err = ?err, "Metrics server failed.");
    }
}

async fn serve(config: Config) -> Result<()> {
    let metrics_route = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(|| async move {
            let registry = PROMETHEUS_REGISTRY.lock().await;
            let mut buffer = String::new();
            let status = match encode(&mut buffer, &registry) {
                Ok(()) => StatusCode::OK,
                Err(err) => {
                    tracing::error!(err = ?err, "Could not encode metrics.");
                    buffer.clear();
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            Result::<_, Rejection>::Ok(reply::with_header(
                reply::with_status(buffer, status),
                "content-type",
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            ))
        });

    let (addr, serve) = warp::serve(metrics_route).try_bind_with_graceful_shutdown(
        config.bind_address,
        async {
            let _ = crate::catalog::EXIT.subscribe().changed().await;
        },
    )?;

    tracing::info!(bind_address = %addr, "Starting metrics server.");
    serve.await;
    Ok(())
}
