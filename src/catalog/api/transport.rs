use {
    super::RequestError,
    anyhow::Result,
    reqwest::Client,
    serde::Deserialize,
    std::{
        fmt,
        time::Duration,
    },
    tracing::instrument,
    url::Url,
};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Root of the product API, e.g. `https://suzuri.jp/api/v1/`. The listing
    /// endpoint is resolved as `<base_url>/products`.
    pub base_url:  Url,
    /// Token sent as a bearer `Authorization` header.
    #[serde(default)]
    pub api_key:   Option<ApiKey>,
    /// Sent as the `limit` query parameter when set. The server default
    /// applies otherwise.
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout:   Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

/// API token. Never printed in full.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Status and body of a completed HTTP exchange. Status handling is left to
/// the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body:   String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client capable of issuing GET requests against the product API.
#[async_trait::async_trait]
pub trait Transport {
    fn base_url(&self) -> &Url;
    fn page_size(&self) -> Option<usize>;
    async fn get(&self, url: Url) -> Result<RawResponse, RequestError>;
}

pub struct HttpTransport {
    client:    Client,
    base_url:  Url,
    api_key:   Option<ApiKey>,
    page_size: Option<usize>,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            page_size: config.page_size,
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn get(&self, url: Url) -> Result<RawResponse, RequestError> {
        let mut request = self.client.get(url);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose());
        }

        let response = request.send().await.map_err(RequestError::transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(RequestError::transport)?;

        tracing::debug!(status, bytes = body.len(), "Product API responded.");
        Ok(RawResponse { status, body })
    }
}

/// Scripted transport for tests.
#[cfg(test)]
pub(crate) mod fake {
    use {
        super::{
            RawResponse,
            Transport,
        },
        crate::catalog::api::RequestError,
        serde_json::json,
        std::{
            collections::VecDeque,
            ops::Range,
            sync::{
                Arc,
                Mutex,
            },
        },
        tokio::sync::Notify,
        url::Url,
    };

    pub struct FakeTransport {
        base_url:  Url,
        page_size: Option<usize>,
        responses: Mutex<VecDeque<Result<RawResponse, RequestError>>>,
        requests:  Mutex<Vec<Url>>,
        gate:      Option<Arc<Notify>>,
    }

    impl FakeTransport {
        pub fn new(responses: impl IntoIterator<Item = Result<RawResponse, RequestError>>) -> Self {
            Self {
                base_url:  "https://api.example.com/v1/".parse().unwrap(),
                page_size: None,
                responses: Mutex::new(responses.into_iter().collect()),
                requests:  Mutex::new(Vec::new()),
                gate:      None,
            }
        }

        pub fn with_base_url(mut self, base_url: &str) -> Self {
            self.base_url = base_url.parse().unwrap();
            self
        }

        pub fn with_page_size(mut self, page_size: usize) -> Self {
            self.page_size = Some(page_size);
            self
        }

        /// Hold every request until the returned handle is notified.
        pub fn gated(mut self) -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            self.gate = Some(gate.clone());
            (self, gate)
        }

        pub fn requests(&self) -> Vec<Url> {
            self.requests.lock().unwrap().clone()
        }

        pub fn requested_offsets(&self) -> Vec<usize> {
            self.requests()
                .iter()
                .filter_map(|url| {
                    url.query_pairs()
                        .find(|(key, _)| key == "offset")
                        .and_then(|(_, value)| value.parse().ok())
                })
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl Transport for FakeTransport {
        fn base_url(&self) -> &Url {
            &self.base_url
        }

        fn page_size(&self) -> Option<usize> {
            self.page_size
        }

        async fn get(&self, url: Url) -> Result<RawResponse, RequestError> {
            self.requests.lock().unwrap().push(url);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RequestError::Transport("no scripted response".into())))
        }
    }

    pub fn product_json(id: u64) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("Product {id}"),
            "price": 1000 + id,
            "sampleImageUrl": format!("https://img.example.com/{id}.png"),
        })
    }

    /// A successful response holding products with the given ids.
    pub fn page(ids: Range<u64>) -> Result<RawResponse, RequestError> {
        let products: Vec<_> = ids.map(product_json).collect();
        Ok(RawResponse {
            status: 200,
            body:   json!({ "products": products }).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{
            ApiKey,
            Config,
            HttpTransport,
        },
        crate::catalog::api::{
            ProductRequest,
            RequestError,
        },
        serde_json::json,
        std::{
            collections::HashMap,
            net::SocketAddr,
            time::Duration,
        },
        warp::{
            Filter,
            http::StatusCode,
        },
    };

    fn config(addr: SocketAddr, api_key: Option<&str>, page_size: Option<usize>) -> Config {
        Config {
            base_url: format!("http://{addr}/api/v1/").parse().unwrap(),
            api_key: api_key.map(ApiKey::new),
            page_size,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_http_transport_sends_paging_query_and_bearer_token() {
        // Echo what the server saw back through the product title.
        let route = warp::path!("api" / "v1" / "products")
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::header::optional::<String>("authorization"))
            .map(
                |query: HashMap<String, String>, authorization: Option<String>| {
                    let seen = format!(
                        "offset={} limit={} auth={}",
                        query.get("offset").cloned().unwrap_or_default(),
                        query.get("limit").cloned().unwrap_or_default(),
                        authorization.unwrap_or_default(),
                    );
                    warp::reply::json(&json!({
                        "products": [{
                            "id": 1,
                            "title": seen,
                            "price": 1200,
                            "sampleImageUrl": "https://img.example.com/1.png"
                        }]
                    }))
                },
            );
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let transport = HttpTransport::new(&config(addr, Some("secret"), Some(20))).unwrap();
        let products = ProductRequest::new(&transport, 6).fetch().await.unwrap();

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title(), "offset=6 limit=20 auth=Bearer secret");
    }

    #[tokio::test]
    async fn test_http_transport_omits_optional_parameters() {
        let route = warp::path!("api" / "v1" / "products")
            .and(warp::query::<HashMap<String, String>>())
            .and(warp::header::optional::<String>("authorization"))
            .map(
                |query: HashMap<String, String>, authorization: Option<String>| {
                    let seen = format!(
                        "keys={} auth={}",
                        query.len(),
                        authorization.is_some()
                    );
                    warp::reply::json(&json!({
                        "products": [{
                            "id": 1,
                            "title": seen,
                            "price": 1200,
                            "sampleImageUrl": "https://img.example.com/1.png"
                        }]
                    }))
                },
            );
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let transport = HttpTransport::new(&config(addr, None, None)).unwrap();
        let products = ProductRequest::new(&transport, 0).fetch().await.unwrap();

        assert_eq!(products[0].title(), "keys=1 auth=false");
    }

    #[tokio::test]
    async fn test_http_transport_reports_error_status() {
        let route = warp::path!("api" / "v1" / "products")
            .map(|| warp::reply::with_status("maintenance", StatusCode::SERVICE_UNAVAILABLE));
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let transport = HttpTransport::new(&config(addr, None, None)).unwrap();
        let err = ProductRequest::new(&transport, 0).fetch().await.unwrap_err();

        match err {
            RequestError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_transport_reports_connection_failure() {
        // Reserve a port, then free it so nothing is listening there.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&config(addr, None, None)).unwrap();
        let err = ProductRequest::new(&transport, 0).fetch().await.unwrap_err();

        assert!(matches!(err, RequestError::Transport(_)), "{err:?}");
    }

    #[test]
    fn test_api_key_is_redacted() {
        let config = Config {
            base_url:  "https://api.example.com/".parse().unwrap(),
            api_key:   Some(ApiKey::new("hunter2")),
            page_size: None,
            timeout:   Duration::from_secs(1),
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
