use {
    super::{
        Product,
        ProductPage,
        Transport,
    },
    thiserror::Error,
    tracing::instrument,
    url::Url,
};

/// Bodies of failed responses are truncated to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("product API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed product listing: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("cannot build product endpoint from base url {0}")]
    Endpoint(Url),
}

impl RequestError {
    pub fn transport(err: impl Into<anyhow::Error>) -> Self {
        Self::Transport(format!("{:#}", err.into()))
    }

    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Transport(_) | Self::Endpoint(_) => FetchErrorKind::Transport,
            Self::Status { status, .. } => FetchErrorKind::Status(*status),
            Self::Parse(_) => FetchErrorKind::Parse,
        }
    }
}

/// Coarse classification of a failed fetch, kept by the product store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    Status(u16),
    Parse,
}

impl FetchErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Status(_) => "status",
            Self::Parse => "parse",
        }
    }
}

/// One page request against the product listing endpoint.
///
/// The offset is the number of products the caller already holds. Every call
/// to [`ProductRequest::fetch`] issues exactly one GET and never retries.
pub struct ProductRequest<'a, T: ?Sized> {
    transport: &'a T,
    offset:    usize,
}

impl<'a, T> ProductRequest<'a, T>
where
    T: Transport + Sync + ?Sized,
{
    pub fn new(transport: &'a T, offset: usize) -> Self {
        Self { transport, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn url(&self) -> Result<Url, RequestError> {
        let base_url = self.transport.base_url();
        let mut url = base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RequestError::Endpoint(base_url.clone()))?
            .pop_if_empty()
            .push("products");

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("offset", &self.offset.to_string());
            if let Some(page_size) = self.transport.page_size() {
                query.append_pair("limit", &page_size.to_string());
            }
        }

        Ok(url)
    }

    #[instrument(skip(self), fields(offset = self.offset))]
    pub async fn fetch(&self) -> Result<Vec<Product>, RequestError> {
        let response = self.transport.get(self.url()?).await?;

        if !response.is_success() {
            return Err(RequestError::Status {
                status: response.status,
                body:   response.body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let page: ProductPage = serde_json::from_str(&response.body)?;
        tracing::debug!(count = page.products.len(), "Parsed product page.");
        Ok(page.products)
    }
}
