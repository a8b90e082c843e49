//! Product API
//!
//! Types describing the remote product listing API and the client used to
//! page through it.

use {
    serde::{
        Deserialize,
        Serialize,
    },
    smol_str::SmolStr,
    url::Url,
};

pub mod request;
pub mod transport;

pub use {
    request::{
        FetchErrorKind,
        ProductRequest,
        RequestError,
    },
    transport::{
        Config,
        HttpTransport,
        RawResponse,
        Transport,
    },
};

pub type ProductID = u64;
pub type Price = u64;
pub type SubscriptionID = i64;

/// A single product as listed by the API.
///
/// Products are only ever built by deserializing an API response, and are
/// never mutated afterwards.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id:               ProductID,
    title:            SmolStr,
    price:            Price,
    sample_image_url: Url,
}

impl Product {
    pub fn id(&self) -> ProductID {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn sample_image_url(&self) -> &Url {
        &self.sample_image_url
    }
}

/// Body of a product listing response. Anything besides the item array
/// (paging metadata and so on) is ignored.
#[derive(Deserialize, Debug)]
pub struct ProductPage {
    pub products: Vec<Product>,
}

/// Sent to every subscriber after the product list has changed.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ProductsChanged {
    pub subscription: SubscriptionID,
    /// Number of products held after the change.
    pub total:        usize,
}
