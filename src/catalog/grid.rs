//! Grid
//!
//! Turns a product snapshot into the cells a product grid displays.

use {
    crate::catalog::api::{
        Price,
        Product,
    },
    smol_str::SmolStr,
    url::Url,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cell {
    /// Shown while nothing has loaded yet.
    Placeholder,
    Product {
        title:       SmolStr,
        price_label: String,
        image:       Url,
    },
}

/// An empty snapshot renders `placeholder_cells` placeholders. Otherwise every
/// product gets exactly one cell, in list order.
pub fn cells(products: &[Product], placeholder_cells: usize) -> Vec<Cell> {
    if products.is_empty() {
        return vec![Cell::Placeholder; placeholder_cells];
    }

    products
        .iter()
        .map(|product| Cell::Product {
            title:       product.title().into(),
            price_label: price_label(product.price()),
            image:       product.sample_image_url().clone(),
        })
        .collect()
}

/// Formats a price in yen with thousands separators, e.g. `¥12,800`.
pub fn price_label(price: Price) -> String {
    let digits = price.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("¥{grouped}")
}
