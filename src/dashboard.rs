//! Read-only client for the shop dashboard endpoints
//!
//! Refreshing is best-effort: every endpoint is fetched independently and a
//! failure only leaves that slot empty.

use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cart::ProductId;
use crate::Result;

/// Aggregate shop statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Sum of all transaction amounts
    #[serde(default)]
    pub total_sales: Decimal,
    /// Products with fewer than ten units in stock
    #[serde(default)]
    pub low_stock_count: u64,
    /// Outstanding customer credit
    #[serde(default)]
    pub total_credit: Decimal,
}

/// A completed sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction id
    pub id: i64,
    /// When the bill was saved
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    /// Bill total
    pub total_amount: Decimal,
    /// Line summary, e.g. `2 x Maggi - Rs.30`
    #[serde(default)]
    pub summary: Option<String>,
}

/// Inventory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product id
    pub id: ProductId,
    /// Display name
    pub name: String,
    /// Search keywords
    #[serde(default)]
    pub keywords: Option<String>,
    /// Unit price
    pub price: Decimal,
    /// Units on hand
    #[serde(default)]
    pub stock_qty: i64,
}

/// Customer ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Outstanding balance
    #[serde(default)]
    pub balance: Decimal,
}

/// Latest dashboard data; `None` where the fetch failed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardSnapshot {
    /// Aggregate statistics
    pub stats: Option<Stats>,
    /// Most recent transactions
    pub transactions: Option<Vec<TransactionRecord>>,
    /// Inventory
    pub products: Option<Vec<Product>>,
    /// Customer ledger
    pub customers: Option<Vec<Customer>>,
}

/// Client for `{base_url}/api/*`
#[derive(Debug, Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl DashboardClient {
    /// Create a client for the server at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            timeout,
        }
    }

    /// Fetch aggregate statistics
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is invalid
    pub async fn stats(&self) -> Result<Stats> {
        self.get("stats").await
    }

    /// Fetch recent transactions
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is invalid
    pub async fn transactions(&self) -> Result<Vec<TransactionRecord>> {
        self.get("transactions").await
    }

    /// Fetch the product inventory
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is invalid
    pub async fn products(&self) -> Result<Vec<Product>> {
        self.get("products").await
    }

    /// Fetch the customer ledger
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is invalid
    pub async fn customers(&self) -> Result<Vec<Customer>> {
        self.get("customers").await
    }

    /// Fetch every endpoint concurrently, keeping whatever succeeds
    pub async fn refresh(&self) -> DashboardSnapshot {
        let (stats, transactions, products, customers) = tokio::join!(
            self.stats(),
            self.transactions(),
            self.products(),
            self.customers()
        );

        DashboardSnapshot {
            stats: best_effort("stats", stats),
            transactions: best_effort("transactions", transactions),
            products: best_effort("products", products),
            customers: best_effort("customers", customers),
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}/api/{endpoint}", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

fn best_effort<T>(endpoint: &str, result: Result<T>) -> Option<T> {
    result
        .map_err(|e| tracing::warn!(endpoint, error = %e, "dashboard refresh failed"))
        .ok()
}
