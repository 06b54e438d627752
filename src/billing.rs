//! Bill retrieval from the billing artifact store

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};

use crate::transaction::TransactionId;
use crate::{Error, Result};

/// Client for `GET {base_url}/download-bill/{id}`
#[derive(Debug, Clone)]
pub struct BillingClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BillingClient {
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

    /// URL the bill document is served from
    ///
    /// The id is pushed as a single escaped path segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL cannot carry a path
    pub fn bill_url(&self, id: &TransactionId) -> Result<Url> {
        let invalid = || Error::Config(format!("invalid server url '{}'", self.base_url));

        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .push("download-bill")
            .push(id.as_str());
        Ok(url)
    }

    /// Download the bill document (PDF bytes)
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the store has no bill for `id`, or an
    /// HTTP error for any other failure
    pub async fn download(&self, id: &TransactionId) -> Result<Vec<u8>> {
        let url = self.bill_url(id)?;
        tracing::debug!(url = %url, "downloading bill");

        let response = self.client.get(url).timeout(self.timeout).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("bill {id}")));
        }

        let bytes = response.error_for_status()?.bytes().await?;
        tracing::info!(transaction_id = %id, bytes = bytes.len(), "bill downloaded");
        Ok(bytes.to_vec())
    }

    /// Download the bill and write it as `Bill_{id}.pdf` under `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the download or the file write fails
    pub async fn save(&self, id: &TransactionId, dir: &Path) -> Result<PathBuf> {
        let bytes = self.download(id).await?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(bill_file_name(id));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

/// File name for a saved bill
#[must_use]
pub fn bill_file_name(id: &TransactionId) -> String {
    let safe: String = id
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("Bill_{safe}.pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bill_url() {
        let client = BillingClient::new("http://127.0.0.1:8000/", Duration::from_secs(5));
        assert_eq!(
            client.bill_url(&TransactionId::new("TXN123")).unwrap().as_str(),
            "http://127.0.0.1:8000/download-bill/TXN123"
        );

        let nested = BillingClient::new("http://shop.local/pos", Duration::from_secs(5));
        assert_eq!(
            nested.bill_url(&TransactionId::new("7")).unwrap().as_str(),
            "http://shop.local/pos/download-bill/7"
        );
    }

    #[test]
    fn test_bill_url_escapes_id() {
        let client = BillingClient::new("http://127.0.0.1:8000", Duration::from_secs(5));
        let url = client.bill_url(&TransactionId::new("a/b?c#d")).unwrap();

        assert_eq!(url.path(), "/download-bill/a%2Fb%3Fc%23d");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_bill_url_rejects_bad_base() {
        let client = BillingClient::new("not a url", Duration::from_secs(5));
        assert!(matches!(
            client.bill_url(&TransactionId::new("1")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_bill_file_name_is_path_safe() {
        assert_eq!(bill_file_name(&TransactionId::new("42")), "Bill_42.pdf");
        assert_eq!(bill_file_name(&TransactionId::new("../x")), "Bill____x.pdf");
    }
}
