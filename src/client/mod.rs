//! Typed access to the catalog REST backend.
//!
//! [`CatalogBackend`] is the seam the rest of the crate talks to; [`HttpBackend`] is the
//! reqwest implementation. Every call is a single request with no retry.

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::forms::{CustomerForm, RentRequest, ReturnRequest};
use crate::model::{
    Actor, Customer, CustomerId, Film, FilmId, InventoryAvailability, Rental, RentalId,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("{method} {url} returned {status}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ClientError::Timeout {
                url: url.to_string(),
            }
        } else if source.is_decode() {
            ClientError::Decode {
                url: url.to_string(),
                source,
            }
        } else {
            ClientError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn list_customers(&self) -> Result<Vec<Customer>, ClientError>;
    async fn get_customer(&self, id: CustomerId) -> Result<Customer, ClientError>;
    async fn add_customer(&self, form: &CustomerForm) -> Result<Customer, ClientError>;
    async fn update_customer(
        &self,
        id: CustomerId,
        form: &CustomerForm,
    ) -> Result<Customer, ClientError>;
    async fn delete_customer(&self, id: CustomerId) -> Result<(), ClientError>;

    async fn list_films(&self) -> Result<Vec<Film>, ClientError>;
    async fn top_films(&self) -> Result<Vec<Film>, ClientError>;
    async fn top_actors(&self) -> Result<Vec<Actor>, ClientError>;
    async fn film_availability(
        &self,
        film_id: FilmId,
    ) -> Result<InventoryAvailability, ClientError>;

    async fn rent_film(&self, request: RentRequest) -> Result<Rental, ClientError>;
    async fn return_rental(&self, rental_id: RentalId) -> Result<Rental, ClientError>;
}

#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

/// Validates and normalizes a base URL (no trailing slash).
pub fn normalize_base_url(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|e| ClientError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ClientError::InvalidUrl {
            url: raw.to_string(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(trimmed.to_string())
}

impl HttpBackend {
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ClientError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.endpoint(path);
        debug!(%method, %url, "sending request");
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| {
            let err = ClientError::from_reqwest(&url, e);
            warn!(%method, %url, error = %err, "request failed");
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%method, %url, %status, "backend returned error status");
            return Err(ClientError::Status {
                method,
                url,
                status,
                body,
            });
        }
        debug!(%method, %url, %status, "response received");
        Ok(response)
    }

    async fn json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        let response = self.send(method, path, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, e))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.json::<(), T>(Method::GET, path, None).await
    }
}

#[async_trait]
impl CatalogBackend for HttpBackend {
    async fn list_customers(&self) -> Result<Vec<Customer>, ClientError> {
        self.get("customers").await
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, ClientError> {
        self.get(&format!("customers/{id}")).await
    }

    async fn add_customer(&self, form: &CustomerForm) -> Result<Customer, ClientError> {
        self.json(Method::POST, "customers", Some(form)).await
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        form: &CustomerForm,
    ) -> Result<Customer, ClientError> {
        self.json(Method::PUT, &format!("customers/{id}"), Some(form)).await
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<(), ClientError> {
        self.send::<()>(Method::DELETE, &format!("customers/{id}"), None)
            .await
            .map(|_| ())
    }

    async fn list_films(&self) -> Result<Vec<Film>, ClientError> {
        self.get("films").await
    }

    async fn top_films(&self) -> Result<Vec<Film>, ClientError> {
        self.get("films/top5").await
    }

    async fn top_actors(&self) -> Result<Vec<Actor>, ClientError> {
        self.get("actors/top5").await
    }

    async fn film_availability(
        &self,
        film_id: FilmId,
    ) -> Result<InventoryAvailability, ClientError> {
        self.get(&format!("inventory/availability/{film_id}")).await
    }

    async fn rent_film(&self, request: RentRequest) -> Result<Rental, ClientError> {
        self.json(Method::POST, "rentals/rent", Some(&request)).await
    }

    async fn return_rental(&self, rental_id: RentalId) -> Result<Rental, ClientError> {
        let body = ReturnRequest { rental_id };
        self.json(Method::PUT, "rentals/return", Some(&body)).await
    }
}
