use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::client::{self, CatalogBackend, ClientError, HttpBackend};
use crate::engine::{CustomerMatcher, EngineError, FilmMatcher, Page, PageSize};
use crate::forms::{CustomerForm, CustomerPatch, FormError, RentRequest};
use crate::model::{Actor, Customer, CustomerId, Film, FilmId, InventoryAvailability, Rental};
use crate::rental::{self, ReturnError, ReturnOutcome};
use crate::state::ListState;

#[derive(Clone, Debug)]
pub struct Options {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
    pub page_size: usize,
    pub staff_id: i64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            base_url: client::DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 10,
            proxy: None,
            page_size: 10,
            staff_id: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid base URL: {source}")]
    InvalidBaseUrl {
        #[source]
        source: ClientError,
    },

    #[error("invalid timeout {value}, expected a positive number of seconds")]
    InvalidTimeout { value: u64 },

    #[error("invalid staff id {value}, expected a positive integer")]
    InvalidStaffId { value: i64 },

    #[error(transparent)]
    Configuration(#[from] EngineError),

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("customer {id} not found")]
    CustomerNotFound { id: CustomerId },

    #[error("film {id} not found")]
    FilmNotFound { id: FilmId },

    #[error(transparent)]
    InvalidForm(#[from] FormError),

    #[error(transparent)]
    Return(#[from] ReturnError),

    #[error(transparent)]
    Remote(#[from] ClientError),
}

impl SessionError {
    /// True when the failure came from the backend or the network.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SessionError::Remote(_) | SessionError::Return(ReturnError::Remote { .. })
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Overview {
    pub films: Vec<Film>,
    pub actors: Vec<Actor>,
}

/// Entry point for the admin operations, bound to one backend.
///
/// Mutations return their result and never reload anything; callers refresh the affected
/// list afterwards.
pub struct Session<B: ?Sized = HttpBackend> {
    backend: Arc<B>,
    options: Options,
    page_size: PageSize,
}

impl<B: ?Sized> Clone for Session<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            options: self.options.clone(),
            page_size: self.page_size,
        }
    }
}

fn validate_options(options: &Options) -> Result<PageSize, SessionError> {
    if options.timeout_seconds == 0 {
        return Err(SessionError::InvalidTimeout {
            value: options.timeout_seconds,
        });
    }
    if options.staff_id <= 0 {
        return Err(SessionError::InvalidStaffId {
            value: options.staff_id,
        });
    }
    Ok(PageSize::new(options.page_size)?)
}

fn build_http_client(
    proxy: Option<&str>,
    timeout_seconds: u64,
) -> Result<reqwest::Client, SessionError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(concat!(
            "dvdadmin/",
            env!("CARGO_PKG_VERSION")
        )),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_seconds));

    if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| SessionError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| SessionError::HttpClientBuild { source: e })
}

impl Session<HttpBackend> {
    pub fn new(options: Options) -> Result<Self, SessionError> {
        let page_size = validate_options(&options)?;
        let client = build_http_client(options.proxy.as_deref(), options.timeout_seconds)?;
        let backend = HttpBackend::new(client, &options.base_url)
            .map_err(|e| SessionError::InvalidBaseUrl { source: e })?;
        debug!(base_url = backend.base_url(), "session ready");
        Ok(Self {
            backend: Arc::new(backend),
            options,
            page_size,
        })
    }
}

impl<B: CatalogBackend + ?Sized> Session<B> {
    pub fn with_backend(backend: Arc<B>, options: Options) -> Result<Self, SessionError> {
        let page_size = validate_options(&options)?;
        Ok(Self {
            backend,
            options,
            page_size,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    // customers

    /// Fetches the full customer list into `state` and returns the resolved state.
    pub async fn refresh_customers(&self, state: ListState<Customer>) -> ListState<Customer> {
        let (state, seq) = state.issue_request();
        let result = self.backend.list_customers().await;
        state.resolve(seq, result)
    }

    #[instrument(skip(self))]
    pub async fn customer_page(
        &self,
        query: &str,
        page: usize,
    ) -> Result<Page<Customer>, SessionError> {
        let customers = self.backend.list_customers().await?;
        let state = ListState::new();
        let (state, seq) = state.issue_request();
        let state = state
            .set_collection(seq, customers)
            .set_query(query)
            .set_page(page);
        Ok(state.view(self.page_size, &CustomerMatcher))
    }

    pub async fn customer(&self, id: CustomerId) -> Result<Customer, SessionError> {
        match self.backend.get_customer(id).await {
            Ok(customer) => Ok(customer),
            Err(e) if e.status() == Some(reqwest::StatusCode::NOT_FOUND) => {
                Err(SessionError::CustomerNotFound { id })
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn add_customer(&self, form: CustomerForm) -> Result<Customer, SessionError> {
        let form = form.normalized();
        form.validate()?;
        let created = self.backend.add_customer(&form).await?;
        info!(customer_id = created.customer_id, "customer added");
        Ok(created)
    }

    /// Updates a customer starting from its current values.
    #[instrument(skip(self, patch))]
    pub async fn edit_customer(
        &self,
        id: CustomerId,
        patch: CustomerPatch,
    ) -> Result<Customer, SessionError> {
        let current = self.customer(id).await?;
        let form = CustomerForm::from(&current)
            .apply(patch.clone())
            .normalized()
            .keep_cleared(&patch);
        self.save(id, form).await
    }

    #[instrument(skip(self, form))]
    pub async fn replace_customer(
        &self,
        id: CustomerId,
        form: CustomerForm,
    ) -> Result<Customer, SessionError> {
        self.save(id, form.normalized()).await
    }

    async fn save(&self, id: CustomerId, form: CustomerForm) -> Result<Customer, SessionError> {
        form.validate()?;
        let updated = self.backend.update_customer(id, &form).await?;
        info!(customer_id = id, "customer updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: CustomerId) -> Result<(), SessionError> {
        match self.backend.delete_customer(id).await {
            Ok(()) => {
                info!(customer_id = id, "customer deleted");
                Ok(())
            }
            Err(e) if e.status() == Some(reqwest::StatusCode::NOT_FOUND) => {
                Err(SessionError::CustomerNotFound { id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns a rental from the customer's current history.
    pub async fn return_rental(
        &self,
        customer_id: CustomerId,
        rental_id_input: &str,
    ) -> Result<ReturnOutcome, SessionError> {
        // Malformed ids are rejected before the customer is fetched.
        rental::parse_rental_id(rental_id_input)?;
        let customer = self.customer(customer_id).await?;
        self.return_from_history(customer.rentals(), rental_id_input).await
    }

    /// Returns a rental checked against an already loaded history.
    pub async fn return_from_history(
        &self,
        rentals: &[Rental],
        rental_id_input: &str,
    ) -> Result<ReturnOutcome, SessionError> {
        Ok(rental::return_rental(&*self.backend, rentals, rental_id_input).await?)
    }

    // films and actors

    pub async fn refresh_films(&self, state: ListState<Film>) -> ListState<Film> {
        let (state, seq) = state.issue_request();
        let result = self.backend.list_films().await;
        state.resolve(seq, result)
    }

    #[instrument(skip(self))]
    pub async fn film_page(&self, query: &str, page: usize) -> Result<Page<Film>, SessionError> {
        let films = self.backend.list_films().await?;
        let (state, seq) = ListState::new().issue_request();
        let state = state
            .set_collection(seq, films)
            .set_query(query)
            .set_page(page);
        Ok(state.view(self.page_size, &FilmMatcher))
    }

    /// Looks a film up in the catalog, then among the top rented films.
    #[instrument(skip(self))]
    pub async fn film(&self, id: FilmId) -> Result<Film, SessionError> {
        let films = self.backend.list_films().await?;
        if let Some(film) = films.into_iter().find(|f| f.film_id == id) {
            return Ok(film);
        }
        debug!(film_id = id, "film not in catalog list, checking top films");
        self.backend
            .top_films()
            .await?
            .into_iter()
            .find(|f| f.film_id == id)
            .ok_or(SessionError::FilmNotFound { id })
    }

    pub async fn top_films(&self) -> Result<Vec<Film>, SessionError> {
        Ok(self.backend.top_films().await?)
    }

    pub async fn top_actors(&self) -> Result<Vec<Actor>, SessionError> {
        Ok(self.backend.top_actors().await?)
    }

    /// Top films and actors, fetched concurrently.
    pub async fn overview(&self) -> Result<Overview, SessionError> {
        let (films, actors) =
            futures::try_join!(self.backend.top_films(), self.backend.top_actors())?;
        Ok(Overview { films, actors })
    }

    pub async fn availability(
        &self,
        film_id: FilmId,
    ) -> Result<InventoryAvailability, SessionError> {
        Ok(self.backend.film_availability(film_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn rent_film(
        &self,
        film_id: FilmId,
        customer_id: CustomerId,
        staff_id: Option<i64>,
    ) -> Result<Rental, SessionError> {
        let staff_id = staff_id.unwrap_or(self.options.staff_id);
        if staff_id <= 0 {
            return Err(SessionError::InvalidStaffId { value: staff_id });
        }
        let rental = self
            .backend
            .rent_film(RentRequest {
                film_id,
                customer_id,
                staff_id,
            })
            .await?;
        info!(rental_id = rental.rental_id, film_id, customer_id, "film rented");
        Ok(rental)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mock::MockBackend;

    fn session(backend: MockBackend) -> Session<MockBackend> {
        Session::with_backend(
            Arc::new(backend),
            Options {
                page_size: 2,
                ..Options::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn options_are_validated() {
        let zero_page = Options {
            page_size: 0,
            ..Options::default()
        };
        assert!(matches!(
            Session::new(zero_page),
            Err(SessionError::Configuration(EngineError::Configuration { value: 0 }))
        ));

        let bad_url = Options {
            base_url: "not a url".to_string(),
            ..Options::default()
        };
        assert!(matches!(
            Session::new(bad_url),
            Err(SessionError::InvalidBaseUrl { .. })
        ));

        let bad_staff = Options {
            staff_id: 0,
            ..Options::default()
        };
        assert!(matches!(
            Session::new(bad_staff),
            Err(SessionError::InvalidStaffId { value: 0 })
        ));

        assert!(Session::new(Options::default()).is_ok());
    }

    #[tokio::test]
    async fn customer_page_filters_and_paginates() {
        let s = session(MockBackend::with_sample_data());
        let page = s.customer_page("", 2).await.unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.total_matches, 3);
        assert_eq!(page.items.len(), 1);

        let page = s.customer_page("smith", 9).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].last_name, "SMITH");
    }

    #[tokio::test]
    async fn unknown_customer_maps_to_not_found() {
        let s = session(MockBackend::with_sample_data());
        let err = s.customer(404).await.unwrap_err();
        assert!(matches!(err, SessionError::CustomerNotFound { id: 404 }));
        assert!(!err.is_remote());
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_backend() {
        let backend = Arc::new(MockBackend::with_sample_data());
        let s = Session::with_backend(Arc::clone(&backend), Options::default()).unwrap();
        let err = s
            .add_customer(CustomerForm {
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                email: "nope".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidForm(_)));
        assert!(backend.saved_forms().is_empty());
    }

    #[tokio::test]
    async fn edit_keeps_unpatched_fields() {
        let backend = Arc::new(MockBackend::with_sample_data());
        let s = Session::with_backend(Arc::clone(&backend), Options::default()).unwrap();
        s.edit_customer(
            1,
            CustomerPatch {
                email: Some("mary@new.example".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let saved = backend.saved_forms();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, Some(1));
        assert_eq!(saved[0].1.first_name, "MARY");
        assert_eq!(saved[0].1.email, "mary@new.example");
        assert_eq!(saved[0].1.city.as_deref(), Some("Lethbridge"));
    }

    #[tokio::test]
    async fn edit_with_blank_city_clears_it() {
        let backend = Arc::new(MockBackend::with_sample_data());
        let s = Session::with_backend(Arc::clone(&backend), Options::default()).unwrap();
        s.edit_customer(
            1,
            CustomerPatch {
                city: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let saved = backend.saved_forms();
        assert_eq!(saved[0].1.city, Some(String::new()));
        assert_eq!(saved[0].1.address.as_deref(), Some("1913 Hanoi Way"));
    }

    #[tokio::test]
    async fn delete_reaches_backend_once() {
        let backend = Arc::new(MockBackend::with_sample_data());
        let s = Session::with_backend(Arc::clone(&backend), Options::default()).unwrap();
        s.delete_customer(2).await.unwrap();
        assert_eq!(backend.deleted_ids(), vec![2]);
        assert!(matches!(
            s.delete_customer(99).await,
            Err(SessionError::CustomerNotFound { id: 99 })
        ));
    }

    #[tokio::test]
    async fn return_uses_fresh_customer_history() {
        let backend = Arc::new(MockBackend::with_sample_data());
        let s = Session::with_backend(Arc::clone(&backend), Options::default()).unwrap();

        let outcome = s.return_rental(1, "76").await.unwrap();
        assert_eq!(outcome.rental_id, 76);
        assert_eq!(backend.returned_ids(), vec![76]);

        let err = s.return_rental(1, "573").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Return(ReturnError::AlreadyReturned { rental_id: 573 })
        ));
        assert_eq!(backend.returned_ids(), vec![76]);
    }

    #[tokio::test]
    async fn rent_defaults_staff_from_options() {
        let backend = Arc::new(MockBackend::with_sample_data());
        let s = Session::with_backend(
            Arc::clone(&backend),
            Options {
                staff_id: 2,
                ..Options::default()
            },
        )
        .unwrap();
        s.rent_film(10, 1, None).await.unwrap();
        s.rent_film(11, 1, Some(1)).await.unwrap();
        let rents = backend.rent_requests();
        assert_eq!(rents[0].staff_id, 2);
        assert_eq!(rents[1].staff_id, 1);
    }

    #[tokio::test]
    async fn film_lookup_falls_back_to_top_films() {
        let s = session(MockBackend::with_sample_data().with_top_only_film(
            crate::tests::mock::film(90, "ZORRO ARK", "Comedy", ("IAN", "TANDY")),
        ));
        assert_eq!(s.film(2).await.unwrap().title, "ACE GOLDFINGER");
        assert_eq!(s.film(90).await.unwrap().title, "ZORRO ARK");
        assert!(matches!(
            s.film(404).await,
            Err(SessionError::FilmNotFound { id: 404 })
        ));
    }

    #[tokio::test]
    async fn page_zero_is_clamped_to_first_page() {
        let s = session(MockBackend::with_sample_data());
        let page = s.customer_page("", 0).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.items[0].customer_id, 1);
    }

    #[tokio::test]
    async fn overview_fetches_films_and_actors() {
        let s = session(MockBackend::with_sample_data());
        let overview = s.overview().await.unwrap();
        assert_eq!(overview.films.len(), 2);
        assert_eq!(overview.actors.len(), 1);
    }

    #[tokio::test]
    async fn refresh_records_remote_errors_in_state() {
        let s = session(MockBackend::default().failing_lists());
        let state = s.refresh_customers(ListState::new()).await;
        assert!(state.error().is_some());
        assert!(state.items().is_empty());
    }
}
