//! Rental return workflow.
//!
//! A return is validated entirely against the customer's loaded rental history before the
//! backend is contacted: the id must parse, must belong to the history, and must still be
//! outstanding. Only then is a single return request issued. Local data is never patched;
//! callers re-fetch the customer afterwards.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::client::{CatalogBackend, ClientError};
use crate::model::{Rental, RentalId};

#[derive(Debug, Error)]
pub enum ReturnError {
    #[error("invalid rental id '{input}', expected an integer")]
    InvalidInput { input: String },

    #[error("Rental ID not found in rental history")]
    NotFound { rental_id: RentalId },

    #[error("This rental has already been returned")]
    AlreadyReturned { rental_id: RentalId },

    #[error("There was an issue returning the film, please try again: {source}")]
    Remote {
        rental_id: RentalId,
        #[source]
        source: ClientError,
    },
}

impl ReturnError {
    /// True for failures detected locally, without a backend call.
    pub fn is_validation(&self) -> bool {
        !matches!(self, ReturnError::Remote { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReturnOutcome {
    pub rental_id: RentalId,
    pub film_title: String,
    pub updated: Rental,
}

pub fn parse_rental_id(input: &str) -> Result<RentalId, ReturnError> {
    input
        .trim()
        .parse::<RentalId>()
        .map_err(|_| ReturnError::InvalidInput {
            input: input.to_string(),
        })
}

/// Runs the local checks and returns the outstanding rental that would be returned.
pub fn plan_return<'a>(rentals: &'a [Rental], input: &str) -> Result<&'a Rental, ReturnError> {
    let rental_id = parse_rental_id(input)?;
    let rental = rentals
        .iter()
        .find(|r| r.rental_id == rental_id)
        .ok_or(ReturnError::NotFound { rental_id })?;
    if !rental.is_outstanding() {
        return Err(ReturnError::AlreadyReturned { rental_id });
    }
    Ok(rental)
}

#[instrument(skip(backend, rentals), fields(rentals = rentals.len()))]
pub async fn return_rental<B>(
    backend: &B,
    rentals: &[Rental],
    input: &str,
) -> Result<ReturnOutcome, ReturnError>
where
    B: CatalogBackend + ?Sized,
{
    let rental = match plan_return(rentals, input) {
        Ok(rental) => rental,
        Err(e) => {
            info!(error = %e, "return rejected locally");
            return Err(e);
        }
    };
    let rental_id = rental.rental_id;

    match backend.return_rental(rental_id).await {
        Ok(updated) => {
            info!(rental_id, "rental returned");
            Ok(ReturnOutcome {
                rental_id,
                film_title: rental.film_title.clone(),
                updated,
            })
        }
        Err(source) => {
            warn!(rental_id, error = %source, "return failed");
            Err(ReturnError::Remote { rental_id, source })
        }
    }
}
