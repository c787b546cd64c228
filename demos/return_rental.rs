use std::error::Error;

use dvdadmin::session::{Options, Session, SessionError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let session = Session::new(Options::default())?;
    let customer_id = 1;

    let customer = session.customer(customer_id).await?;
    let Some(open) = customer.rentals().iter().find(|r| r.is_outstanding()) else {
        println!("{} has nothing to return", customer.full_name());
        return Ok(());
    };

    match session
        .return_rental(customer_id, &open.rental_id.to_string())
        .await
    {
        Ok(outcome) => println!("Returned {} ({})", outcome.rental_id, outcome.film_title),
        Err(SessionError::Return(e)) if e.is_validation() => println!("Rejected: {e}"),
        Err(e) => return Err(e.into()),
    }

    // Reload to see the updated history.
    let customer = session.customer(customer_id).await?;
    println!("Outstanding now: {}", customer.outstanding_rentals());

    Ok(())
}
