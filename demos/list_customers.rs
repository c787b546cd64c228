use std::error::Error;

use dvdadmin::session::{Options, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let session = Session::new(Options {
        base_url: "http://localhost:8080/api".to_string(),
        page_size: 5,
        timeout_seconds: 5,
        ..Options::default()
    })?;
    let page = session.customer_page("smith", 1).await?;

    println!(
        "Page {} of {} ({} matches)",
        page.page, page.total_pages, page.total_matches
    );
    for c in page.items.iter() {
        println!("{} {} {}", c.customer_id, c.full_name(), c.email);
    }

    Ok(())
}
