use colored::Colorize;
use itertools::Itertools;
use serde::Serialize;
use tracing::warn;

use crate::engine::Page;
use crate::model::{
    display_date, sort_rentals_for_display, Actor, Customer, Film, FilmId, InventoryAvailability,
    Rental,
};
use crate::rental::ReturnOutcome;
use crate::session::Overview;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn format_kv_line(key: &str, value: &str) -> String {
    format!(":: {:<10}: {}", key, value)
}

fn render_json<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = serde_json::to_vec_pretty(value).unwrap_or_else(|e| {
        warn!(error = %e, "failed to serialize output as JSON");
        b"null".to_vec()
    });
    out.push(b'\n');
    out
}

fn render<T, F>(value: &T, format: OutputFormat, text: F) -> Vec<u8>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Json => render_json(value),
        OutputFormat::Text => text(value).into_bytes(),
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

fn page_footer<T>(page: &Page<T>) -> String {
    let mut out = format!(
        "Page {} of {} ({} matches)",
        page.page, page.total_pages, page.total_matches
    )
    .dimmed()
    .to_string();
    out.push('\n');
    out
}

fn no_results() -> String {
    format!("{}\n", "No results".yellow())
}

fn customer_row(c: &Customer) -> String {
    format!(
        "{:<6} {:<28} {:<36} {:<18} {}",
        c.customer_id,
        truncate(&c.full_name(), 28),
        truncate(&c.email, 36),
        truncate(or_na(&c.city), 18),
        c.outstanding_rentals()
    )
}

fn customer_table(page: &Page<Customer>) -> String {
    if page.is_empty() {
        return no_results();
    }
    let header = format!(
        "{:<6} {:<28} {:<36} {:<18} {}",
        "ID", "Name", "Email", "City", "Out"
    );
    let mut out = format!("{}\n", header.bold());
    for c in &page.items {
        out.push_str(&customer_row(c));
        out.push('\n');
    }
    out.push_str(&page_footer(page));
    out
}

pub fn render_customer_page(page: &Page<Customer>, format: OutputFormat) -> Vec<u8> {
    render(page, format, customer_table)
}

fn rental_table(rentals: &[Rental]) -> String {
    if rentals.is_empty() {
        return format!("{}\n", "No rentals".yellow());
    }
    let header = format!(
        "{:<8} {:<28} {:<12} {:<12} {}",
        "Rental", "Film", "Rented", "Returned", "Staff"
    );
    let mut out = format!("{}\n", header.bold());
    for r in sort_rentals_for_display(rentals) {
        let returned = match &r.return_date {
            Some(date) => display_date(date),
            None => "N/A".red().to_string(),
        };
        out.push_str(&format!(
            "{:<8} {:<28} {:<12} {:<12} {}\n",
            r.rental_id,
            truncate(&r.film_title, 28),
            display_date(&r.rental_date),
            returned,
            r.staff_id
        ));
    }
    out
}

fn customer_detail(c: &Customer) -> String {
    let mut lines = vec![
        format_kv_line("Customer", &c.customer_id.to_string()),
        format_kv_line("Name", &c.full_name()),
        format_kv_line("Email", &c.email),
        format_kv_line("Address", or_na(&c.address)),
        format_kv_line("City", or_na(&c.city)),
        format_kv_line("District", or_na(&c.district)),
        format_kv_line("Country", or_na(&c.country)),
        format_kv_line("Postal", or_na(&c.postal_code)),
        format_kv_line("Phone", or_na(&c.phone)),
    ];
    if !c.create_date.is_empty() {
        lines.push(format_kv_line("Created", &display_date(&c.create_date)));
    }
    let mut out = lines.join("\n");
    out.push_str(&format!("\n\n{}\n", "Rental history".bold()));
    out.push_str(&rental_table(c.rentals()));
    out
}

pub fn render_customer(customer: &Customer, format: OutputFormat) -> Vec<u8> {
    render(customer, format, customer_detail)
}

fn film_row(f: &Film) -> String {
    format!(
        "{:<6} {:<28} {:<6} {:<6} {:<20} {}",
        f.film_id,
        truncate(&f.title, 28),
        or_na(&f.release_year),
        format!("{:.2}", f.rental_rate),
        truncate(&f.category_names().join(", "), 20),
        truncate(&f.film_actors.iter().map(|a| a.full_name()).join(", "), 40)
    )
}

fn film_table(films: &[Film]) -> String {
    if films.is_empty() {
        return no_results();
    }
    let header = format!(
        "{:<6} {:<28} {:<6} {:<6} {:<20} {}",
        "ID", "Title", "Year", "Rate", "Categories", "Actors"
    );
    let mut out = format!("{}\n", header.bold());
    for f in films {
        out.push_str(&film_row(f));
        out.push('\n');
    }
    out
}

fn film_detail(f: &Film) -> String {
    let money = |v: f64| format!("${v:.2}");
    let names = |v: String| if v.is_empty() { "N/A".to_string() } else { v };
    let original_language = f
        .original_language_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let mut out = format!("{}\n", f.title.bold());
    let rows = [
        format_kv_line("Film", &f.film_id.to_string()),
        format_kv_line("Year", or_na(&f.release_year)),
        format_kv_line("Rating", or_na(&f.rating)),
        format_kv_line("Length", &format!("{} min", f.length)),
        format_kv_line("Duration", &format!("{} days", f.rental_duration)),
        format_kv_line("Rate", &money(f.rental_rate)),
        format_kv_line("Cost", &money(f.replacement_cost)),
        format_kv_line("Features", or_na(&f.special_features)),
        format_kv_line("Language", &f.language_id.to_string()),
        format_kv_line("Original", &original_language),
        format_kv_line("Categories", &names(f.category_names().join(", "))),
        format_kv_line(
            "Actors",
            &names(f.film_actors.iter().map(|a| a.full_name()).join(", ")),
        ),
    ];
    out.push_str(&rows.join("\n"));
    out.push('\n');
    if !f.description.trim().is_empty() {
        out.push_str(&format!("\n{}\n", f.description.trim()));
    }
    out
}

pub fn render_film(film: &Film, format: OutputFormat) -> Vec<u8> {
    render(film, format, film_detail)
}

pub fn render_film_page(page: &Page<Film>, format: OutputFormat) -> Vec<u8> {
    render(page, format, |p| {
        if p.is_empty() {
            return no_results();
        }
        let mut out = film_table(&p.items);
        out.push_str(&page_footer(p));
        out
    })
}

pub fn render_films(films: &[Film], format: OutputFormat) -> Vec<u8> {
    render(films, format, film_table)
}

fn actor_lines(actors: &[Actor]) -> String {
    if actors.is_empty() {
        return no_results();
    }
    let mut out = String::new();
    for (rank, a) in actors.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} (ID {})\n",
            rank + 1,
            a.full_name().bold(),
            a.actor_id
        ));
        if !a.bio.trim().is_empty() {
            out.push_str(&format!("   {}\n", truncate(a.bio.trim(), 76)));
        }
        if !a.top_rented_films.is_empty() {
            out.push_str(&format!(
                "   Top rented: {}\n",
                a.top_rented_films.iter().map(|f| f.title.as_str()).join(", ")
            ));
        }
    }
    out
}

pub fn render_actors(actors: &[Actor], format: OutputFormat) -> Vec<u8> {
    render(actors, format, actor_lines)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityRecord<'a> {
    film_id: FilmId,
    #[serde(flatten)]
    counts: &'a InventoryAvailability,
}

pub fn render_availability(
    film_id: FilmId,
    availability: &InventoryAvailability,
    format: OutputFormat,
) -> Vec<u8> {
    let record = AvailabilityRecord {
        film_id,
        counts: availability,
    };
    render(&record, format, |r| {
        let available = if r.counts.available_count > 0 {
            r.counts.available_count.to_string().green()
        } else {
            r.counts.available_count.to_string().red()
        };
        format!(
            "{}\n{}\n{}\n",
            format_kv_line("Film", &r.film_id.to_string()),
            format_kv_line("Available", &available.to_string()),
            format_kv_line("Rented", &r.counts.rented_count.to_string())
        )
    })
}

pub fn render_overview(overview: &Overview, format: OutputFormat) -> Vec<u8> {
    render(overview, format, |o| {
        format!(
            "{}\n{}\n{}\n{}",
            "Top films".bold().underline(),
            film_table(&o.films),
            "Top actors".bold().underline(),
            actor_lines(&o.actors)
        )
    })
}

pub fn render_rental(rental: &Rental, format: OutputFormat) -> Vec<u8> {
    render(rental, format, |r| {
        format!(
            "{} rental {} on {} (staff {})\n",
            "Rented".green(),
            r.rental_id,
            display_date(&r.rental_date),
            r.staff_id
        )
    })
}

pub fn render_return(outcome: &ReturnOutcome, format: OutputFormat) -> Vec<u8> {
    render(outcome, format, |o| {
        let when = o
            .updated
            .return_date
            .as_deref()
            .map(display_date)
            .unwrap_or_else(|| "N/A".to_string());
        format!(
            "{} rental {} ({}) on {}\n",
            "Returned".green(),
            o.rental_id,
            o.film_title,
            when
        )
    })
}
