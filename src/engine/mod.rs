//! List filtering and pagination over fully loaded collections.
//!
//! Everything here is pure: the same collection, query and page always render the same
//! [`Page`]. The backend never paginates, so the whole collection is filtered locally and
//! then sliced.

use std::num::NonZeroUsize;

use serde::Serialize;
use thiserror::Error;

use crate::model::{Customer, Film};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid page size {value}, expected a positive integer")]
    Configuration { value: usize },
}

/// A page size that is known to be positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageSize(NonZeroUsize);

impl PageSize {
    pub fn new(value: usize) -> Result<Self, EngineError> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or(EngineError::Configuration { value })
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(NonZeroUsize::MIN.saturating_add(9))
    }
}

/// Decides whether an item matches an already-normalized query.
pub trait Matcher<T: ?Sized> {
    fn matches(&self, item: &T, normalized_query: &str) -> bool;
}

impl<T: ?Sized, F> Matcher<T> for F
where
    F: Fn(&T, &str) -> bool,
{
    fn matches(&self, item: &T, normalized_query: &str) -> bool {
        self(item, normalized_query)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CustomerMatcher;

impl Matcher<Customer> for CustomerMatcher {
    fn matches(&self, customer: &Customer, q: &str) -> bool {
        customer.customer_id.to_string().contains(q)
            || customer.first_name.to_lowercase().contains(q)
            || customer.last_name.to_lowercase().contains(q)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FilmMatcher;

impl Matcher<Film> for FilmMatcher {
    fn matches(&self, film: &Film, q: &str) -> bool {
        film.title.to_lowercase().contains(q)
            || film
                .category_names()
                .any(|name| name.to_lowercase().contains(q))
            || film
                .film_actors
                .iter()
                .any(|a| a.full_name().to_lowercase().contains(q))
    }
}

pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

pub fn filter<'a, T, M>(items: &'a [T], query: &str, matcher: &M) -> Vec<&'a T>
where
    M: Matcher<T> + ?Sized,
{
    let q = normalize_query(query);
    if q.is_empty() {
        return items.iter().collect();
    }
    items.iter().filter(|item| matcher.matches(item, &q)).collect()
}

pub fn total_pages(matches: usize, page_size: PageSize) -> usize {
    matches.div_ceil(page_size.get()).max(1)
}

pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            total_pages: self.total_pages,
            total_matches: self.total_matches,
        }
    }
}

/// Filters `items` with `matcher` and returns the requested page, clamped into range.
pub fn paginate<T, M>(
    items: &[T],
    query: &str,
    page_size: PageSize,
    page: usize,
    matcher: &M,
) -> Page<T>
where
    T: Clone,
    M: Matcher<T> + ?Sized,
{
    let matched = filter(items, query, matcher);
    let total_matches = matched.len();
    let total_pages = total_pages(total_matches, page_size);
    let page = clamp_page(page, total_pages);
    let start = (page - 1) * page_size.get();
    let items = matched
        .into_iter()
        .skip(start)
        .take(page_size.get())
        .cloned()
        .collect();
    Page {
        items,
        page,
        total_pages,
        total_matches,
    }
}

/// Same as [`paginate`] for callers holding an unchecked page size.
pub fn paginate_with_size<T, M>(
    items: &[T],
    query: &str,
    page_size: usize,
    page: usize,
    matcher: &M,
) -> Result<Page<T>, EngineError>
where
    T: Clone,
    M: Matcher<T> + ?Sized,
{
    let page_size = PageSize::new(page_size)?;
    Ok(paginate(items, query, page_size, page, matcher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FilmActor, FilmCategory};
    use proptest::prelude::*;

    fn customer(id: i64, first: &str, last: &str) -> Customer {
        Customer {
            customer_id: id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            ..Default::default()
        }
    }

    fn film(id: i64, title: &str, category: &str, actor: (&str, &str)) -> Film {
        Film {
            film_id: id,
            title: title.to_string(),
            film_categories: vec![FilmCategory {
                category_id: 1,
                film_id: id,
                category_name: category.to_string(),
            }],
            film_actors: vec![FilmActor {
                film_id: id,
                actor_id: 10,
                first_name: actor.0.to_string(),
                last_name: actor.1.to_string(),
            }],
            ..Default::default()
        }
    }

    fn size(n: usize) -> PageSize {
        PageSize::new(n).unwrap()
    }

    #[test]
    fn zero_page_size_is_a_configuration_error() {
        assert_eq!(
            PageSize::new(0),
            Err(EngineError::Configuration { value: 0 })
        );
        let items = vec![1, 2, 3];
        let err = paginate_with_size(&items, "", 0, 1, &|_: &i32, _: &str| true).unwrap_err();
        assert_eq!(err, EngineError::Configuration { value: 0 });
    }

    #[test]
    fn default_page_size_is_ten() {
        assert_eq!(PageSize::default().get(), 10);
    }

    #[test]
    fn customer_matcher_checks_id_and_names_case_insensitively() {
        let customers = vec![
            customer(1, "MARY", "SMITH"),
            customer(12, "Patricia", "Johnson"),
            customer(300, "Linda", "Williams"),
        ];
        let ids = |q: &str| -> Vec<i64> {
            filter(&customers, q, &CustomerMatcher)
                .iter()
                .map(|c| c.customer_id)
                .collect()
        };
        assert_eq!(ids("mary"), vec![1]);
        assert_eq!(ids("JOHN"), vec![12]);
        assert_eq!(ids("1"), vec![1, 12]);
        assert_eq!(ids("  "), vec![1, 12, 300]);
        assert!(ids("nobody").is_empty());
    }

    #[test]
    fn film_matcher_checks_title_categories_and_cast() {
        let films = vec![
            film(1, "ACADEMY DINOSAUR", "Documentary", ("PENELOPE", "GUINESS")),
            film(2, "ACE GOLDFINGER", "Horror", ("BOB", "FAWCETT")),
        ];
        let ids = |q: &str| -> Vec<i64> {
            filter(&films, q, &FilmMatcher)
                .iter()
                .map(|f| f.film_id)
                .collect()
        };
        assert_eq!(ids("dinosaur"), vec![1]);
        assert_eq!(ids("horror"), vec![2]);
        assert_eq!(ids("bob fawcett"), vec![2]);
        assert_eq!(ids("ac"), vec![1, 2]);
    }

    #[test]
    fn empty_result_still_has_one_page() {
        let items: Vec<i32> = Vec::new();
        let page = paginate(&items, "", size(10), 1, &|_: &i32, _: &str| true);
        assert!(page.is_empty());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.page, 1);
        assert!(!page.has_next());
        assert!(!page.has_previous());
    }

    #[test]
    fn out_of_range_pages_are_clamped() {
        let items: Vec<i32> = (1..=25).collect();
        let all = |_: &i32, _: &str| true;

        let first = paginate(&items, "", size(10), 0, &all);
        assert_eq!(first.page, 1);
        assert_eq!(first.items, (1..=10).collect::<Vec<_>>());

        let last = paginate(&items, "", size(10), 99, &all);
        assert_eq!(last.page, 3);
        assert_eq!(last.total_pages, 3);
        assert_eq!(last.items, vec![21, 22, 23, 24, 25]);
        assert!(last.has_previous());
        assert!(!last.has_next());
    }

    fn contains_digit(item: &u32, q: &str) -> bool {
        item.to_string().contains(q)
    }

    proptest! {
        #[test]
        fn pages_concatenate_to_the_filtered_collection(
            items in proptest::collection::vec(0u32..500, 0..80),
            query in "[0-9]{0,2}",
            page_size in 1usize..12,
        ) {
            let expected: Vec<u32> = filter(&items, &query, &contains_digit)
                .into_iter()
                .copied()
                .collect();
            let first = paginate(&items, &query, size(page_size), 1, &contains_digit);
            let mut joined = Vec::new();
            for page in 1..=first.total_pages {
                let p = paginate(&items, &query, size(page_size), page, &contains_digit);
                prop_assert_eq!(p.page, page);
                joined.extend(p.items);
            }
            prop_assert_eq!(joined, expected);
        }

        #[test]
        fn filtering_is_idempotent(
            items in proptest::collection::vec(0u32..500, 0..80),
            query in "[0-9 ]{0,3}",
        ) {
            let once: Vec<u32> = filter(&items, &query, &contains_digit)
                .into_iter()
                .copied()
                .collect();
            let twice: Vec<u32> = filter(&once, &query, &contains_digit)
                .into_iter()
                .copied()
                .collect();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn empty_query_is_identity(items in proptest::collection::vec(0u32..500, 0..40)) {
            let out: Vec<u32> = filter(&items, "", &contains_digit).into_iter().copied().collect();
            prop_assert_eq!(out, items);
        }
    }
}
