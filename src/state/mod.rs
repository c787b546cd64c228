//! List view state as an explicit value with pure transitions.
//!
//! Every transition consumes the state and returns the next one, so a view can be driven
//! and tested without rendering. Fetches are tagged with a [`RequestSeq`]; a response is
//! only applied when it answers the most recently issued request.

use crate::engine::{self, Matcher, Page, PageSize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestSeq(u64);

impl RequestSeq {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListState<T> {
    items: Vec<T>,
    query: String,
    page: usize,
    error: Option<String>,
    issued: RequestSeq,
    applied: RequestSeq,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            query: String::new(),
            page: 1,
            error: None,
            issued: RequestSeq(0),
            applied: RequestSeq(0),
        }
    }
}

impl<T> ListState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn latest_issued(&self) -> RequestSeq {
        self.issued
    }

    /// Sequence of the response currently shown (0 before any load).
    pub fn applied(&self) -> RequestSeq {
        self.applied
    }

    pub fn is_loading(&self) -> bool {
        self.applied < self.issued
    }

    pub fn is_current(&self, seq: RequestSeq) -> bool {
        seq == self.issued
    }

    /// Starts a fetch; any error from an earlier one is dropped.
    pub fn issue_request(mut self) -> (Self, RequestSeq) {
        self.error = None;
        self.issued = RequestSeq(self.issued.0 + 1);
        let seq = self.issued;
        (self, seq)
    }

    pub fn set_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self.page = 1;
        self
    }

    /// Requests a page; the rendered page is clamped by [`ListState::view`].
    pub fn set_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn set_collection(mut self, seq: RequestSeq, items: Vec<T>) -> Self {
        if !self.is_current(seq) {
            return self;
        }
        self.items = items;
        self.applied = seq;
        self.error = None;
        self.page = 1;
        self
    }

    pub fn set_error(mut self, seq: RequestSeq, message: impl Into<String>) -> Self {
        if !self.is_current(seq) {
            return self;
        }
        self.applied = seq;
        self.error = Some(message.into());
        self
    }

    /// Applies the outcome of the fetch tagged `seq`.
    pub fn resolve<E>(self, seq: RequestSeq, result: Result<Vec<T>, E>) -> Self
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(items) => self.set_collection(seq, items),
            Err(e) => self.set_error(seq, e.to_string()),
        }
    }

    pub fn clear_error(mut self) -> Self {
        self.error = None;
        self
    }
}

impl<T: Clone> ListState<T> {
    pub fn view<M>(&self, page_size: PageSize, matcher: &M) -> Page<T>
    where
        M: Matcher<T> + ?Sized,
    {
        engine::paginate(&self.items, &self.query, page_size, self.page, matcher)
    }

    /// Moves to the page after the one currently rendered.
    pub fn next_page<M>(self, page_size: PageSize, matcher: &M) -> Self
    where
        M: Matcher<T> + ?Sized,
    {
        let current = self.view(page_size, matcher);
        if current.has_next() {
            self.set_page(current.page + 1)
        } else {
            self.set_page(current.page)
        }
    }

    pub fn previous_page<M>(self, page_size: PageSize, matcher: &M) -> Self
    where
        M: Matcher<T> + ?Sized,
    {
        let current = self.view(page_size, matcher);
        self.set_page(current.page.saturating_sub(1))
    }
}
