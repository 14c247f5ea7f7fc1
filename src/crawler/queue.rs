use crate::urls;
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// Selects the processor a request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    RankingsPage,
    TeamDetail,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::RankingsPage => write!(f, "RANKINGS_PAGE"),
            Label::TeamDetail => write!(f, "TEAM_DETAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub url: String,
    pub label: Label,
    pub retry_count: u32,
}

impl Request {
    pub fn new(url: impl Into<String>, label: Label) -> Self {
        Self {
            url: url.into(),
            label,
            retry_count: 0,
        }
    }

    pub fn unique_key(&self) -> String {
        urls::normalize(&self.url)
    }
}

/// FIFO queue that accepts each unique key once per run
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: VecDeque<Request>,
    seen: HashSet<String>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the URL was already queued or handled
    pub fn add(&mut self, request: Request) -> bool {
        if !self.seen.insert(request.unique_key()) {
            return false;
        }
        self.pending.push_back(request);
        true
    }

    /// Put a failed request back for another attempt
    pub fn retry(&mut self, mut request: Request) {
        request.retry_count += 1;
        self.pending.push_back(request);
    }

    pub fn pop(&mut self) -> Option<Request> {
        self.pending.pop_front()
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
