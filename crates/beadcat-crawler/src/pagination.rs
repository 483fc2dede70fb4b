//! The crawl frontier: listing pages waiting to be fetched.
//!
//! Every URL is scheduled at most once per run, and no more than
//! `max_pages` URLs are ever scheduled in total.

use std::collections::{HashSet, VecDeque};

use reqwest::Url;

#[derive(Debug)]
pub(crate) struct Frontier {
    queue: VecDeque<Url>,
    seen: HashSet<Url>,
    scheduled: usize,
    max_pages: Option<usize>,
}

impl Frontier {
    pub(crate) fn new(max_pages: Option<usize>) -> Self {
        Self {
            queue: VecDeque::new(),
            seen: HashSet::new(),
            scheduled: 0,
            max_pages,
        }
    }

    /// Records a page fetched outside the queue (the seed) against the
    /// budget and the seen set.
    pub(crate) fn mark_fetched(&mut self, url: &Url) {
        if self.seen.insert(url.clone()) {
            self.scheduled += 1;
        }
    }

    /// Marks `url` as seen without charging the budget, e.g. the address a
    /// seed request was redirected to.
    pub(crate) fn mark_seen(&mut self, url: &Url) {
        self.seen.insert(url.clone());
    }

    /// Queues `url` unless it was seen before or the page budget is spent.
    /// Returns whether the URL was queued.
    pub(crate) fn push(&mut self, url: Url) -> bool {
        if self.budget_spent() || self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.queue.push_back(url);
        self.scheduled += 1;
        true
    }

    pub(crate) fn pop(&mut self) -> Option<Url> {
        self.queue.pop_front()
    }

    pub(crate) fn budget_spent(&self) -> bool {
        self.max_pages.is_some_and(|max| self.scheduled >= max)
    }
}
