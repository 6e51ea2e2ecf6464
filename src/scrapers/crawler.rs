use crate::models::{CrawlState, ListingRecord, Termination};
use crate::scrapers::error::SessionError;
use crate::scrapers::extract::{extract_record, ExtractionProfile};
use crate::scrapers::pagination::{derive_next_page_url, OffsetPaging};
use crate::scrapers::traits::{BrowserSession, ResultSink};
use crate::scrapers::types::CrawlerConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

/// Outcome of one pass over the current page
enum Step {
    /// A new page is loaded; the retry budget starts over
    NextPage,
    /// Stay on this page and try again
    RetrySamePage,
    Stop(Termination),
}

/// Drives one browser session through load, scroll, extract and paginate cycles
pub struct PageCrawler<S: BrowserSession> {
    session: S,
    config: CrawlerConfig,
    stop: Arc<AtomicBool>,
}

impl<S: BrowserSession> PageCrawler<S> {
    pub fn new(session: S, config: CrawlerConfig) -> Self {
        Self {
            session,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Flag that, once raised, ends the current crawl at its next cap check
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn paging(&self) -> OffsetPaging {
        OffsetPaging {
            min_items: self.config.min_listings_per_page,
            page_size: self.config.standard_page_size,
        }
    }

    /// Navigate to a seed URL and give the page time to render
    pub fn open_seed(&mut self, seed_url: &str) -> Result<(), SessionError> {
        self.session.navigate(seed_url)?;
        pause(self.config.timings.initial_wait);
        Ok(())
    }

    /// Scroll through the page until its height stops growing.
    ///
    /// A round counts as stalled only if the height is unchanged both after the
    /// incremental scroll and after an extra jump to the bottom. Returns after
    /// `stall_rounds` stalled rounds or `max_scroll_rounds` rounds in total,
    /// whichever comes first.
    pub fn ensure_content_loaded(&mut self) -> Result<(), SessionError> {
        let limits = &self.config.limits;
        let timings = &self.config.timings;
        let session = &mut self.session;

        let mut last_height = session.page_height()?;
        let mut stalled = 0;
        let mut rounds = 0;

        while stalled < limits.stall_rounds && rounds < limits.max_scroll_rounds {
            rounds += 1;

            let step = last_height / f64::from(limits.scroll_steps.max(1));
            for _ in 0..limits.scroll_steps {
                session.scroll_by(step)?;
                pause(timings.scroll_step_pause);
            }
            pause(timings.scroll_round_pause);

            // Nudge to wake up stalled lazy loaders
            session.scroll_by(-limits.nudge_px)?;
            pause(timings.nudge_pause);
            session.scroll_by(limits.nudge_px)?;

            let mut new_height = session.page_height()?;
            if new_height == last_height {
                pause(timings.scroll_round_pause * 2);
                session.scroll_to_bottom()?;
                pause(timings.bottom_wait);
                new_height = session.page_height()?;
                if new_height == last_height {
                    stalled += 1;
                }
            }
            last_height = new_height;
        }

        debug!(rounds, stalled, height = last_height, "Content loading finished");
        Ok(())
    }

    /// Query listing containers, waiting and retrying while none are present
    pub fn collect_visible_listings(&mut self, max_attempts: u32) -> Vec<S::Element> {
        for attempt in 1..=max_attempts {
            match self.session.find_elements(&self.config.profile.listing_selector) {
                Ok(listings) if !listings.is_empty() => return listings,
                Ok(_) => debug!(attempt, "No listings rendered yet"),
                Err(e) => error!(attempt, "Error getting listings: {}", e),
            }
            if attempt < max_attempts {
                pause(self.config.timings.listing_retry_pause);
            }
        }
        Vec::new()
    }

    /// Look for a usable "next page" control, loading more content between passes
    pub fn find_next_control(&mut self) -> Result<Option<S::Element>, SessionError> {
        let attempts = self.config.limits.next_control_attempts;

        for attempt in 1..=attempts {
            for selector in &self.config.profile.next_selectors {
                let candidates = match self.session.find_elements(selector) {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        debug!(selector = %selector, "Error finding next button: {}", e);
                        continue;
                    }
                };

                for candidate in candidates {
                    if !is_usable_control(&mut self.session, &self.config.profile, &candidate) {
                        continue;
                    }
                    if let Err(e) = self.session.scroll_into_view(&candidate) {
                        debug!(selector = %selector, "Next button went away: {}", e);
                        continue;
                    }
                    pause(self.config.timings.reveal_pause);
                    return Ok(Some(candidate));
                }
            }

            if attempt < attempts {
                pause(self.config.timings.next_control_retry_pause);
                self.ensure_content_loaded()?;
            }
        }

        Ok(None)
    }

    /// Crawl from the current page until the state is full or pagination ends
    pub fn crawl_cycle(&mut self, state: &mut CrawlState) -> Termination {
        let max_retries = self.config.max_retries_per_page;
        let mut retry = 0;

        loop {
            let step = match self.visit_page(state, retry) {
                Ok(step) => step,
                Err(e) => {
                    error!(retry, "Error during page parsing: {}", e);
                    if retry < max_retries {
                        Step::RetrySamePage
                    } else {
                        Step::Stop(Termination::Faulted)
                    }
                }
            };

            match step {
                Step::NextPage => retry = 0,
                Step::RetrySamePage => retry += 1,
                Step::Stop(termination) => return termination,
            }
        }
    }

    fn visit_page(&mut self, state: &mut CrawlState, retry: u32) -> Result<Step, SessionError> {
        if self.stop_requested() {
            info!("Stop requested, ending crawl with {} listings", state.len());
            return Ok(Step::Stop(Termination::Interrupted));
        }
        if state.is_full() {
            info!("Reached {} listings", state.max_apartments());
            return Ok(Step::Stop(Termination::Done));
        }

        pause(self.config.timings.settle_delay);
        for _ in 0..self.config.limits.settle_passes {
            self.ensure_content_loaded()?;
            pause(self.config.timings.settle_pass_pause);
        }

        let attempts = self.config.limits.listing_attempts;
        let mut listings = self.collect_visible_listings(attempts);
        if listings.len() < self.config.min_listings_per_page
            && retry < self.config.max_retries_per_page
        {
            info!("Got only {} listings, retrying page load...", listings.len());
            self.session.refresh()?;
            pause(self.config.timings.refresh_wait);
            self.ensure_content_loaded()?;
            listings = self.collect_visible_listings(attempts);
        }

        let items_found = listings.len();
        self.accumulate(state, &listings);

        if state.is_full() {
            info!("Successfully collected {} listings", state.len());
            return Ok(Step::Stop(Termination::Done));
        }

        info!(
            "Need {} more listings to reach target of {}",
            state.remaining(),
            state.max_apartments()
        );

        match self.find_next_control()? {
            Some(control) => self.follow_control(state, &control, retry),
            None => self.follow_offset(state, items_found),
        }
    }

    /// Extract records from the collected cards until the cap is reached
    fn accumulate(&mut self, state: &mut CrawlState, listings: &[S::Element]) {
        for listing in listings {
            if state.is_full() {
                info!("Reached target of {} listings", state.max_apartments());
                break;
            }
            let Some(record) = extract_record(&mut self.session, listing, &self.config.profile)
            else {
                continue;
            };
            if state.push(record) {
                if let Some(ListingRecord {
                    name,
                    price_per_night,
                }) = state.records().last()
                {
                    info!(
                        "Found listing {}/{}: {} - Price per night: {}",
                        state.len(),
                        state.max_apartments(),
                        name,
                        price_per_night
                    );
                }
            }
        }
    }

    fn follow_control(
        &mut self,
        state: &mut CrawlState,
        control: &S::Element,
        retry: u32,
    ) -> Result<Step, SessionError> {
        info!("Found next button, attempting to click...");
        self.session.scroll_into_view(control)?;
        pause(self.config.timings.pre_click_pause);
        self.session.click(control)?;
        pause(self.config.timings.post_click_wait);

        let page_url = self.session.current_url()?;
        if state.mark_visited(&page_url) {
            return Ok(self.enter_page(state, &page_url));
        }

        warn!("Page URL didn't change after clicking next, might be stuck");
        if retry < self.config.max_retries_per_page {
            info!("Retrying current page...");
            Ok(Step::RetrySamePage)
        } else {
            warn!("Max retries reached, saving current results");
            Ok(Step::Stop(Termination::Exhausted))
        }
    }

    fn follow_offset(
        &mut self,
        state: &mut CrawlState,
        items_found: usize,
    ) -> Result<Step, SessionError> {
        if !self.config.offset_fallback || items_found == 0 {
            info!("No next button found, ending with {} listings", state.len());
            return Ok(Step::Stop(Termination::NoMorePages));
        }

        let current = self.session.current_url()?;
        let next = match derive_next_page_url(&current, items_found, &self.paging()) {
            Ok(next) => next,
            Err(e) => {
                warn!(url = %current, "Error generating next page URL: {}", e);
                return Ok(Step::Stop(Termination::NoMorePages));
            }
        };
        if !state.mark_visited(&next) {
            info!(url = %next, "Offset page already visited, ending with {} listings", state.len());
            return Ok(Step::Stop(Termination::NoMorePages));
        }

        let step = self.enter_page(state, &next);
        if matches!(step, Step::NextPage) {
            info!(url = %next, "No next button, following offset pagination");
            self.session.navigate(&next)?;
            pause(self.config.timings.initial_wait);
        }
        Ok(step)
    }

    fn enter_page(&self, state: &CrawlState, page_url: &str) -> Step {
        if state.pages_visited() > self.config.limits.max_pages_per_seed {
            warn!(
                "Page limit of {} reached, saving current results",
                self.config.limits.max_pages_per_seed
            );
            return Step::Stop(Termination::Exhausted);
        }
        debug!(url = %page_url, pages = state.pages_visited(), "Moved to a new page");
        Step::NextPage
    }
}

fn is_usable_control<S: BrowserSession>(
    session: &mut S,
    profile: &ExtractionProfile,
    element: &S::Element,
) -> bool {
    let enabled = session.is_enabled(element).unwrap_or(false);
    let displayed = session.is_displayed(element).unwrap_or(false);
    if !enabled || !displayed {
        return false;
    }
    match session.attribute(element, "class") {
        Ok(class_attr) => !profile.looks_disabled(class_attr.as_deref().unwrap_or("")),
        Err(_) => false,
    }
}

/// Result of crawling one seed URL
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub seed_url: String,
    pub termination: Termination,
    pub records: usize,
}

/// Runs seed URLs one after another and owns everything that must be cleaned up.
/// Dropping the driver persists unsaved records and quits the browser.
pub struct CrawlDriver<S: BrowserSession, K: ResultSink> {
    crawler: PageCrawler<S>,
    sink: K,
    states: Vec<(String, CrawlState)>,
    closed: bool,
}

impl<S: BrowserSession, K: ResultSink> CrawlDriver<S, K> {
    pub fn new(session: S, sink: K, config: CrawlerConfig) -> Self {
        Self {
            crawler: PageCrawler::new(session, config),
            sink,
            states: Vec::new(),
            closed: false,
        }
    }

    #[cfg(test)]
    pub fn crawler(&self) -> &PageCrawler<S> {
        &self.crawler
    }

    #[cfg(test)]
    pub fn sink(&self) -> &K {
        &self.sink
    }

    #[cfg(test)]
    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.crawler.stop_handle()
    }

    /// Records collected so far for a seed URL
    #[cfg(test)]
    pub fn records(&self, seed_url: &str) -> Option<&[ListingRecord]> {
        self.position(seed_url).map(|idx| self.states[idx].1.records())
    }

    fn position(&self, seed_url: &str) -> Option<usize> {
        self.states.iter().position(|(seed, _)| seed == seed_url)
    }

    /// Crawl every seed URL not seen before, in order. Never fails: each seed
    /// ends in a terminal state followed by one persist attempt.
    pub fn run(&mut self, seed_urls: &[String]) -> Vec<CrawlSummary> {
        let mut summaries = Vec::new();

        for seed_url in seed_urls {
            if self.position(seed_url).is_some() {
                info!(seed = %seed_url, "Skipping already processed URL");
                continue;
            }
            if self.crawler.stop_requested() {
                info!("Stop requested, skipping remaining seed URLs");
                break;
            }

            let max_apartments = self.crawler.config().max_apartments;
            self.states
                .push((seed_url.clone(), CrawlState::new(seed_url, max_apartments)));
            let idx = self.states.len() - 1;

            info!(seed = %seed_url, "Processing URL");
            let termination = match self.crawler.open_seed(seed_url) {
                Ok(()) => self.crawler.crawl_cycle(&mut self.states[idx].1),
                Err(e) => {
                    error!(seed = %seed_url, "Failed to open seed URL: {}", e);
                    Termination::Faulted
                }
            };

            let records = self.states[idx].1.len();
            info!(seed = %seed_url, ?termination, records, "Crawl finished");
            self.persist_at(idx);

            summaries.push(CrawlSummary {
                seed_url: seed_url.clone(),
                termination,
                records,
            });
        }

        summaries
    }

    /// Hand a seed's records to the sink unless there is nothing new to save.
    /// Returns whether anything was written.
    pub fn persist(&mut self, seed_url: &str) -> bool {
        match self.position(seed_url) {
            Some(idx) => self.persist_at(idx),
            None => false,
        }
    }

    fn persist_at(&mut self, idx: usize) -> bool {
        let (seed_url, state) = &mut self.states[idx];
        if !state.has_unsaved() {
            return false;
        }
        match self.sink.persist(seed_url, state.records()) {
            Ok(paths) => {
                debug!(seed = %seed_url, ?paths, "Results persisted");
                state.mark_persisted();
                true
            }
            Err(e) => {
                error!(seed = %seed_url, "Failed to save results: {:#}", e);
                false
            }
        }
    }

    /// Persist anything unsaved and release the browser. Runs once.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for idx in 0..self.states.len() {
            self.persist_at(idx);
        }
        if let Err(e) = self.crawler.session_mut().quit() {
            warn!("Failed to close browser session: {}", e);
        }
    }
}

impl<S: BrowserSession, K: ResultSink> Drop for CrawlDriver<S, K> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
