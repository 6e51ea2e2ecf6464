use crate::scrapers::extract::ExtractionProfile;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SEED_URLS: [&str; 2] = [
    concat!(
        "https://www.airbnb.ch/s/St.-Gallen--Schweiz/homes?refinement_paths%5B%5D=%2Fhomes",
        "&checkin=2025-06-26&checkout=2025-06-29&date_picker_type=calendar",
        "&search_type=filter_change&query=St.%20Gallen%2C%20Schweiz",
        "&place_id=ChIJVdgzdikem0cRFGH-HwhQIpo&flexible_trip_lengths%5B%5D=one_week",
        "&monthly_start_date=2025-04-01&monthly_length=3&monthly_end_date=2025-07-01",
        "&search_mode=regular_search&price_filter_input_type=2&price_filter_num_nights=3",
        "&channel=EXPLORE&source=structured_search_input_header&pagination_search=true",
    ),
    concat!(
        "https://www.airbnb.ch/s/St.-Gallen--Schweiz/homes?refinement_paths%5B%5D=%2Fhomes",
        "&checkin=2025-10-09&checkout=2025-10-19&date_picker_type=calendar",
        "&search_type=AUTOSUGGEST",
    ),
];

/// Configuration for a crawl run
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Search result pages to crawl, in order
    pub seed_urls: Vec<String>,
    /// Cap on records collected per seed URL
    pub max_apartments: usize,
    /// Retry budget for a single page before giving up on a seed
    pub max_retries_per_page: u32,
    /// Pages with fewer listings than this get one refresh per cycle
    pub min_listings_per_page: usize,
    /// Offset step assumed when a page comes back short
    pub standard_page_size: usize,
    /// Fall back to offset URLs when no next-page control is found
    pub offset_fallback: bool,
    /// Directory the CSV/JSON artifacts are written to
    pub results_dir: PathBuf,
    /// Run Chrome without a window
    pub headless: bool,
    pub window_size: (u32, u32),
    pub limits: Limits,
    pub timings: Timings,
    pub profile: ExtractionProfile,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed_urls: DEFAULT_SEED_URLS.iter().map(|s| s.to_string()).collect(),
            max_apartments: 100,
            max_retries_per_page: 3,
            min_listings_per_page: 15,
            standard_page_size: 20,
            offset_fallback: false,
            results_dir: PathBuf::from("airbnb_results"),
            headless: true,
            window_size: (1920, 1080),
            limits: Limits::default(),
            timings: Timings::default(),
            profile: ExtractionProfile::default(),
        }
    }
}

impl CrawlerConfig {
    /// Defaults overridden by `STAY_SCOUT_*` variables (a `.env` file is honoured)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(urls) = std::env::var("STAY_SCOUT_SEED_URLS") {
            let seeds = parse_seed_list(&urls);
            if !seeds.is_empty() {
                config.seed_urls = seeds;
            }
        }
        if let Ok(max) = std::env::var("STAY_SCOUT_MAX_APARTMENTS") {
            config.max_apartments = max
                .trim()
                .parse()
                .context("STAY_SCOUT_MAX_APARTMENTS must be a positive integer")?;
        }
        if let Ok(dir) = std::env::var("STAY_SCOUT_RESULTS_DIR") {
            config.results_dir = PathBuf::from(dir);
        }
        if let Ok(flag) = std::env::var("STAY_SCOUT_HEADLESS") {
            config.headless = parse_flag(&flag);
        }
        if let Ok(flag) = std::env::var("STAY_SCOUT_OFFSET_FALLBACK") {
            config.offset_fallback = parse_flag(&flag);
        }

        Ok(config)
    }
}

fn parse_seed_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    !matches!(raw.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off")
}

/// Attempt ceilings for every inner loop
#[derive(Debug, Clone)]
pub struct Limits {
    /// Incremental scroll steps per scroll round
    pub scroll_steps: u32,
    /// Rounds without height change before the page counts as loaded
    pub stall_rounds: u32,
    /// Hard ceiling on scroll rounds, even while the page keeps growing
    pub max_scroll_rounds: u32,
    /// Listing-collection attempts before returning empty
    pub listing_attempts: u32,
    /// Next-control search passes
    pub next_control_attempts: u32,
    /// `ensure_content_loaded` passes before extraction
    pub settle_passes: u32,
    /// Page transitions allowed per seed URL
    pub max_pages_per_seed: usize,
    /// Upward nudge applied after each scroll round, in pixels
    pub nudge_px: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            scroll_steps: 8,
            stall_rounds: 10,
            max_scroll_rounds: 30,
            listing_attempts: 5,
            next_control_attempts: 3,
            settle_passes: 3,
            max_pages_per_seed: 50,
            nudge_px: 100.0,
        }
    }
}

/// Fixed pauses around browser actions
#[derive(Debug, Clone)]
pub struct Timings {
    pub initial_wait: Duration,
    pub settle_delay: Duration,
    pub settle_pass_pause: Duration,
    pub scroll_step_pause: Duration,
    pub scroll_round_pause: Duration,
    pub nudge_pause: Duration,
    pub bottom_wait: Duration,
    pub listing_retry_pause: Duration,
    pub next_control_retry_pause: Duration,
    pub reveal_pause: Duration,
    pub pre_click_pause: Duration,
    pub post_click_wait: Duration,
    pub refresh_wait: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(5),
            settle_delay: Duration::from_secs(5),
            settle_pass_pause: Duration::from_secs(2),
            scroll_step_pause: Duration::from_millis(800),
            scroll_round_pause: Duration::from_secs(2),
            nudge_pause: Duration::from_millis(500),
            bottom_wait: Duration::from_secs(1),
            listing_retry_pause: Duration::from_secs(2),
            next_control_retry_pause: Duration::from_secs(2),
            reveal_pause: Duration::from_secs(1),
            pre_click_pause: Duration::from_secs(2),
            post_click_wait: Duration::from_secs(5),
            refresh_wait: Duration::from_secs(5),
        }
    }
}

impl Timings {
    /// No pauses at all
    pub fn instant() -> Self {
        Self {
            initial_wait: Duration::ZERO,
            settle_delay: Duration::ZERO,
            settle_pass_pause: Duration::ZERO,
            scroll_step_pause: Duration::ZERO,
            scroll_round_pause: Duration::ZERO,
            nudge_pause: Duration::ZERO,
            bottom_wait: Duration::ZERO,
            listing_retry_pause: Duration::ZERO,
            next_control_retry_pause: Duration::ZERO,
            reveal_pause: Duration::ZERO,
            pre_click_pause: Duration::ZERO,
            post_click_wait: Duration::ZERO,
            refresh_wait: Duration::ZERO,
        }
    }
}
