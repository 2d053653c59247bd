use serde::Deserialize;

/// Main configuration structure for Kobo-Harvest
///
/// Every section is optional; an empty file yields the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub classifier: ClassifierConfig,
    pub images: ImageConfig,
    pub output: OutputConfig,
}

/// Listing crawl configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Base URL of the monthly release calendar
    pub listing_url: String,

    /// Number of concurrent page workers
    pub max_concurrency: u32,

    /// Safety ceiling on the page index
    pub max_pages: u32,

    /// Attempts per page; falls back to `max_concurrency` when unset
    pub max_page_retries: Option<u32>,

    /// Base delay between page attempts (milliseconds), multiplied by the attempt number
    pub retry_base_delay_ms: u64,

    /// Whole-request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl CrawlerConfig {
    /// Number of attempts made for a single page before it is given up
    pub fn page_retries(&self) -> u32 {
        self.max_page_retries.unwrap_or(self.max_concurrency)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://books.rakuten.co.jp/calendar/101904/monthly/".to_string(),
            max_concurrency: 4,
            max_pages: 1000,
            max_page_retries: None,
            retry_base_delay_ms: 1000,
            request_timeout_secs: 30,
        }
    }
}

/// Browser identity presented to the storefront
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    pub user_agent: String,
    pub referer: String,
    pub accept_language: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36 Edg/139.0.0.0"
                .to_string(),
            referer: "https://books.rakuten.co.jp/".to_string(),
            accept_language: "ja-JP,ja;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
        }
    }
}

/// Scoring rules for the variant classifier
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClassifierConfig {
    /// Score at or above which a record is excluded
    pub threshold: i32,

    /// Points added per matching title pattern
    pub pattern_score: i32,

    /// Regular expressions marking single-chapter or split releases
    pub patterns: Vec<String>,

    /// Title markers of bundled or complete editions
    pub bundle_markers: Vec<String>,

    /// Points subtracted when a bundle marker is present
    pub bundle_penalty: i32,

    /// Currency notation stripped from the price before parsing
    pub currency_suffix: String,

    /// Cumulative price tiers
    pub price_tiers: Vec<PriceTier>,
}

/// Adds `score` when the parsed price is at most `max_price`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PriceTier {
    pub max_price: i64,
    pub score: i32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            pattern_score: 2,
            patterns: [
                "特装版",
                "単話",
                "分冊",
                "話売り",
                "ばら売り",
                "話】",
                "連載版",
                "【短編】",
                r"第\s*[0-9０-９]+話",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            bundle_markers: vec!["合本".to_string(), "完全版".to_string()],
            bundle_penalty: 4,
            currency_suffix: "円".to_string(),
            price_tiers: vec![
                PriceTier {
                    max_price: 500,
                    score: 1,
                },
                PriceTier {
                    max_price: 300,
                    score: 2,
                },
                PriceTier {
                    max_price: 100,
                    score: 3,
                },
            ],
        }
    }
}

/// Cover image acquisition configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImageConfig {
    /// Number of concurrent image workers
    pub max_concurrency: u32,

    /// Attempts per image
    pub max_retries: u32,

    /// Base backoff between image attempts (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Uniform scale applied to both dimensions
    pub resize_factor: f32,

    /// JPEG quality of the stored encoding
    pub jpeg_quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_retries: 4,
            retry_base_delay_ms: 1000,
            resize_factor: 0.5,
            jpeg_quality: 85,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding the per-month snapshot files
    pub data_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}
