//! Shared fixtures for the integration tests

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use kobo_harvest::config::{Config, ImageConfig, UserAgentConfig};
use kobo_harvest::crawler::Fetcher;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

pub const LISTING_PATH: &str = "/calendar/101904/monthly/";

/// One listing item as the test pages render it
pub struct Item {
    pub date: &'static str,
    pub title: String,
    pub price: &'static str,
    pub image: String,
}

impl Item {
    pub fn new(date: &'static str, title: impl Into<String>, price: &'static str) -> Self {
        Self {
            date,
            title: title.into(),
            price,
            image: String::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }
}

/// Renders a listing page holding `items`
pub fn listing_page(items: &[Item]) -> String {
    let mut html = String::from(
        r#"<html><body><div class="rb-items-list"><ul class="rb-items-list--list">"#,
    );
    for (i, item) in items.iter().enumerate() {
        html.push_str(&format!(
            r#"<li class="item">
  <div class="item-release__date">{date}</div>
  <div class="item-title"><a href="/rk/{slug}-{i}/"><span class="item-title__text">{title}</span></a></div>
  <div class="item-author__name">著者</div>
  <div class="item-pricing__price">{price}</div>
  <img src="{image}">
</li>"#,
            date = item.date,
            slug = item.date.replace('/', ""),
            i = i,
            title = item.title,
            price = item.price,
            image = item.image,
        ));
    }
    html.push_str("</ul></div></body></html>");
    html
}

/// A page past the end of the catalog
pub fn empty_page() -> String {
    r#"<html><body><p class="rb-items-list--empty">該当する商品がありません</p></body></html>"#
        .to_string()
}

/// Configuration pointed at a mock server, with short retry delays
pub fn test_config(server_uri: &str, data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.listing_url = format!("{}{}", server_uri, LISTING_PATH);
    config.crawler.retry_base_delay_ms = 5;
    config.crawler.request_timeout_secs = 5;
    config.images.retry_base_delay_ms = 5;
    config.output.data_dir = data_dir.to_string_lossy().into_owned();
    config
}

pub fn image_config(max_retries: u32) -> ImageConfig {
    ImageConfig {
        max_concurrency: 2,
        max_retries,
        retry_base_delay_ms: 5,
        ..ImageConfig::default()
    }
}

pub fn fetcher() -> Fetcher {
    Fetcher::new(&UserAgentConfig::default(), Duration::from_secs(5)).unwrap()
}

/// PNG bytes of a solid image
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 120, 200])));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
