//! Listing page parser
//!
//! Extracts the raw item fields from one page of the monthly release
//! calendar. An empty result means the listing container is missing or has
//! no items, which is how the storefront signals the end of the catalog.

use crate::record::Record;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// One listing item with its fields exactly as published, trimmed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub release_date: String,
    pub title: String,
    pub title_link: String,
    pub author: String,
    pub price: String,
    pub image_url: String,
}

impl RawItem {
    /// Converts the raw item into a record
    ///
    /// Relative links are resolved against `page_url`. The image link loses
    /// its query string and fragment, since the thumbnail service encodes
    /// volatile sizing parameters there.
    pub fn into_record(self, page_url: &Url) -> Record {
        let source_link = resolve(page_url, &self.title_link)
            .map(|u| u.to_string())
            .unwrap_or(self.title_link);

        let image_link = match resolve(page_url, &self.image_url) {
            Some(mut url) => {
                url.set_query(None);
                url.set_fragment(None);
                url.to_string()
            }
            None => strip_query(&self.image_url).to_string(),
        };

        Record {
            release_date: self.release_date,
            title: self.title,
            author: self.author,
            price: self.price,
            source_link,
            image_link,
            ..Record::default()
        }
    }
}

/// Compiled selectors of the listing markup
struct ListingSelectors {
    container: Selector,
    item: Selector,
    release_date: Selector,
    title_text: Selector,
    title_link: Selector,
    author: Selector,
    price: Selector,
    image: Selector,
}

impl ListingSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            container: Selector::parse(".rb-items-list--list").ok()?,
            item: Selector::parse(".item").ok()?,
            release_date: Selector::parse(".item-release__date").ok()?,
            title_text: Selector::parse(".item-title .item-title__text").ok()?,
            title_link: Selector::parse(".item-title a[href]").ok()?,
            author: Selector::parse(".item-author__name").ok()?,
            price: Selector::parse(".item-pricing__price").ok()?,
            image: Selector::parse("img").ok()?,
        })
    }
}

/// Parses one listing page
///
/// # Arguments
///
/// * `html` - The page body
///
/// # Returns
///
/// The items in document order; empty when the page has no listing.
///
/// # Example
///
/// ```
/// use kobo_harvest::crawler::parse_listing;
///
/// let html = r#"<ul class="rb-items-list--list"><li class="item">
///   <div class="item-title"><a href="/rk/1/"><span class="item-title__text">作品名 1巻</span></a></div>
/// </li></ul>"#;
/// let items = parse_listing(html);
/// assert_eq!(items.len(), 1);
/// assert_eq!(items[0].title, "作品名 1巻");
/// ```
pub fn parse_listing(html: &str) -> Vec<RawItem> {
    let Some(selectors) = ListingSelectors::new() else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let Some(container) = document.select(&selectors.container).next() else {
        return Vec::new();
    };

    container
        .select(&selectors.item)
        .map(|item| RawItem {
            release_date: first_text(&item, &selectors.release_date),
            title: first_text(&item, &selectors.title_text),
            title_link: first_attr(&item, &selectors.title_link, &["href"]),
            author: first_text(&item, &selectors.author),
            price: first_text(&item, &selectors.price),
            image_url: first_attr(&item, &selectors.image, &["src", "data-src"]),
        })
        .collect()
}

fn first_text(element: &ElementRef, selector: &Selector) -> String {
    element
        .select(selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// First non-empty value among `attrs` on the first matching element
fn first_attr(element: &ElementRef, selector: &Selector, attrs: &[&str]) -> String {
    element
        .select(selector)
        .next()
        .and_then(|e| {
            attrs
                .iter()
                .filter_map(|a| e.value().attr(a))
                .map(str::trim)
                .find(|v| !v.is_empty())
        })
        .unwrap_or_default()
        .to_string()
}

fn resolve(base: &Url, link: &str) -> Option<Url> {
    if link.is_empty() {
        return None;
    }
    base.join(link).ok()
}

fn strip_query(link: &str) -> &str {
    link.split(['?', '#']).next().unwrap_or(link)
}
