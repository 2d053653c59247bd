/// Parses a listed price such as `660円` or `1,320円`
///
/// The currency suffix and thousands separators are removed before parsing.
/// Anything else that is not an integer yields `None`.
pub fn parse_price(price: &str, currency_suffix: &str) -> Option<i64> {
    let trimmed = price.trim();
    let without_suffix = if currency_suffix.is_empty() {
        trimmed
    } else {
        trimmed.strip_suffix(currency_suffix).unwrap_or(trimmed)
    };
    let digits: String = without_suffix
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .collect();
    digits.parse().ok()
}
