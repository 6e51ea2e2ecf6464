use url::Url;

const OFFSET_PARAM: &str = "items_offset";
const SECTION_OFFSET_PARAM: &str = "section_offset";
const PAGINATION_FLAG_PARAM: &str = "pagination_search";

/// Offset-based pagination settings
#[derive(Debug, Clone, Copy)]
pub struct OffsetPaging {
    /// Pages with fewer items than this are treated as short
    pub min_items: usize,
    /// Offset step used for short pages
    pub page_size: usize,
}

impl Default for OffsetPaging {
    fn default() -> Self {
        Self {
            min_items: 15,
            page_size: 20,
        }
    }
}

/// Read the current `items_offset` query parameter, defaulting to 0
pub fn current_offset(url: &Url) -> usize {
    url.query_pairs()
        .find(|(key, _)| key == OFFSET_PARAM)
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0)
}

/// Build the URL of the page after `current_url` by advancing `items_offset`.
///
/// A page that yielded fewer than `paging.min_items` items advances by the
/// standard page size instead of the item count. `section_offset` follows
/// the new offset and `pagination_search=true` is always present. An offset
/// that would overflow is reported as `ParseError::Overflow`.
pub fn derive_next_page_url(
    current_url: &str,
    items_found: usize,
    paging: &OffsetPaging,
) -> Result<String, url::ParseError> {
    let mut url = Url::parse(current_url)?;
    let offset = current_offset(&url);
    let step = if items_found < paging.min_items {
        paging.page_size
    } else {
        items_found
    };
    let next_offset = offset
        .checked_add(step)
        .ok_or(url::ParseError::Overflow)?
        .to_string();

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(key, _)| {
            key != OFFSET_PARAM && key != SECTION_OFFSET_PARAM && key != PAGINATION_FLAG_PARAM
        })
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(OFFSET_PARAM, &next_offset)
        .append_pair(PAGINATION_FLAG_PARAM, "true")
        .append_pair(SECTION_OFFSET_PARAM, &next_offset);

    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_of(url: &str) -> usize {
        current_offset(&Url::parse(url).unwrap())
    }

    fn param(url: &str, name: &str) -> Option<String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn test_full_page_advances_by_items_found() {
        let next = derive_next_page_url(
            "https://www.airbnb.ch/s/homes?checkin=2025-06-26&items_offset=40",
            20,
            &OffsetPaging::default(),
        )
        .unwrap();
        assert_eq!(offset_of(&next), 60);
    }

    #[test]
    fn test_short_page_advances_by_page_size() {
        let next = derive_next_page_url(
            "https://www.airbnb.ch/s/homes?items_offset=40&checkin=2025-06-26",
            10,
            &OffsetPaging::default(),
        )
        .unwrap();
        assert_eq!(offset_of(&next), 60);
    }

    #[test]
    fn test_missing_offset_defaults_to_zero() {
        let next = derive_next_page_url(
            "https://www.airbnb.ch/s/homes?checkin=2025-06-26",
            18,
            &OffsetPaging::default(),
        )
        .unwrap();
        assert_eq!(offset_of(&next), 18);
        assert_eq!(param(&next, "checkin").as_deref(), Some("2025-06-26"));
    }

    #[test]
    fn test_companion_parameters() {
        let next = derive_next_page_url(
            "https://www.airbnb.ch/s/homes?pagination_search=false&section_offset=3\
             &items_offset=20",
            25,
            &OffsetPaging::default(),
        )
        .unwrap();
        assert_eq!(param(&next, "pagination_search").as_deref(), Some("true"));
        assert_eq!(param(&next, "section_offset").as_deref(), Some("45"));
        let url = Url::parse(&next).unwrap();
        assert_eq!(url.query_pairs().filter(|(k, _)| k == "items_offset").count(), 1);
    }

    #[test]
    fn test_url_without_query() {
        let next =
            derive_next_page_url("https://www.airbnb.ch/s/homes", 0, &OffsetPaging::default())
                .unwrap();
        assert_eq!(offset_of(&next), 20);
    }

    #[test]
    fn test_invalid_url() {
        assert!(derive_next_page_url("not a url", 20, &OffsetPaging::default()).is_err());
    }

    #[test]
    fn test_offset_overflow_is_an_error() {
        let current = format!("https://www.airbnb.ch/s/homes?items_offset={}", usize::MAX - 5);
        let result = derive_next_page_url(&current, 20, &OffsetPaging::default());
        assert_eq!(result, Err(url::ParseError::Overflow));
    }
}
