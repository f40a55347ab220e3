use rewear_types::api::{Page, Pagination};

use crate::error::{ApiError, FieldError};

/// Collects every failed field check so clients see all problems at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &'static str, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(FieldError {
                field,
                message: message.into(),
            });
        }
        self
    }

    /// Character count of the trimmed value must fall within `min..=max`.
    pub fn length(&mut self, field: &'static str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        self.check(
            (min..=max).contains(&len),
            field,
            format!("{} must be between {} and {} characters", field, min, max),
        )
    }

    pub fn max_length(&mut self, field: &'static str, value: Option<&str>, max: usize) -> &mut Self {
        let len = value.map_or(0, |v| v.trim().chars().count());
        self.check(
            len <= max,
            field,
            format!("{} cannot be more than {} characters", field, max),
        )
    }

    pub fn range(&mut self, field: &'static str, value: i64, min: i64, max: i64) -> &mut Self {
        self.check(
            (min..=max).contains(&value),
            field,
            format!("{} must be between {} and {}", field, min, max),
        )
    }

    pub fn email(&mut self, field: &'static str, value: &str) -> &mut Self {
        self.check(is_email(value), field, "Please provide a valid email")
    }

    pub fn url(&mut self, field: &'static str, value: &str) -> &mut Self {
        self.check(is_http_url(value), field, format!("{} must be a valid URL", field))
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

fn is_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn is_http_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}

/// Lower-cased, trimmed email used as the account key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims each tag, lower-cases it and drops empties and duplicates.
pub fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Trimmed text, or `None` when only whitespace is left.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub const MAX_PAGE_SIZE: u32 = 50;

/// Validated `page`/`limit` query parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paging {
    pub page: u32,
    pub limit: u32,
}

impl Paging {
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Result<Self, ApiError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(default_limit);
        Validator::new()
            .check(page >= 1, "page", "Page must be a positive integer")
            .check(
                (1..=MAX_PAGE_SIZE).contains(&limit),
                "limit",
                format!("Limit must be between 1 and {}", MAX_PAGE_SIZE),
            )
            .finish()?;
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn page_of<T>(&self, data: Vec<T>, total: i64) -> Page<T> {
        Page {
            data,
            pagination: Pagination::new(self.page, self.limit, total),
        }
    }
}

/// A bare `limit` parameter, e.g. for leaderboards.
pub fn limit(limit: Option<u32>, default_limit: u32) -> Result<u32, ApiError> {
    let limit = limit.unwrap_or(default_limit);
    Validator::new()
        .check(
            (1..=MAX_PAGE_SIZE).contains(&limit),
            "limit",
            format!("Limit must be between 1 and {}", MAX_PAGE_SIZE),
        )
        .finish()?;
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failure() {
        let err = Validator::new()
            .length("name", " a ", 2, 100)
            .email("email", "not-an-email")
            .range("points_required", 0, 1, 100)
            .length("title", "Denim", 3, 100)
            .finish()
            .unwrap_err();

        match err {
            ApiError::Validation(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["name", "email", "points_required"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn emails_and_urls() {
        assert!(is_email("ada@example.com"));
        assert!(!is_email("ada@localhost"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("a b@example.com"));

        assert!(is_http_url("https://img.example.com/a.jpg"));
        assert!(is_http_url("http://cdn.test/x"));
        assert!(!is_http_url("ftp://cdn.test/x"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("https://?x"));
        assert!(!is_http_url("http://:::"));
        assert!(!is_http_url("data:image/png;base64,AAAA"));
        assert!(!is_http_url("not a url"));
    }

    #[test]
    fn tags_are_normalized() {
        assert_eq!(
            normalize_tags([" Denim", "denim", "", "Vintage "]),
            vec!["denim".to_string(), "vintage".to_string()]
        );
    }

    #[test]
    fn paging_bounds() {
        let paging = Paging::new(Some(3), None, 12).unwrap();
        assert_eq!(paging.offset(), 24);
        assert!(Paging::new(Some(0), None, 12).is_err());
        assert!(Paging::new(None, Some(51), 12).is_err());
        assert!(limit(Some(0), 10).is_err());
        assert_eq!(limit(None, 10).unwrap(), 10);
    }
}
