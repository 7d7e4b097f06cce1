//! Request validation helpers

use crate::api::error::{ApiError, ApiResult};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

pub fn validate_not_empty(value: &str, field_name: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} cannot be empty", field_name)));
    }
    Ok(())
}

/// Resolve optional paging input to `(page, per_page)`. Pages start at 1.
pub fn normalize_pagination(page: Option<u32>, per_page: Option<u32>) -> ApiResult<(u32, u32)> {
    let page = page.unwrap_or(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);
    if page == 0 {
        return Err(ApiError::ValidationError("page must be at least 1".to_string()));
    }
    if per_page == 0 || per_page > MAX_PER_PAGE {
        return Err(ApiError::ValidationError(format!(
            "per_page must be between 1 and {}",
            MAX_PER_PAGE
        )));
    }
    Ok((page, per_page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_empty() {
        assert!(validate_not_empty("hello", "message").is_ok());
        assert!(matches!(
            validate_not_empty("   ", "message"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_pagination_defaults_and_bounds() {
        assert_eq!(normalize_pagination(None, None).unwrap(), (1, DEFAULT_PER_PAGE));
        assert_eq!(normalize_pagination(Some(3), Some(10)).unwrap(), (3, 10));
        assert!(normalize_pagination(Some(0), None).is_err());
        assert!(normalize_pagination(None, Some(MAX_PER_PAGE + 1)).is_err());
    }
}
