//! Response DTOs for the Parley API.

use serde::Serialize;

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_shape() {
        let json = serde_json::to_string(&ApiResponse::new(vec![1, 2, 3])).unwrap();
        assert_eq!(json, r#"{"data":[1,2,3]}"#);
    }
}
