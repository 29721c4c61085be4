//! Request DTOs for the Parley API.

use serde::Deserialize;

/// Chat creation request.
#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    /// IDs of the two participants.
    pub participant_ids: Vec<String>,
}

/// Message history query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Page size. Defaults to the configured history page size, capped at
    /// the configured maximum.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Number of messages to skip.
    #[serde(default)]
    pub offset: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_query_defaults() {
        let query: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert!(query.limit.is_none());
        assert!(query.offset.is_none());
    }

    #[test]
    fn test_create_chat_request() {
        let req: CreateChatRequest =
            serde_json::from_str(r#"{"participant_ids":["u1","u2"]}"#).unwrap();
        assert_eq!(req.participant_ids, vec!["u1", "u2"]);
    }
}
