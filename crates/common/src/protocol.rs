//! WebSocket protocol message types.
//!
//! Every frame is a JSON object with a `type` discriminator. Server frames carry a
//! `success` flag; a failed frame carries `error` instead of `value`.

use crate::model::{OrderLine, View};
use serde::{Deserialize, Serialize};

// ============================================================================
// Client → Server Messages
// ============================================================================

/// Message sent from a display to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// The client's full cache for a view, sent after every snapshot it applies.
    SyncConfirm {
        #[serde(default)]
        view: View,
        #[serde(default)]
        value: Vec<OrderLine>,
    },
    /// Switch the connection's feed to another view.
    SetOrderView { value: View },
}

impl ClientMessage {
    /// Decode an inbound frame. Malformed frames and unknown tags yield `None`.
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

// ============================================================================
// Server → Client Messages
// ============================================================================

/// Message sent from the gateway to a display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Every line of a view.
    OrdersFull(FeedPayload),
    /// Lines added since the connection's watermark.
    OrdersDelta(FeedPayload),
    /// Outcome of a `sync-confirm`; a failure carries the authoritative list.
    SyncResult(FeedPayload),
}

impl ServerMessage {
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn payload(&self) -> &FeedPayload {
        match self {
            ServerMessage::OrdersFull(p)
            | ServerMessage::OrdersDelta(p)
            | ServerMessage::SyncResult(p) => p,
        }
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::OrdersFull(_) => "orders-full",
            ServerMessage::OrdersDelta(_) => "orders-delta",
            ServerMessage::SyncResult(_) => "sync-result",
        }
    }
}

/// Body shared by all server frames.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedPayload {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<View>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<OrderLine>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedPayload {
    pub fn ok(view: Option<View>, value: Vec<OrderLine>) -> Self {
        Self {
            success: true,
            view,
            value: Some(value),
            error: None,
        }
    }

    /// Success with no body (a matching `sync-result`).
    pub fn confirmed() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Failure that still carries lines (a mismatching `sync-result`).
    pub fn corrected(view: View, value: Vec<OrderLine>) -> Self {
        Self {
            success: false,
            view: Some(view),
            value: Some(value),
            error: None,
        }
    }

    pub fn failed(view: Option<View>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            view,
            value: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_set_order_view() {
        let msg = ClientMessage::decode(r#"{"type":"set-order-view","value":"completed"}"#);
        assert_eq!(
            msg,
            Some(ClientMessage::SetOrderView {
                value: View::Completed
            })
        );
    }

    #[test]
    fn test_decode_sync_confirm_defaults() {
        let msg = ClientMessage::decode(r#"{"type":"sync-confirm"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SyncConfirm {
                view: View::Active,
                value: vec![]
            }
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(ClientMessage::decode("not json").is_none());
        assert!(ClientMessage::decode(r#"{"type":"subscribe"}"#).is_none());
        assert!(ClientMessage::decode(r#"{"value":"active"}"#).is_none());
    }

    #[test]
    fn test_server_frame_shapes() {
        let full = ServerMessage::OrdersFull(FeedPayload::ok(Some(View::Active), vec![]));
        let json = serde_json::to_value(&full).unwrap();
        assert_eq!(json["type"], "orders-full");
        assert_eq!(json["success"], true);
        assert_eq!(json["view"], "active");
        assert!(json["value"].as_array().unwrap().is_empty());
        assert!(json.get("error").is_none());

        let failed = ServerMessage::OrdersDelta(FeedPayload::failed(None, "Database error"));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["type"], "orders-delta");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Database error");
        assert!(json.get("value").is_none());

        let confirmed = serde_json::to_string(&ServerMessage::SyncResult(FeedPayload::confirmed()))
            .unwrap();
        assert_eq!(confirmed, r#"{"type":"sync-result","success":true}"#);
    }

    #[test]
    fn test_server_frame_decode() {
        let msg = ServerMessage::decode(
            r#"{"type":"orders-delta","success":true,"value":[{"orderId":1,"orderLineId":2,"itemName":"Chips"}]}"#,
        )
        .unwrap();
        assert_eq!(msg.kind(), "orders-delta");
        assert_eq!(msg.payload().value.as_ref().map(Vec::len), Some(1));
    }
}
