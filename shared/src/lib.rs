//! Cloudlet Shared Protocol Types
//!
//! This crate provides the wire messages, the frame codec and the
//! network-switch state machine shared by the cloudlet client and any
//! matching-engine peer it talks to.

pub mod codec;
pub mod proto;
pub mod state_machine;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export commonly used types at crate root
pub use proto::*;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Default endpoints and timing parameters
pub mod defaults {
    /// Matching-engine host used when no carrier name is known
    pub const DME_HOST: &str = "tdg.dme.mobiledgex.net";

    /// Domain suffix appended to a carrier name to build its DME host
    pub const DME_DOMAIN: &str = "dme.mobiledgex.net";

    /// Matching-engine RPC port
    pub const DME_PORT: u16 = 50051;

    /// Overall budget for a network switch to reach a settled link
    pub const SWITCH_TIMEOUT_MS: u64 = 10000;

    /// How long to wait for a settled network to become the active default
    pub const ACTIVE_TIMEOUT_MS: u64 = 5000;

    /// Protocol version stamped on outgoing requests
    pub const API_VERSION: u32 = 1;
}

/// Builder helpers for frames
impl RpcFrame {
    /// Create a request frame carrying an encoded message
    pub fn request(call_id: u64, method: RpcMethod, payload: Vec<u8>, deadline_ms: u64) -> Self {
        Self {
            call_id,
            method: method.into(),
            kind: FrameKind::FrameRequest.into(),
            status_code: StatusCode::Ok.into(),
            status_message: String::new(),
            payload: Some(payload),
            deadline_ms,
        }
    }

    /// Create a unary reply frame; `None` means the peer had nothing to return
    pub fn reply(call_id: u64, method: RpcMethod, payload: Option<Vec<u8>>) -> Self {
        Self {
            call_id,
            method: method.into(),
            kind: FrameKind::FrameReply.into(),
            status_code: StatusCode::Ok.into(),
            status_message: String::new(),
            payload,
            deadline_ms: 0,
        }
    }

    /// Create one item of a server stream
    pub fn stream_item(call_id: u64, method: RpcMethod, payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::FrameStreamItem.into(),
            ..Self::reply(call_id, method, Some(payload))
        }
    }

    /// Create the frame that terminates a server stream
    pub fn stream_end(call_id: u64, method: RpcMethod) -> Self {
        Self {
            kind: FrameKind::FrameStreamEnd.into(),
            ..Self::reply(call_id, method, None)
        }
    }

    /// Create an error frame
    pub fn error(call_id: u64, method: RpcMethod, code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            call_id,
            method: method.into(),
            kind: FrameKind::FrameError.into(),
            status_code: code.into(),
            status_message: message.into(),
            payload: None,
            deadline_ms: 0,
        }
    }

    /// Decoded frame kind, `FrameUnknown` for values this build does not know
    pub fn frame_kind(&self) -> FrameKind {
        FrameKind::try_from(self.kind).unwrap_or(FrameKind::FrameUnknown)
    }

    /// Decoded method, `MethodUnknown` for values this build does not know
    pub fn rpc_method(&self) -> RpcMethod {
        RpcMethod::try_from(self.method).unwrap_or(RpcMethod::MethodUnknown)
    }
}

impl RpcMethod {
    /// Path-style name used in logs
    pub fn path(&self) -> &'static str {
        match self {
            RpcMethod::MethodUnknown => "/MatchEngineApi/Unknown",
            RpcMethod::RegisterClient => "/MatchEngineApi/RegisterClient",
            RpcMethod::FindCloudlet => "/MatchEngineApi/FindCloudlet",
            RpcMethod::VerifyLocation => "/MatchEngineApi/VerifyLocation",
            RpcMethod::GetLocation => "/MatchEngineApi/GetLocation",
            RpcMethod::GetAppInstList => "/MatchEngineApi/GetAppInstList",
            RpcMethod::GetCloudletList => "/MatchEngineApi/GetCloudletList",
            RpcMethod::AddUserToGroup => "/MatchEngineApi/AddUserToGroup",
            RpcMethod::GetQosPositionKpi => "/MatchEngineApi/GetQosPositionKpi",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frame_creation() {
        let frame = RpcFrame::request(7, RpcMethod::FindCloudlet, vec![1, 2, 3], 500);
        assert_eq!(frame.call_id, 7);
        assert_eq!(frame.rpc_method(), RpcMethod::FindCloudlet);
        assert_eq!(frame.frame_kind(), FrameKind::FrameRequest);
        assert_eq!(frame.deadline_ms, 500);
    }

    #[test]
    fn test_stream_end_has_no_payload() {
        let frame = RpcFrame::stream_end(3, RpcMethod::GetQosPositionKpi);
        assert_eq!(frame.frame_kind(), FrameKind::FrameStreamEnd);
        assert!(frame.payload.is_none());
    }

    #[test]
    fn test_unknown_kind_is_tolerated() {
        let mut frame = RpcFrame::reply(1, RpcMethod::GetLocation, None);
        frame.kind = 99;
        assert_eq!(frame.frame_kind(), FrameKind::FrameUnknown);
    }

    #[test]
    fn test_error_frame() {
        let frame = RpcFrame::error(9, RpcMethod::RegisterClient, StatusCode::Unauthenticated, "bad token");
        assert_eq!(frame.status_code, StatusCode::Unauthenticated as i32);
        assert_eq!(frame.status_message, "bad token");
    }
}
