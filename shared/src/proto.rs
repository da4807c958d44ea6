//! Matching-engine wire messages
//!
//! Hand-written prost definitions for the requests and replies exchanged with
//! the Distributed Matching Engine, plus the `RpcFrame` envelope used by the
//! framed TCP transport.

use prost::{Enumeration, Message};

/// Wall-clock timestamp attached to a location fix
#[derive(Clone, PartialEq, Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

/// GPS location in WGS 84 coordinates
#[derive(Clone, PartialEq, Message)]
pub struct Loc {
    #[prost(double, tag = "1")]
    pub latitude: f64,
    #[prost(double, tag = "2")]
    pub longitude: f64,
    /// Radius in meters
    #[prost(double, tag = "3")]
    pub horizontal_accuracy: f64,
    #[prost(double, tag = "4")]
    pub vertical_accuracy: f64,
    /// Meters
    #[prost(double, tag = "5")]
    pub altitude: f64,
    /// Degrees east relative to true north
    #[prost(double, tag = "6")]
    pub course: f64,
    /// Meters per second
    #[prost(double, tag = "7")]
    pub speed: f64,
    #[prost(message, optional, tag = "8")]
    pub timestamp: Option<Timestamp>,
}

/// Generic reply status used by most replies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ReplyStatus {
    RsUndefined = 0,
    RsSuccess = 1,
    RsFail = 2,
}

/// Port exposed by an application instance
#[derive(Clone, PartialEq, Message)]
pub struct AppPort {
    /// 1 = TCP, 2 = UDP, 3 = HTTP
    #[prost(int32, tag = "1")]
    pub proto: i32,
    #[prost(int32, tag = "2")]
    pub internal_port: i32,
    #[prost(int32, tag = "3")]
    pub public_port: i32,
    #[prost(string, tag = "4")]
    pub path_prefix: String,
    #[prost(string, tag = "5")]
    pub fqdn_prefix: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct RegisterClientRequest {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(string, tag = "2")]
    pub dev_name: String,
    #[prost(string, tag = "3")]
    pub app_name: String,
    #[prost(string, tag = "4")]
    pub app_vers: String,
    #[prost(string, tag = "5")]
    pub carrier_name: String,
    #[prost(string, tag = "6")]
    pub auth_token: String,
    #[prost(string, tag = "7")]
    pub unique_id_type: String,
    #[prost(string, tag = "8")]
    pub unique_id: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct RegisterClientReply {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(enumeration = "ReplyStatus", tag = "2")]
    pub status: i32,
    #[prost(string, tag = "3")]
    pub session_cookie: String,
    #[prost(string, tag = "4")]
    pub token_server_uri: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct FindCloudletRequest {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(string, tag = "2")]
    pub session_cookie: String,
    #[prost(string, tag = "3")]
    pub carrier_name: String,
    #[prost(message, optional, tag = "4")]
    pub gps_location: Option<Loc>,
}

/// Outcome of a cloudlet search
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum FindStatus {
    FindUnknown = 0,
    FindFound = 1,
    FindNotfound = 2,
}

#[derive(Clone, PartialEq, Message)]
pub struct FindCloudletReply {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(enumeration = "FindStatus", tag = "2")]
    pub status: i32,
    /// Fully qualified name of the matched application service
    #[prost(string, tag = "3")]
    pub fqdn: String,
    #[prost(uint32, tag = "4")]
    pub server_port: u32,
    #[prost(message, repeated, tag = "5")]
    pub ports: Vec<AppPort>,
    #[prost(message, optional, tag = "6")]
    pub cloudlet_location: Option<Loc>,
}

#[derive(Clone, PartialEq, Message)]
pub struct VerifyLocationRequest {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(string, tag = "2")]
    pub session_cookie: String,
    #[prost(string, tag = "3")]
    pub carrier_name: String,
    #[prost(message, optional, tag = "4")]
    pub gps_location: Option<Loc>,
    #[prost(string, tag = "5")]
    pub verify_loc_token: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum TowerStatus {
    TowerUnknown = 0,
    ConnectedToSpecifiedTower = 1,
    NotConnectedToSpecifiedTower = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum GpsLocationStatus {
    LocUnknown = 0,
    LocVerified = 1,
    LocMismatchSameCountry = 2,
    LocMismatchOtherCountry = 3,
    LocRoamingCountryMatch = 4,
    LocRoamingCountryMismatch = 5,
    LocErrorUnauthorized = 6,
    LocErrorOther = 7,
}

#[derive(Clone, PartialEq, Message)]
pub struct VerifyLocationReply {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(enumeration = "TowerStatus", tag = "2")]
    pub tower_status: i32,
    #[prost(enumeration = "GpsLocationStatus", tag = "3")]
    pub gps_location_status: i32,
    #[prost(double, tag = "4")]
    pub gps_location_accuracy_km: f64,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetLocationRequest {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(string, tag = "2")]
    pub session_cookie: String,
    #[prost(string, tag = "3")]
    pub carrier_name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct GetLocationReply {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(enumeration = "ReplyStatus", tag = "2")]
    pub status: i32,
    #[prost(string, tag = "3")]
    pub carrier_name: String,
    #[prost(uint64, tag = "4")]
    pub tower: u64,
    #[prost(message, optional, tag = "5")]
    pub network_location: Option<Loc>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AppInstListRequest {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(string, tag = "2")]
    pub session_cookie: String,
    #[prost(string, tag = "3")]
    pub carrier_name: String,
    #[prost(message, optional, tag = "4")]
    pub gps_location: Option<Loc>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CloudletListRequest {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(string, tag = "2")]
    pub session_cookie: String,
    #[prost(string, tag = "3")]
    pub carrier_name: String,
}

/// Application instance running on a cloudlet
#[derive(Clone, PartialEq, Message)]
pub struct Appinstance {
    #[prost(string, tag = "1")]
    pub app_name: String,
    #[prost(string, tag = "2")]
    pub app_vers: String,
    #[prost(string, tag = "3")]
    pub fqdn: String,
    #[prost(message, repeated, tag = "4")]
    pub ports: Vec<AppPort>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CloudletLocation {
    #[prost(string, tag = "1")]
    pub carrier_name: String,
    #[prost(string, tag = "2")]
    pub cloudlet_name: String,
    #[prost(message, optional, tag = "3")]
    pub gps_location: Option<Loc>,
    /// Distance from the requesting device in kilometers
    #[prost(double, tag = "4")]
    pub distance: f64,
    #[prost(message, repeated, tag = "5")]
    pub appinstances: Vec<Appinstance>,
}

/// Reply shared by GetAppInstList and GetCloudletList
#[derive(Clone, PartialEq, Message)]
pub struct CloudletListReply {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(enumeration = "ReplyStatus", tag = "2")]
    pub status: i32,
    #[prost(message, repeated, tag = "3")]
    pub cloudlets: Vec<CloudletLocation>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum DlgCommType {
    DlgUndefined = 0,
    DlgSecure = 1,
    DlgOpen = 2,
}

#[derive(Clone, PartialEq, Message)]
pub struct DynamicLocGroupRequest {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(string, tag = "2")]
    pub session_cookie: String,
    #[prost(uint64, tag = "3")]
    pub lg_id: u64,
    #[prost(enumeration = "DlgCommType", tag = "4")]
    pub comm_type: i32,
    #[prost(string, tag = "5")]
    pub user_data: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DynamicLocGroupReply {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(enumeration = "ReplyStatus", tag = "2")]
    pub status: i32,
    #[prost(uint32, tag = "3")]
    pub error_code: u32,
    #[prost(string, tag = "4")]
    pub group_cookie: String,
}

/// One position along a route to score
#[derive(Clone, PartialEq, Message)]
pub struct QosPosition {
    #[prost(uint64, tag = "1")]
    pub positionid: u64,
    #[prost(message, optional, tag = "2")]
    pub gps_location: Option<Loc>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QosPositionRequest {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(string, tag = "2")]
    pub session_cookie: String,
    #[prost(message, repeated, tag = "3")]
    pub positions: Vec<QosPosition>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QosPositionKpiResult {
    #[prost(uint64, tag = "1")]
    pub positionid: u64,
    #[prost(message, optional, tag = "2")]
    pub gps_location: Option<Loc>,
    #[prost(float, tag = "3")]
    pub dluserthroughput_min: f32,
    #[prost(float, tag = "4")]
    pub dluserthroughput_avg: f32,
    #[prost(float, tag = "5")]
    pub dluserthroughput_max: f32,
    #[prost(float, tag = "6")]
    pub uluserthroughput_min: f32,
    #[prost(float, tag = "7")]
    pub uluserthroughput_avg: f32,
    #[prost(float, tag = "8")]
    pub uluserthroughput_max: f32,
    #[prost(float, tag = "9")]
    pub latency_min: f32,
    #[prost(float, tag = "10")]
    pub latency_avg: f32,
    #[prost(float, tag = "11")]
    pub latency_max: f32,
}

#[derive(Clone, PartialEq, Message)]
pub struct QosPositionKpiReply {
    #[prost(uint32, tag = "1")]
    pub ver: u32,
    #[prost(enumeration = "ReplyStatus", tag = "2")]
    pub status: i32,
    #[prost(message, repeated, tag = "3")]
    pub position_results: Vec<QosPositionKpiResult>,
}

/// Remote methods of the matching-engine API
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum RpcMethod {
    MethodUnknown = 0,
    RegisterClient = 1,
    FindCloudlet = 2,
    VerifyLocation = 3,
    GetLocation = 4,
    GetAppInstList = 5,
    GetCloudletList = 6,
    AddUserToGroup = 7,
    GetQosPositionKpi = 8,
}

/// Role of a frame within a call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum FrameKind {
    FrameUnknown = 0,
    FrameRequest = 1,
    FrameReply = 2,
    FrameStreamItem = 3,
    FrameStreamEnd = 4,
    FrameError = 5,
}

/// gRPC-compatible status codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

/// Envelope carried by every frame on the wire
#[derive(Clone, PartialEq, Message)]
pub struct RpcFrame {
    #[prost(uint64, tag = "1")]
    pub call_id: u64,
    #[prost(enumeration = "RpcMethod", tag = "2")]
    pub method: i32,
    #[prost(enumeration = "FrameKind", tag = "3")]
    pub kind: i32,
    #[prost(enumeration = "StatusCode", tag = "4")]
    pub status_code: i32,
    #[prost(string, tag = "5")]
    pub status_message: String,
    /// Encoded request or reply; absent when the peer sent no message
    #[prost(bytes = "vec", optional, tag = "6")]
    pub payload: Option<Vec<u8>>,
    /// Remaining deadline budget in milliseconds, 0 when unbounded
    #[prost(uint64, tag = "7")]
    pub deadline_ms: u64,
}
