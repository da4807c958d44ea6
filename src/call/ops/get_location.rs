//! GetLocation operation

use crate::call::RpcOperation;
use crate::error::{EngineError, Result};
use crate::location::GeoLocation;
use crate::transport::{MatchEngineStub, RpcChannel};
use async_trait::async_trait;
use cloudlet_shared::{GetLocationReply, GetLocationRequest};
use std::sync::Arc;

/// Ask the operator where the network places the device
pub struct GetLocation;

/// Typed GetLocation result
#[derive(Debug, Clone, PartialEq)]
pub struct GetLocationResponse {
    pub carrier_name: String,
    pub tower: u64,
    pub location: Option<GeoLocation>,
}

impl From<GetLocationReply> for GetLocationResponse {
    fn from(reply: GetLocationReply) -> Self {
        Self {
            location: reply.network_location.as_ref().map(GeoLocation::from),
            carrier_name: reply.carrier_name,
            tower: reply.tower,
        }
    }
}

#[async_trait]
impl RpcOperation for GetLocation {
    type Request = GetLocationRequest;
    type Output = GetLocationResponse;

    const NAME: &'static str = "GetLocation";

    async fn invoke(
        stub: &MatchEngineStub,
        _channel: Arc<dyn RpcChannel>,
        request: GetLocationRequest,
    ) -> Result<GetLocationResponse> {
        let reply = stub
            .get_location(&request)
            .await?
            .ok_or(EngineError::EmptyReply {
                operation: Self::NAME,
            })?;
        Ok(reply.into())
    }
}
