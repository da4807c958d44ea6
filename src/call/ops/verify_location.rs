//! VerifyLocation operation

use crate::call::RpcOperation;
use crate::error::{EngineError, Result};
use crate::transport::{MatchEngineStub, RpcChannel};
use async_trait::async_trait;
use cloudlet_shared::{VerifyLocationReply, VerifyLocationRequest};
use std::sync::Arc;

/// Ask the operator to confirm the device's claimed location
pub struct VerifyLocation;

#[async_trait]
impl RpcOperation for VerifyLocation {
    type Request = VerifyLocationRequest;
    type Output = VerifyLocationReply;

    const NAME: &'static str = "VerifyLocation";

    fn validate(request: &VerifyLocationRequest) -> Result<()> {
        if request.gps_location.is_none() {
            return Err(EngineError::InvalidArgument(
                "VerifyLocation requires a location to verify".into(),
            ));
        }
        Ok(())
    }

    async fn invoke(
        stub: &MatchEngineStub,
        _channel: Arc<dyn RpcChannel>,
        request: VerifyLocationRequest,
    ) -> Result<VerifyLocationReply> {
        stub.verify_location(&request)
            .await?
            .ok_or(EngineError::EmptyReply {
                operation: Self::NAME,
            })
    }
}
