//! GetCloudletList operation

use crate::call::RpcOperation;
use crate::error::{EngineError, Result};
use crate::transport::{MatchEngineStub, RpcChannel};
use async_trait::async_trait;
use cloudlet_shared::{CloudletListReply, CloudletListRequest};
use std::sync::Arc;

/// List the cloudlets known to the operator
pub struct GetCloudletList;

#[async_trait]
impl RpcOperation for GetCloudletList {
    type Request = CloudletListRequest;
    type Output = CloudletListReply;

    const NAME: &'static str = "GetCloudletList";

    async fn invoke(
        stub: &MatchEngineStub,
        _channel: Arc<dyn RpcChannel>,
        request: CloudletListRequest,
    ) -> Result<CloudletListReply> {
        stub.get_cloudlet_list(&request)
            .await?
            .ok_or(EngineError::EmptyReply {
                operation: Self::NAME,
            })
    }
}
