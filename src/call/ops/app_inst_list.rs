//! GetAppInstList operation

use crate::call::RpcOperation;
use crate::error::{EngineError, Result};
use crate::transport::{MatchEngineStub, RpcChannel};
use async_trait::async_trait;
use cloudlet_shared::{AppInstListRequest, CloudletListReply};
use std::sync::Arc;

/// List application instances near a location, grouped by cloudlet
pub struct GetAppInstList;

#[async_trait]
impl RpcOperation for GetAppInstList {
    type Request = AppInstListRequest;
    type Output = CloudletListReply;

    const NAME: &'static str = "GetAppInstList";

    async fn invoke(
        stub: &MatchEngineStub,
        _channel: Arc<dyn RpcChannel>,
        request: AppInstListRequest,
    ) -> Result<CloudletListReply> {
        stub.get_app_inst_list(&request)
            .await?
            .ok_or(EngineError::EmptyReply {
                operation: Self::NAME,
            })
    }
}
