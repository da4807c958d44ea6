//! AddUserToGroup operation

use crate::call::RpcOperation;
use crate::error::{EngineError, Result};
use crate::transport::{MatchEngineStub, RpcChannel};
use async_trait::async_trait;
use cloudlet_shared::{DynamicLocGroupReply, DynamicLocGroupRequest};
use std::sync::Arc;

/// Join a dynamic location group
pub struct AddUserToGroup;

#[async_trait]
impl RpcOperation for AddUserToGroup {
    type Request = DynamicLocGroupRequest;
    type Output = DynamicLocGroupReply;

    const NAME: &'static str = "AddUserToGroup";

    async fn invoke(
        stub: &MatchEngineStub,
        _channel: Arc<dyn RpcChannel>,
        request: DynamicLocGroupRequest,
    ) -> Result<DynamicLocGroupReply> {
        stub.add_user_to_group(&request)
            .await?
            .ok_or(EngineError::EmptyReply {
                operation: Self::NAME,
            })
    }
}
