//! RegisterClient operation

use crate::call::RpcOperation;
use crate::error::{EngineError, Result};
use crate::transport::{MatchEngineStub, RpcChannel};
use async_trait::async_trait;
use cloudlet_shared::{RegisterClientReply, RegisterClientRequest};
use std::sync::Arc;

/// Register the application and obtain a session cookie
pub struct RegisterClient;

#[async_trait]
impl RpcOperation for RegisterClient {
    type Request = RegisterClientRequest;
    type Output = RegisterClientReply;

    const NAME: &'static str = "RegisterClient";

    fn validate(request: &RegisterClientRequest) -> Result<()> {
        if request.app_name.is_empty() {
            return Err(EngineError::InvalidArgument(
                "RegisterClient requires an application name".into(),
            ));
        }
        Ok(())
    }

    async fn invoke(
        stub: &MatchEngineStub,
        _channel: Arc<dyn RpcChannel>,
        request: RegisterClientRequest,
    ) -> Result<RegisterClientReply> {
        stub.register_client(&request)
            .await?
            .ok_or(EngineError::EmptyReply {
                operation: Self::NAME,
            })
    }
}
