//! Typed matching-engine stub over an `RpcChannel`

use super::traits::RpcChannel;
use crate::error::RpcStatus;
use cloudlet_shared::{
    AppInstListRequest, CloudletListReply, CloudletListRequest, DynamicLocGroupReply,
    DynamicLocGroupRequest, FindCloudletReply, FindCloudletRequest, GetLocationReply,
    GetLocationRequest, QosPositionKpiReply, QosPositionRequest, RegisterClientReply,
    RegisterClientRequest, RpcMethod, VerifyLocationReply, VerifyLocationRequest,
};
use futures::stream::{BoxStream, StreamExt};
use prost::Message;
use std::sync::Arc;
use std::time::Duration;

/// Deadline applied when the caller sets none
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(15);

/// Client stub for the matching-engine API
#[derive(Clone)]
pub struct MatchEngineStub {
    channel: Arc<dyn RpcChannel>,
    deadline: Duration,
}

impl MatchEngineStub {
    pub fn new(channel: Arc<dyn RpcChannel>) -> Self {
        Self {
            channel,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Bound every call made through this stub
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn unary<Req, Rep>(&self, method: RpcMethod, request: &Req) -> Result<Option<Rep>, RpcStatus>
    where
        Req: Message,
        Rep: Message + Default,
    {
        let reply = self
            .channel
            .unary(method, request.encode_to_vec(), self.deadline)
            .await?;
        reply.map(|bytes| decode(method, &bytes)).transpose()
    }

    pub async fn register_client(
        &self,
        request: &RegisterClientRequest,
    ) -> Result<Option<RegisterClientReply>, RpcStatus> {
        self.unary(RpcMethod::RegisterClient, request).await
    }

    pub async fn find_cloudlet(
        &self,
        request: &FindCloudletRequest,
    ) -> Result<Option<FindCloudletReply>, RpcStatus> {
        self.unary(RpcMethod::FindCloudlet, request).await
    }

    pub async fn verify_location(
        &self,
        request: &VerifyLocationRequest,
    ) -> Result<Option<VerifyLocationReply>, RpcStatus> {
        self.unary(RpcMethod::VerifyLocation, request).await
    }

    pub async fn get_location(
        &self,
        request: &GetLocationRequest,
    ) -> Result<Option<GetLocationReply>, RpcStatus> {
        self.unary(RpcMethod::GetLocation, request).await
    }

    pub async fn get_app_inst_list(
        &self,
        request: &AppInstListRequest,
    ) -> Result<Option<CloudletListReply>, RpcStatus> {
        self.unary(RpcMethod::GetAppInstList, request).await
    }

    pub async fn get_cloudlet_list(
        &self,
        request: &CloudletListRequest,
    ) -> Result<Option<CloudletListReply>, RpcStatus> {
        self.unary(RpcMethod::GetCloudletList, request).await
    }

    pub async fn add_user_to_group(
        &self,
        request: &DynamicLocGroupRequest,
    ) -> Result<Option<DynamicLocGroupReply>, RpcStatus> {
        self.unary(RpcMethod::AddUserToGroup, request).await
    }

    /// Server stream of QoS KPI replies
    pub async fn get_qos_position_kpi(
        &self,
        request: &QosPositionRequest,
    ) -> Result<BoxStream<'static, Result<QosPositionKpiReply, RpcStatus>>, RpcStatus> {
        let method = RpcMethod::GetQosPositionKpi;
        let items = self
            .channel
            .server_stream(method, request.encode_to_vec(), self.deadline)
            .await?;
        Ok(items
            .map(move |item| item.and_then(|bytes| decode(method, &bytes)))
            .boxed())
    }
}

fn decode<M: Message + Default>(method: RpcMethod, bytes: &[u8]) -> Result<M, RpcStatus> {
    M::decode(bytes)
        .map_err(|e| RpcStatus::internal(format!("malformed {} reply: {}", method.path(), e)))
}
