//! GetQosPositionKpi operation

use crate::call::{RpcOperation, StreamHandle};
use crate::error::{EngineError, Result};
use crate::transport::{MatchEngineStub, RpcChannel};
use async_trait::async_trait;
use cloudlet_shared::{QosPositionKpiReply, QosPositionRequest};
use std::sync::Arc;

/// Stream QoS KPI estimates for a set of positions
pub struct QosPositionKpi;

#[async_trait]
impl RpcOperation for QosPositionKpi {
    type Request = QosPositionRequest;
    type Output = StreamHandle<QosPositionKpiReply>;

    const NAME: &'static str = "QosPositionKpi";
    const KEEPS_CHANNEL: bool = true;

    fn validate(request: &QosPositionRequest) -> Result<()> {
        if request.positions.is_empty() {
            return Err(EngineError::InvalidArgument(
                "QosPositionKpi requires at least one position".into(),
            ));
        }
        Ok(())
    }

    async fn invoke(
        stub: &MatchEngineStub,
        channel: Arc<dyn RpcChannel>,
        request: QosPositionRequest,
    ) -> Result<StreamHandle<QosPositionKpiReply>> {
        let items = stub.get_qos_position_kpi(&request).await?;
        Ok(StreamHandle::new(channel, items, stub.deadline()))
    }
}
