//! FindCloudlet operation

use crate::call::RpcOperation;
use crate::error::{EngineError, Result};
use crate::location::GeoLocation;
use crate::transport::{MatchEngineStub, RpcChannel};
use async_trait::async_trait;
use cloudlet_shared::{AppPort, FindCloudletReply, FindCloudletRequest, FindStatus};
use std::sync::Arc;

/// Locate the closest cloudlet running the registered application
pub struct FindCloudlet;

/// Typed FindCloudlet result
#[derive(Debug, Clone, PartialEq)]
pub struct FindCloudletResponse {
    pub status: FindStatus,
    /// Fully qualified name of the application instance
    pub server: String,
    pub port: u32,
    pub ports: Vec<AppPort>,
    /// Cloudlet position, when the engine reported one
    pub location: Option<GeoLocation>,
}

impl FindCloudletResponse {
    pub fn is_found(&self) -> bool {
        self.status == FindStatus::FindFound
    }
}

impl From<FindCloudletReply> for FindCloudletResponse {
    fn from(reply: FindCloudletReply) -> Self {
        Self {
            status: FindStatus::try_from(reply.status).unwrap_or(FindStatus::FindUnknown),
            location: reply.cloudlet_location.as_ref().map(GeoLocation::from),
            server: reply.fqdn,
            port: reply.server_port,
            ports: reply.ports,
        }
    }
}

#[async_trait]
impl RpcOperation for FindCloudlet {
    type Request = FindCloudletRequest;
    type Output = FindCloudletResponse;

    const NAME: &'static str = "FindCloudlet";

    async fn invoke(
        stub: &MatchEngineStub,
        _channel: Arc<dyn RpcChannel>,
        request: FindCloudletRequest,
    ) -> Result<FindCloudletResponse> {
        let reply = stub
            .find_cloudlet(&request)
            .await?
            .ok_or(EngineError::EmptyReply {
                operation: Self::NAME,
            })?;
        Ok(reply.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudlet_shared::Loc;

    #[test]
    fn test_missing_location_is_none() {
        let reply = FindCloudletReply {
            status: FindStatus::FindFound.into(),
            fqdn: "app.cloudlet.example".into(),
            server_port: 443,
            ..Default::default()
        };
        let response = FindCloudletResponse::from(reply);
        assert!(response.is_found());
        assert_eq!(response.server, "app.cloudlet.example");
        assert_eq!(response.port, 443);
        assert!(response.location.is_none());
    }

    #[test]
    fn test_location_converted() {
        let reply = FindCloudletReply {
            cloudlet_location: Some(Loc {
                latitude: 37.4,
                longitude: -122.1,
                ..Default::default()
            }),
            ..Default::default()
        };
        let response = FindCloudletResponse::from(reply);
        let location = response.location.unwrap();
        assert_eq!(location.latitude, 37.4);
        assert_eq!(location.longitude, -122.1);
        assert_eq!(response.status, FindStatus::FindUnknown);
    }
}
