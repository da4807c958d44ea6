//! Matching-engine client facade
//!
//! Owns the network coordinator, the call dispatcher and the session state
//! learned from replies. Every operation exists as an awaitable method and as
//! a `*_future` variant that runs on the dispatcher.

use crate::call::ops::{
    AddUserToGroup, FindCloudlet, FindCloudletResponse, GetAppInstList, GetCloudletList,
    GetLocation, GetLocationResponse, QosPositionKpi, RegisterClient, VerifyLocation,
};
use crate::call::{CallContext, CallWrapper, Endpoint, RpcOperation, StreamHandle};
use crate::config::EngineConfig;
use crate::dispatch::{CallHandle, Dispatcher};
use crate::error::{EngineError, Result};
use crate::location::{GeoLocation, LocationProvider};
use crate::network::{Connectivity, NetworkCoordinator};
use crate::transport::ChannelFactory;
use cloudlet_shared::{
    defaults, AppInstListRequest, CloudletListReply, CloudletListRequest, DlgCommType,
    DynamicLocGroupReply, DynamicLocGroupRequest, FindCloudletRequest, GetLocationRequest,
    QosPosition, QosPositionKpiReply, QosPositionRequest, RegisterClientReply,
    RegisterClientRequest, ReplyStatus, VerifyLocationReply, VerifyLocationRequest,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// State learned from matching-engine replies
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub session_cookie: Option<String>,
    pub token_server_uri: Option<String>,
    /// Token forwarded with location verification
    pub verify_loc_token: Option<String>,
    pub last_find_cloudlet: Option<FindCloudletResponse>,
    pub last_verify_location: Option<VerifyLocationReply>,
    pub last_location: Option<GeoLocation>,
}

/// Build the DME host for a carrier
///
/// Falls back to the default host when no carrier is known.
pub fn generate_dme_host(carrier_name: Option<&str>, dme_domain: &str) -> String {
    match carrier_name.map(str::trim) {
        Some(carrier) if !carrier.is_empty() => format!("{}.{}", carrier, dme_domain),
        _ => defaults::DME_HOST.to_string(),
    }
}

/// Client for a distributed matching engine
pub struct MatchingEngine {
    config: EngineConfig,
    coordinator: Arc<NetworkCoordinator>,
    dispatcher: Dispatcher,
    channels: Arc<dyn ChannelFactory>,
    location: Option<Arc<dyn LocationProvider>>,
    location_enabled: AtomicBool,
    session: RwLock<Session>,
}

impl MatchingEngine {
    /// Create an engine; fails outside a tokio runtime
    pub fn new(
        config: EngineConfig,
        connectivity: Arc<dyn Connectivity>,
        channels: Arc<dyn ChannelFactory>,
    ) -> Result<Self> {
        let dispatcher = Dispatcher::from_config(&config.dispatcher_config())?;
        let coordinator = Arc::new(NetworkCoordinator::new(connectivity, config.switch_config()));

        let engine = Self {
            location_enabled: AtomicBool::new(config.location_enabled),
            config,
            coordinator,
            dispatcher,
            channels,
            location: None,
            session: RwLock::new(Session::default()),
        };
        info!(
            "[ENGINE] Matching engine ready: {}:{} via {}",
            engine.host(),
            engine.port(),
            engine.channels.name()
        );
        Ok(engine)
    }

    /// Attach a device location source
    pub fn with_location_provider(mut self, provider: Arc<dyn LocationProvider>) -> Self {
        self.location = Some(provider);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<NetworkCoordinator> {
        &self.coordinator
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn is_location_enabled(&self) -> bool {
        self.location_enabled.load(Ordering::SeqCst)
    }

    pub fn set_location_enabled(&self, enabled: bool) {
        self.location_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_network_switching_enabled(&self) -> bool {
        self.coordinator.is_switching_enabled()
    }

    pub fn set_network_switching_enabled(&self, enabled: bool) {
        self.coordinator.set_switching_enabled(enabled);
    }

    /// Host requests go to unless the caller names one
    pub fn host(&self) -> String {
        match &self.config.host {
            Some(host) => host.clone(),
            None => generate_dme_host(self.config.carrier_name.as_deref(), &self.config.dme_domain),
        }
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host(), self.config.port)
    }

    /// Snapshot of the session state
    pub fn session(&self) -> Session {
        self.read_session().clone()
    }

    pub fn session_cookie(&self) -> Option<String> {
        self.read_session().session_cookie.clone()
    }

    pub fn token_server_uri(&self) -> Option<String> {
        self.read_session().token_server_uri.clone()
    }

    /// Token to forward with the next location verification
    pub fn set_verify_location_token(&self, token: Option<String>) {
        self.write_session().verify_loc_token = token;
    }

    fn read_session(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn carrier_name(&self) -> String {
        self.config.carrier_name.clone().unwrap_or_default()
    }

    fn cookie_or_empty(&self) -> String {
        self.session_cookie().unwrap_or_default()
    }

    fn context(&self) -> CallContext {
        CallContext {
            coordinator: self.coordinator.clone(),
            channels: self.channels.clone(),
            location_enabled: self.is_location_enabled(),
            default_port: self.config.port,
        }
    }

    /// Request builders return `Ok(None)` while location services are disabled
    fn builder_allowed(&self, builder: &str) -> bool {
        let allowed = self.is_location_enabled();
        if !allowed {
            debug!("[ENGINE] {} disabled, location services are off", builder);
        }
        allowed
    }

    fn wire_location(location: &GeoLocation) -> Result<cloudlet_shared::Loc> {
        if !location.is_valid() {
            return Err(EngineError::InvalidArgument(format!(
                "Location out of range: {}, {}",
                location.latitude, location.longitude
            )));
        }
        Ok(location.to_loc())
    }

    // ------------------------------------------------------------------
    // Request builders
    // ------------------------------------------------------------------

    pub fn create_register_request(
        &self,
        dev_name: &str,
        app_name: &str,
        app_vers: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<RegisterClientRequest>> {
        if !self.builder_allowed("RegisterClient request") {
            return Ok(None);
        }
        if app_name.is_empty() {
            return Err(EngineError::InvalidArgument("Application name is required".into()));
        }
        Ok(Some(RegisterClientRequest {
            ver: defaults::API_VERSION,
            dev_name: dev_name.into(),
            app_name: app_name.into(),
            app_vers: app_vers.into(),
            carrier_name: self.carrier_name(),
            auth_token: auth_token.unwrap_or_default().into(),
            ..Default::default()
        }))
    }

    pub fn create_find_cloudlet_request(
        &self,
        location: &GeoLocation,
    ) -> Result<Option<FindCloudletRequest>> {
        if !self.builder_allowed("FindCloudlet request") {
            return Ok(None);
        }
        Ok(Some(FindCloudletRequest {
            ver: defaults::API_VERSION,
            session_cookie: self.cookie_or_empty(),
            carrier_name: self.carrier_name(),
            gps_location: Some(Self::wire_location(location)?),
        }))
    }

    pub fn create_verify_location_request(
        &self,
        location: &GeoLocation,
    ) -> Result<Option<VerifyLocationRequest>> {
        if !self.builder_allowed("VerifyLocation request") {
            return Ok(None);
        }
        let gps_location = Some(Self::wire_location(location)?);
        let session = self.read_session();
        Ok(Some(VerifyLocationRequest {
            ver: defaults::API_VERSION,
            session_cookie: session.session_cookie.clone().unwrap_or_default(),
            carrier_name: self.carrier_name(),
            gps_location,
            verify_loc_token: session.verify_loc_token.clone().unwrap_or_default(),
        }))
    }

    pub fn create_get_location_request(&self) -> Result<Option<GetLocationRequest>> {
        if !self.builder_allowed("GetLocation request") {
            return Ok(None);
        }
        Ok(Some(GetLocationRequest {
            ver: defaults::API_VERSION,
            session_cookie: self.cookie_or_empty(),
            carrier_name: self.carrier_name(),
        }))
    }

    pub fn create_app_inst_list_request(
        &self,
        location: &GeoLocation,
    ) -> Result<Option<AppInstListRequest>> {
        if !self.builder_allowed("AppInstList request") {
            return Ok(None);
        }
        Ok(Some(AppInstListRequest {
            ver: defaults::API_VERSION,
            session_cookie: self.cookie_or_empty(),
            carrier_name: self.carrier_name(),
            gps_location: Some(Self::wire_location(location)?),
        }))
    }

    pub fn create_cloudlet_list_request(&self) -> Result<Option<CloudletListRequest>> {
        if !self.builder_allowed("CloudletList request") {
            return Ok(None);
        }
        Ok(Some(CloudletListRequest {
            ver: defaults::API_VERSION,
            session_cookie: self.cookie_or_empty(),
            carrier_name: self.carrier_name(),
        }))
    }

    pub fn create_dynamic_location_group_request(
        &self,
        group_id: u64,
        comm_type: DlgCommType,
        user_data: &str,
    ) -> Result<Option<DynamicLocGroupRequest>> {
        if !self.builder_allowed("DynamicLocGroup request") {
            return Ok(None);
        }
        Ok(Some(DynamicLocGroupRequest {
            ver: defaults::API_VERSION,
            session_cookie: self.cookie_or_empty(),
            lg_id: group_id,
            comm_type: comm_type.into(),
            user_data: user_data.into(),
        }))
    }

    /// QoS request for positions keyed by caller-chosen ids
    pub fn create_qos_position_request(
        &self,
        positions: &[(u64, GeoLocation)],
    ) -> Result<Option<QosPositionRequest>> {
        if !self.builder_allowed("QosPosition request") {
            return Ok(None);
        }
        if positions.is_empty() {
            return Err(EngineError::InvalidArgument(
                "At least one position is required".into(),
            ));
        }
        let positions = positions
            .iter()
            .map(|(id, location)| {
                Ok(QosPosition {
                    positionid: *id,
                    gps_location: Some(Self::wire_location(location)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(QosPositionRequest {
            ver: defaults::API_VERSION,
            session_cookie: self.cookie_or_empty(),
            positions,
        }))
    }

    // ------------------------------------------------------------------
    // Location
    // ------------------------------------------------------------------

    /// Last known device location, fetched on the dispatcher
    ///
    /// Do not call from inside a dispatcher unit when the pool has a single
    /// worker; the lookup would queue behind the caller.
    pub async fn last_known_location(&self, timeout: Duration) -> Result<GeoLocation> {
        let provider = self.location.clone().ok_or(EngineError::LocationUnavailable)?;
        let handle = self
            .dispatcher
            .submit(async move {
                provider
                    .last_known_location()
                    .await
                    .ok_or(EngineError::LocationUnavailable)
            })
            .await?;
        match tokio::time::timeout(timeout, handle).await {
            Ok(location) => location,
            Err(_) => {
                warn!("[ENGINE] No location fix within {}ms", timeout.as_millis());
                Err(EngineError::LocationUnavailable)
            }
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Run one operation against an explicit endpoint
    pub async fn call<Op: RpcOperation>(
        &self,
        request: Op::Request,
        endpoint: Endpoint,
        timeout: Duration,
    ) -> Result<Op::Output> {
        let mut wrapper = CallWrapper::<Op>::new(self.context());
        wrapper.set_request(request, endpoint, timeout)?;
        wrapper.execute().await
    }

    pub async fn register_client(
        &self,
        request: RegisterClientRequest,
        timeout: Duration,
    ) -> Result<RegisterClientReply> {
        let reply = self
            .call::<RegisterClient>(request, self.endpoint(), timeout)
            .await?;
        if reply.status == ReplyStatus::RsSuccess as i32 {
            let mut session = self.write_session();
            session.session_cookie = Some(reply.session_cookie.clone());
            session.token_server_uri = Some(reply.token_server_uri.clone());
            info!("[ENGINE] Registered, token server {}", reply.token_server_uri);
        } else {
            warn!("[ENGINE] Registration not accepted (status {})", reply.status);
        }
        Ok(reply)
    }

    pub async fn find_cloudlet(
        &self,
        request: FindCloudletRequest,
        timeout: Duration,
    ) -> Result<FindCloudletResponse> {
        let response = self
            .call::<FindCloudlet>(request, self.endpoint(), timeout)
            .await?;
        self.write_session().last_find_cloudlet = Some(response.clone());
        Ok(response)
    }

    pub async fn verify_location(
        &self,
        request: VerifyLocationRequest,
        timeout: Duration,
    ) -> Result<VerifyLocationReply> {
        if request.verify_loc_token.is_empty() && self.token_server_uri().is_some() {
            debug!("[ENGINE] Verifying location without a token server token");
        }
        let reply = self
            .call::<VerifyLocation>(request, self.endpoint(), timeout)
            .await?;
        self.write_session().last_verify_location = Some(reply.clone());
        Ok(reply)
    }

    pub async fn get_location(
        &self,
        request: GetLocationRequest,
        timeout: Duration,
    ) -> Result<GetLocationResponse> {
        let response = self
            .call::<GetLocation>(request, self.endpoint(), timeout)
            .await?;
        if response.location.is_some() {
            self.write_session().last_location = response.location;
        }
        Ok(response)
    }

    pub async fn get_cloudlet_list(
        &self,
        request: CloudletListRequest,
        timeout: Duration,
    ) -> Result<CloudletListReply> {
        self.call::<GetCloudletList>(request, self.endpoint(), timeout)
            .await
    }

    pub async fn get_app_inst_list(
        &self,
        request: AppInstListRequest,
        timeout: Duration,
    ) -> Result<CloudletListReply> {
        self.call::<GetAppInstList>(request, self.endpoint(), timeout)
            .await
    }

    pub async fn add_user_to_group(
        &self,
        request: DynamicLocGroupRequest,
        timeout: Duration,
    ) -> Result<DynamicLocGroupReply> {
        self.call::<AddUserToGroup>(request, self.endpoint(), timeout)
            .await
    }

    pub async fn get_qos_position_kpi(
        &self,
        request: QosPositionRequest,
        timeout: Duration,
    ) -> Result<StreamHandle<QosPositionKpiReply>> {
        self.call::<QosPositionKpi>(request, self.endpoint(), timeout)
            .await
    }

    // ------------------------------------------------------------------
    // Dispatcher-submitted variants
    // ------------------------------------------------------------------

    pub async fn register_client_future(
        self: &Arc<Self>,
        request: RegisterClientRequest,
        timeout: Duration,
    ) -> Result<CallHandle<RegisterClientReply>> {
        let engine = Arc::clone(self);
        self.dispatcher
            .submit(async move { engine.register_client(request, timeout).await })
            .await
    }

    pub async fn find_cloudlet_future(
        self: &Arc<Self>,
        request: FindCloudletRequest,
        timeout: Duration,
    ) -> Result<CallHandle<FindCloudletResponse>> {
        let engine = Arc::clone(self);
        self.dispatcher
            .submit(async move { engine.find_cloudlet(request, timeout).await })
            .await
    }

    pub async fn verify_location_future(
        self: &Arc<Self>,
        request: VerifyLocationRequest,
        timeout: Duration,
    ) -> Result<CallHandle<VerifyLocationReply>> {
        let engine = Arc::clone(self);
        self.dispatcher
            .submit(async move { engine.verify_location(request, timeout).await })
            .await
    }

    pub async fn get_location_future(
        self: &Arc<Self>,
        request: GetLocationRequest,
        timeout: Duration,
    ) -> Result<CallHandle<GetLocationResponse>> {
        let engine = Arc::clone(self);
        self.dispatcher
            .submit(async move { engine.get_location(request, timeout).await })
            .await
    }

    pub async fn get_cloudlet_list_future(
        self: &Arc<Self>,
        request: CloudletListRequest,
        timeout: Duration,
    ) -> Result<CallHandle<CloudletListReply>> {
        let engine = Arc::clone(self);
        self.dispatcher
            .submit(async move { engine.get_cloudlet_list(request, timeout).await })
            .await
    }

    pub async fn get_app_inst_list_future(
        self: &Arc<Self>,
        request: AppInstListRequest,
        timeout: Duration,
    ) -> Result<CallHandle<CloudletListReply>> {
        let engine = Arc::clone(self);
        self.dispatcher
            .submit(async move { engine.get_app_inst_list(request, timeout).await })
            .await
    }

    pub async fn add_user_to_group_future(
        self: &Arc<Self>,
        request: DynamicLocGroupRequest,
        timeout: Duration,
    ) -> Result<CallHandle<DynamicLocGroupReply>> {
        let engine = Arc::clone(self);
        self.dispatcher
            .submit(async move { engine.add_user_to_group(request, timeout).await })
            .await
    }

    pub async fn get_qos_position_kpi_future(
        self: &Arc<Self>,
        request: QosPositionRequest,
        timeout: Duration,
    ) -> Result<CallHandle<StreamHandle<QosPositionKpiReply>>> {
        let engine = Arc::clone(self);
        self.dispatcher
            .submit(async move { engine.get_qos_position_kpi(request, timeout).await })
            .await
    }
}

impl Drop for MatchingEngine {
    fn drop(&mut self) {
        self.dispatcher.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::FixedLocation;
    use crate::network::{NetworkHandle, SimulatedConnectivity, SimulatedNetwork, TransportKind};
    use crate::transport::TcpChannelFactory;

    fn engine(config: EngineConfig) -> MatchingEngine {
        let sim = Arc::new(
            SimulatedConnectivity::new()
                .with_network(SimulatedNetwork::new(2, TransportKind::Cellular))
                .with_active(NetworkHandle(2)),
        );
        MatchingEngine::new(config, sim, Arc::new(TcpChannelFactory::default())).unwrap()
    }

    #[test]
    fn test_generate_dme_host() {
        assert_eq!(
            generate_dme_host(Some("acme"), defaults::DME_DOMAIN),
            "acme.dme.mobiledgex.net"
        );
        assert_eq!(generate_dme_host(None, defaults::DME_DOMAIN), "tdg.dme.mobiledgex.net");
        assert_eq!(generate_dme_host(Some(""), defaults::DME_DOMAIN), "tdg.dme.mobiledgex.net");
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let sim = Arc::new(SimulatedConnectivity::new());
        let result = MatchingEngine::new(
            EngineConfig::default(),
            sim,
            Arc::new(TcpChannelFactory::default()),
        );
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_endpoint_prefers_configured_host() {
        let engine = engine(EngineConfig {
            host: Some("127.0.0.1".into()),
            carrier_name: Some("acme".into()),
            ..Default::default()
        });
        assert_eq!(engine.endpoint(), Endpoint::new("127.0.0.1", 50051));

        let engine = self::engine(EngineConfig {
            carrier_name: Some("acme".into()),
            ..Default::default()
        });
        assert_eq!(engine.host(), "acme.dme.mobiledgex.net");
    }

    #[tokio::test]
    async fn test_builders_inject_session() {
        let engine = engine(EngineConfig {
            carrier_name: Some("acme".into()),
            ..Default::default()
        });
        engine.write_session().session_cookie = Some("cookie-1".into());
        engine.set_verify_location_token(Some("token-9".into()));

        let request = engine
            .create_verify_location_request(&GeoLocation::new(10.0, 20.0))
            .unwrap()
            .unwrap();
        assert_eq!(request.session_cookie, "cookie-1");
        assert_eq!(request.carrier_name, "acme");
        assert_eq!(request.verify_loc_token, "token-9");
        assert_eq!(request.gps_location.unwrap().latitude, 10.0);
    }

    #[tokio::test]
    async fn test_builders_disabled_without_location() {
        let engine = engine(EngineConfig {
            location_enabled: false,
            ..Default::default()
        });
        assert!(engine.create_get_location_request().unwrap().is_none());
        assert!(engine
            .create_find_cloudlet_request(&GeoLocation::new(1.0, 2.0))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_builder_rejects_bad_input() {
        let engine = engine(EngineConfig::default());
        assert!(matches!(
            engine.create_find_cloudlet_request(&GeoLocation::new(120.0, 0.0)),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.create_qos_position_request(&[]),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.create_register_request("dev", "", "1.0", None),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_last_known_location() {
        let fix = GeoLocation::new(48.1, 11.6);
        let engine = engine(EngineConfig::default())
            .with_location_provider(Arc::new(FixedLocation(Some(fix))));
        assert_eq!(
            engine.last_known_location(Duration::from_secs(1)).await.unwrap(),
            fix
        );

        let engine = self::engine(EngineConfig::default())
            .with_location_provider(Arc::new(FixedLocation(None)));
        assert!(matches!(
            engine.last_known_location(Duration::from_secs(1)).await,
            Err(EngineError::LocationUnavailable)
        ));
    }
}
