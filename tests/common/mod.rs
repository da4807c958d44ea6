//! In-process fake matching engine speaking the framed TCP protocol

#![allow(dead_code)]

use cloudlet_client::network::{
    NetworkHandle, SimulatedConnectivity, SimulatedNetwork, TransportKind,
};
use cloudlet_client::transport::TcpChannelFactory;
use cloudlet_client::{EngineConfig, MatchingEngine};
use cloudlet_shared::codec::{encode, FrameDecoder};
use cloudlet_shared::*;
use prost::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the fake engine answers
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Read requests but never answer
    pub silent: bool,
    /// Answer FindCloudlet with a PermissionDenied status
    pub reject_find: bool,
    /// Answer FindCloudlet without a cloudlet location
    pub find_without_location: bool,
    /// Answer VerifyLocation with no payload
    pub empty_verify: bool,
}

pub struct FakeDme {
    pub port: u16,
    received: Arc<Mutex<Vec<RpcFrame>>>,
    connections: Arc<AtomicUsize>,
}

impl FakeDme {
    pub async fn start() -> Self {
        Self::start_with(Behavior::default()).await
    }

    pub async fn start_with(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let (rx, count) = (received.clone(), connections.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                count.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, behavior.clone(), rx.clone()));
            }
        });

        Self {
            port,
            received,
            connections,
        }
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RpcFrame> {
        self.received.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<RpcMethod> {
        self.requests().iter().map(RpcFrame::rpc_method).collect()
    }

    /// Last request payload for `method`, decoded as `M`
    pub fn last_request<M: Message + Default>(&self, method: RpcMethod) -> Option<M> {
        self.requests()
            .iter()
            .rev()
            .find(|frame| frame.rpc_method() == method)
            .and_then(|frame| M::decode(frame.payload.as_deref().unwrap_or_default()).ok())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            host: Some("127.0.0.1".into()),
            port: self.port,
            carrier_name: Some("acme".into()),
            ..Default::default()
        }
    }
}

async fn serve(mut stream: TcpStream, behavior: Behavior, received: Arc<Mutex<Vec<RpcFrame>>>) {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; 4096];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        decoder.extend(&buf[..n]);
        while let Ok(Some(frame)) = decoder.decode_next() {
            received.lock().unwrap().push(frame.clone());
            if behavior.silent {
                continue;
            }
            for reply in answer(&behavior, &frame) {
                let Ok(bytes) = encode(&reply) else { return };
                if stream.write_all(&bytes).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn loc(latitude: f64, longitude: f64) -> Loc {
    Loc {
        latitude,
        longitude,
        ..Default::default()
    }
}

fn decode<M: Message + Default>(frame: &RpcFrame) -> M {
    M::decode(frame.payload.as_deref().unwrap_or_default()).unwrap_or_default()
}

fn answer(behavior: &Behavior, frame: &RpcFrame) -> Vec<RpcFrame> {
    let (id, method) = (frame.call_id, frame.rpc_method());
    let reply = |message: Vec<u8>| vec![RpcFrame::reply(id, method, Some(message))];

    match method {
        RpcMethod::RegisterClient => {
            let request: RegisterClientRequest = decode(frame);
            reply(
                RegisterClientReply {
                    ver: 1,
                    status: ReplyStatus::RsSuccess.into(),
                    session_cookie: format!("cookie-{}", request.app_name),
                    token_server_uri: "http://tokens.example.net/verify".into(),
                }
                .encode_to_vec(),
            )
        }
        RpcMethod::FindCloudlet if behavior.reject_find => vec![RpcFrame::error(
            id,
            method,
            StatusCode::PermissionDenied,
            "session cookie rejected",
        )],
        RpcMethod::FindCloudlet => reply(
            FindCloudletReply {
                ver: 1,
                status: FindStatus::FindFound.into(),
                fqdn: "cloudlet-1.example.net".into(),
                server_port: 8443,
                ports: vec![AppPort {
                    proto: 1,
                    internal_port: 8443,
                    public_port: 8443,
                    ..Default::default()
                }],
                cloudlet_location: (!behavior.find_without_location).then(|| loc(50.11, 8.68)),
            }
            .encode_to_vec(),
        ),
        RpcMethod::VerifyLocation if behavior.empty_verify => {
            vec![RpcFrame::reply(id, method, None)]
        }
        RpcMethod::VerifyLocation => reply(
            VerifyLocationReply {
                ver: 1,
                tower_status: TowerStatus::ConnectedToSpecifiedTower.into(),
                gps_location_status: GpsLocationStatus::LocVerified.into(),
                gps_location_accuracy_km: 2.0,
            }
            .encode_to_vec(),
        ),
        RpcMethod::GetLocation => {
            let request: GetLocationRequest = decode(frame);
            reply(
                GetLocationReply {
                    ver: 1,
                    status: ReplyStatus::RsSuccess.into(),
                    carrier_name: request.carrier_name,
                    tower: 42,
                    network_location: Some(loc(52.52, 13.40)),
                }
                .encode_to_vec(),
            )
        }
        RpcMethod::GetAppInstList | RpcMethod::GetCloudletList => reply(
            CloudletListReply {
                ver: 1,
                status: ReplyStatus::RsSuccess.into(),
                cloudlets: vec![CloudletLocation {
                    carrier_name: "acme".into(),
                    cloudlet_name: "frankfurt-1".into(),
                    gps_location: Some(loc(50.11, 8.68)),
                    distance: 12.5,
                    appinstances: vec![Appinstance {
                        app_name: "demo-app".into(),
                        app_vers: "1.0".into(),
                        fqdn: "cloudlet-1.example.net".into(),
                        ports: Vec::new(),
                    }],
                }],
            }
            .encode_to_vec(),
        ),
        RpcMethod::AddUserToGroup => {
            let request: DynamicLocGroupRequest = decode(frame);
            reply(
                DynamicLocGroupReply {
                    ver: 1,
                    status: ReplyStatus::RsSuccess.into(),
                    error_code: 0,
                    group_cookie: format!("group-{}", request.lg_id),
                }
                .encode_to_vec(),
            )
        }
        RpcMethod::GetQosPositionKpi => {
            let request: QosPositionRequest = decode(frame);
            let mut frames: Vec<RpcFrame> = request
                .positions
                .into_iter()
                .map(|position| {
                    let kpi = QosPositionKpiReply {
                        ver: 1,
                        status: ReplyStatus::RsSuccess.into(),
                        position_results: vec![QosPositionKpiResult {
                            positionid: position.positionid,
                            gps_location: position.gps_location,
                            latency_avg: 12.0,
                            ..Default::default()
                        }],
                    };
                    RpcFrame::stream_item(id, method, kpi.encode_to_vec())
                })
                .collect();
            frames.push(RpcFrame::stream_end(id, method));
            frames
        }
        RpcMethod::MethodUnknown => vec![RpcFrame::error(
            id,
            method,
            StatusCode::Unimplemented,
            "unknown method",
        )],
    }
}

/// Wi-Fi as the default route plus a cellular network that comes up on request
pub fn wifi_and_cellular() -> Arc<SimulatedConnectivity> {
    Arc::new(
        SimulatedConnectivity::new()
            .with_network(SimulatedNetwork::new(1, TransportKind::WiFi))
            .with_network(
                SimulatedNetwork::new(2, TransportKind::Cellular)
                    .available_after(Duration::from_millis(20)),
            )
            .with_active(NetworkHandle(1)),
    )
}

pub fn engine(config: EngineConfig, connectivity: Arc<SimulatedConnectivity>) -> Arc<MatchingEngine> {
    Arc::new(
        MatchingEngine::new(config, connectivity, Arc::new(TcpChannelFactory::default())).unwrap(),
    )
}
