use cloudlet_client::network::{SimulatedConnectivity, SimulatedNetwork, TransportKind};
use cloudlet_client::transport::TcpChannelFactory;
use cloudlet_client::{EngineConfig, FixedLocation, GeoLocation, MatchingEngine, NetworkHandle};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = EngineConfig::from_env()?;

    // Wi-Fi is the default route; cellular comes up shortly after being requested
    let connectivity = Arc::new(
        SimulatedConnectivity::new()
            .with_network(SimulatedNetwork::new(1, TransportKind::WiFi))
            .with_network(
                SimulatedNetwork::new(2, TransportKind::Cellular)
                    .available_after(Duration::from_millis(50)),
            )
            .with_active(NetworkHandle(1)),
    );

    let engine = Arc::new(
        MatchingEngine::new(
            config,
            connectivity.clone(),
            Arc::new(TcpChannelFactory::default()),
        )?
        .with_location_provider(Arc::new(FixedLocation(Some(GeoLocation::new(
            52.5200, 13.4050,
        ))))),
    );
    info!("Cloudlet client starting against {}", engine.endpoint().host);

    let location = engine.last_known_location(Duration::from_secs(2)).await?;

    let Some(register) =
        engine.create_register_request("demo-dev", "demo-app", "1.0", None)?
    else {
        warn!("Location services disabled, nothing to do");
        return Ok(());
    };
    if let Err(e) = engine.register_client(register, CALL_TIMEOUT).await {
        error!("RegisterClient failed: {}", e);
        return Ok(());
    }
    info!("Session cookie: {:?}", engine.session_cookie());

    if let Some(request) = engine.create_find_cloudlet_request(&location)? {
        match engine.find_cloudlet_future(request, CALL_TIMEOUT).await?.await {
            Ok(found) if found.is_found() => {
                info!("Closest cloudlet: {}:{}", found.server, found.port)
            }
            Ok(found) => warn!("No cloudlet found ({:?})", found.status),
            Err(e) => error!("FindCloudlet failed: {}", e),
        }
    }

    if let Some(request) = engine.create_verify_location_request(&location)? {
        match engine.verify_location(request, CALL_TIMEOUT).await {
            Ok(reply) => info!(
                "Location verified: tower={} gps={} accuracy={}km",
                reply.tower_status, reply.gps_location_status, reply.gps_location_accuracy_km
            ),
            Err(e) => error!("VerifyLocation failed: {}", e),
        }
    }

    if let Some(request) = engine.create_qos_position_request(&[(1, location)])? {
        match engine.get_qos_position_kpi(request, CALL_TIMEOUT).await {
            Ok(mut kpis) => {
                while let Some(item) = kpis.next().await {
                    match item {
                        Ok(reply) => info!("QoS results: {}", reply.position_results.len()),
                        Err(e) => {
                            error!("QoS stream failed: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => error!("QosPositionKpi failed: {}", e),
        }
    }

    info!(
        "Done; {} network requests, bound network {:?}",
        connectivity.request_count(),
        engine.coordinator().bound_network()
    );
    Ok(())
}
