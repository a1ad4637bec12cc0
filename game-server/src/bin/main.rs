use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use game_server::error::GameServerError;
use game_server::{GameServer, Params};
use protocol::{Frame, GameServerControl, Transport};

/// Backoff schedule for the initial connection to the broker (§5
/// "Timeouts").
const BROKER_RECONNECT_SCHEDULE: [Duration; 3] =
    [Duration::from_secs(1), Duration::from_secs(3), Duration::from_secs(10)];

#[tokio::main]
async fn main() -> Result<(), GameServerError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "game_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let params = Params::from_args();

    let listener = TcpListener::bind(params.listen_addr).await?;
    tracing::info!(listen_addr = %params.listen_addr, "game-server listening for players");

    let broker_control = Transport::connect_with_backoff(params.broker_addr, &BROKER_RECONNECT_SCHEDULE).await?;
    tracing::info!(broker_addr = %params.broker_addr, "connected to broker");

    let handshake = GameServerControl::Handshake {
        host: params.listen_addr.ip().to_string(),
        port: params.listen_addr.port(),
    };
    broker_control.send(Frame::from_payload(&handshake)?).await?;

    let game_server = GameServer::new(Arc::new(broker_control));
    game_server.serve(listener).await;

    Ok(())
}
