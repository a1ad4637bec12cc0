use std::sync::Arc;

use structopt::StructOpt;
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use broker::error::BrokerError;
use broker::registry::{Registry, SessionHandle};
use broker::{client_handler, gameserver_handler, Params};
use protocol::{GameServerControl, Transport};

#[tokio::main]
async fn main() -> Result<(), BrokerError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "broker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let params = Params::from_args();
    let registry = Arc::new(Registry::new());

    let player_listener = TcpListener::bind(params.player_addr).await?;
    let gameserver_listener = TcpListener::bind(params.gameserver_addr).await?;

    tracing::info!(
        player_addr = %params.player_addr,
        gameserver_addr = %params.gameserver_addr,
        "broker listening",
    );

    let player_registry = registry.clone();
    let player_accept_loop = tokio::spawn(async move {
        loop {
            match player_listener.accept().await {
                Ok((stream, addr)) => {
                    let registry = player_registry.clone();
                    tracing::info!(%addr, "player connected");
                    tokio::spawn(async move {
                        let transport = Arc::new(Transport::new(stream));
                        client_handler::run(registry, transport).await;
                        tracing::info!(%addr, "player disconnected");
                    });
                }
                Err(e) => tracing::warn!(error = %e, "failed to accept player connection"),
            }
        }
    });

    let gameserver_registry = registry.clone();
    let gameserver_accept_loop = tokio::spawn(async move {
        loop {
            match gameserver_listener.accept().await {
                Ok((stream, addr)) => {
                    let registry = gameserver_registry.clone();
                    tracing::info!(%addr, "game-server connection opened");
                    tokio::spawn(register_gameserver(registry, stream));
                }
                Err(e) => tracing::warn!(error = %e, "failed to accept game-server connection"),
            }
        }
    });

    let _ = tokio::join!(player_accept_loop, gameserver_accept_loop);
    Ok(())
}

/// Reads the handshake frame a newly connected game-server must send first
/// (§6.4), registers its session handle, then hands off to the long-lived
/// game-server handler (C6) for the rest of its connection's lifetime.
async fn register_gameserver(registry: Arc<Registry>, stream: TcpStream) {
    let control_channel = Arc::new(Transport::new(stream));

    let handshake = match control_channel.receive().await {
        Ok(frame) => frame,
        Err(_) => return,
    };

    let (host, port) = match handshake.parse::<GameServerControl>() {
        Ok(GameServerControl::Handshake { host, port }) => (host, port),
        _ => {
            tracing::warn!("game-server connection did not open with a handshake frame");
            return;
        }
    };

    let listen_address = match format!("{}:{}", host, port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::warn!(host = %host, port, error = %e, "game-server sent an unparsable listen address");
            return;
        }
    };

    let handle = SessionHandle::new(control_channel, listen_address);
    registry.register(handle.clone()).await;
    tracing::info!(room_id = %handle.room_id, %listen_address, "game-server registered");

    gameserver_handler::run(registry, handle).await;
}
