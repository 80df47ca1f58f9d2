use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use baize_club::{Club, MemoryStore};
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod context;
mod debtors;
mod errors;
mod schemas;
mod serialized;
mod shift;
mod tables;

pub use context::ServerContext;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9640;

pub type Router = axum::Router<ServerContext>;

/// Starts the baize server on top of an initialized club
pub async fn run_server(club: Arc<Club<MemoryStore>>) {
    let port = env::var("BAIZE_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/tables", tables::router())
        .nest("/debtors", debtors::router())
        .merge(shift::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .layer(cors)
        .with_state(ServerContext { club });

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {port}");

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}
