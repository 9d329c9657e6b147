use std::net::IpAddr;
use std::net::SocketAddr;
use std::str::FromStr;
use stockroom::app_state::AppState;
use stockroom::configuration::get_configuration;
use stockroom::create_app;
use stockroom::errors::{AppErrors, Error};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn bind_address(host: &str, port: u16) -> Result<SocketAddr, Error> {
    let host = IpAddr::from_str(host)?;
    Ok(SocketAddr::from((host, port)))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let configuration = get_configuration().map_err(AppErrors::from)?;
    let addr = bind_address(
        &configuration.application.host,
        configuration.application.port,
    )?;
    let app_state = AppState::try_from(&configuration.local_store).await?;
    let app = create_app(app_state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "serving product inventory");
    axum::serve(listener, app).await?;
    Ok(())
}
