use checkout_server::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (dotenv, logging)
    setup_environment();

    tracing::info!("Checkout server starting...");

    // 2. Load configuration
    let config = Config::from_env();

    // 3. Build application state
    let state = ServerState::initialize(&config);

    // 4. Run the HTTP server (starts background tasks)
    let server = Server::with_state(config, state);
    server.run().await
}
