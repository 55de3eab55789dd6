use std::sync::Arc;

use battleship_server::config::default_config_provider;
use log::error;

#[tokio::main]
async fn main() {
    pretty_env_logger::init_timed();

    let config = Arc::new(default_config_provider());
    if let Err(e) = battleship_server::run(config).await {
        error!("server exited with an error: {e}");
        std::process::exit(1);
    }
}
