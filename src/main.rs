use conduit::config::Config;
use conduit::db;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[rocket::main]
async fn main() {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("conduit=info,rocket=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = Config::from_env().expect("Invalid configuration");
    let pool = db::init_pool(&config.database_url).expect("Failed to create database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");

    info!("starting conduit");
    if let Err(e) = conduit::rocket(config, pool).launch().await {
        error!("conduit stopped: {}", e);
        std::process::exit(1);
    }
}
