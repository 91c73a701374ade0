use clap::Parser;
use ragapi_server::{Args, Settings, run_server, telemetry::init_telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_args(Args::parse())?;
    init_telemetry(settings.log_format)?;

    run_server(settings).await
}
