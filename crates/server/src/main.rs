use anyhow::Context;
use server::ServerConfig;

/// `munirag-server [PIPELINE_YAML]`. The optional argument overrides `pipeline_config`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = ServerConfig::load().context("loading server configuration")?;
    if let Some(path) = std::env::args_os().nth(1) {
        config.pipeline_config = Some(path.into());
    }
    server::start_server(config).await
}
