mod setup;

use std::sync::Arc;

use anyhow::Context;
use bridge_engine::{bridge_router, serve_stdio, InvokerFactory};
use bridge_logging::{bridge_info, bridge_warn};

use setup::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    setup::logging::initialize(&config.log);
    for warning in &config.warnings {
        bridge_warn!("{warning}");
    }

    bridge_info!(
        "notes bridge {} starting: backends {:?}, timeout {:?}",
        env!("CARGO_PKG_VERSION"),
        config.invoke.invoker_for(None).backend_names(),
        config.invoke.timeout
    );

    let router = Arc::new(bridge_router(Arc::new(config.invoke)));
    bridge_info!("Serving actions {:?}", router.actions());
    serve_stdio(router)
        .await
        .context("bridge host loop failed")?;

    bridge_info!("Input closed, shutting down");
    Ok(())
}
