use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use spigot::config::Config;
use spigot::eval::UplcEngine;
use spigot::logging::init_tracing;
use spigot::node::{N2cConnector, NodeConnector, NodeSession};
use spigot::{api, rpc};

/// Opens one session and reads the current era.
async fn check_node(connector: &N2cConnector) -> anyhow::Result<()> {
    let mut session = connector
        .open()
        .await
        .context("could not connect to cardano node")?;
    let era = session.current_era().await;
    session.close().await;

    let era = era.context("cardano node did not answer")?;
    info!(%era, "connected to cardano node");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing `.env` file is fine, deployments configure through the environment
    dotenv::dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        // help, version and usage errors print themselves
        Err(e) => match e.downcast::<clap::Error>() {
            Ok(e) => e.exit(),
            Err(e) => return Err(e),
        },
    };

    init_tracing(&config.logging_level, config.logging_format)?;

    let connector = N2cConnector::new(
        config.socket_path.clone(),
        config.magic(),
        config.connect_timeout(),
        config.query_timeout(),
    );

    if config.skip_check {
        warn!("skipping cardano node connectivity check");
    } else {
        check_node(&connector).await?;
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "could not listen for ctrl-c");
            }
            info!("shutting down");
            cancel.cancel();
        }
    });

    let rest = async {
        match config.api_address() {
            Some(addr) => api::serve(
                addr,
                connector.clone(),
                config.logging_healthchecks,
                cancel.clone(),
            )
            .await
            .context("REST api failed"),
            None => Ok(()),
        }
    };

    let gateway = rpc::Gateway::new(
        connector.clone(),
        Arc::new(UplcEngine),
        config.mempool_poll_interval(),
    );
    let json_rpc = async {
        match config.rpc_address() {
            Some(addr) => rpc::serve(addr, gateway, cancel.clone())
                .await
                .context("JSON-RPC api failed"),
            None => Ok(()),
        }
    };

    let result = tokio::try_join!(rest, json_rpc);
    // one listener failing stops the other
    cancel.cancel();
    result?;

    Ok(())
}
