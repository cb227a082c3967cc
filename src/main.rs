use std::process::ExitCode;

use anyhow::Context;
use lantern::config::Config;
use lantern::server::Server;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load();

    // Every fatal error, startup or wait, is reported here and only here.
    match serve(&cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(cfg: &Config) -> anyhow::Result<()> {
    let server = Server::bind(cfg).context("startup failed")?;
    let shutdown = server.shutdown_handle();

    // All socket work stays on this one thread.
    let mut event_loop = tokio::task::spawn_blocking(move || server.run());

    tokio::select! {
        res = &mut event_loop => {
            res.context("event loop panicked")??;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            shutdown.trigger().context("failed to wake event loop")?;
            event_loop.await.context("event loop panicked")??;
        }
    }

    Ok(())
}
