/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use courier::backend::{InMemoryBroker, RedisBroker};
use courier::common::{init_tracing, AgentRuntime, ConfigSource, CourierApp, CourierConfig};
use courier::ledger::{one_token, InMemoryLedger, RpcLedgerConnector};
use courier::traits::{LedgerConnector, LedgerService, TransferBroker};
use courier::transfer::TransferWorker;

const DEMO_DECIMALS: u8 = 18;
const DEMO_FUNDING_TOKENS: u128 = 10;

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "Cooperative agents with queued token transfers")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    debug: bool,

    /// Read configuration from this file instead of the XDG locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the agent ring against Redis and the configured chain node
    Agents,
    /// Run a transfer worker against Redis and the chain node named in each job
    Worker,
    /// Run agents and a worker in one process over in-memory backends
    Demo {
        /// Stop after this many seconds instead of waiting for a signal
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, source) = match &cli.config {
        Some(path) => {
            let mut config = CourierConfig::load_from_path(path)?;
            config.apply_env();
            (config, ConfigSource::File(path.clone()))
        }
        None => CourierConfig::load_with_source(),
    };
    let _guard = init_tracing(cli.debug, &config.logging);
    source.log();

    let result = match cli.command {
        Command::Agents => run_agents(config).await,
        Command::Worker => run_worker(config).await,
        Command::Demo { seconds } => run_demo(config, seconds.map(Duration::from_secs)).await,
    };
    if let Err(e) = &result {
        error!("System error: {e:#}");
    }
    result
}

async fn run_agents(config: CourierConfig) -> anyhow::Result<()> {
    info!("Starting autonomous agents system");
    let broker: Arc<dyn TransferBroker> = Arc::new(RedisBroker::new(&config.backend)?);
    let ledger = RpcLedgerConnector::from_config(&config)
        .connect(&config.ledger.provider_url, &config.ledger.token_address)
        .context("invalid ledger configuration")?;

    let runtime = CourierApp::launch_with_config(config);
    start_agents(&runtime, broker, ledger).await?;
    shutdown_signal(None).await;
    runtime.shutdown_all().await
}

async fn run_worker(config: CourierConfig) -> anyhow::Result<()> {
    let broker: Arc<dyn TransferBroker> = Arc::new(RedisBroker::new(&config.backend)?);
    let connector: Arc<dyn LedgerConnector> = Arc::new(RpcLedgerConnector::from_config(&config));
    let worker = TransferWorker::from_config(broker, connector, &config);

    let runtime = CourierApp::launch_with_config(config);
    runtime.spawn_worker(worker);
    shutdown_signal(None).await;
    runtime.shutdown_all().await
}

async fn run_demo(mut config: CourierConfig, limit: Option<Duration>) -> anyhow::Result<()> {
    info!("Starting in-process demo");
    let ledger = InMemoryLedger::new(DEMO_DECIMALS);
    let funding = DEMO_FUNDING_TOKENS * one_token(DEMO_DECIMALS)?;

    config.agents = config.agent_settings();
    for (index, agent) in config.agents.iter_mut().enumerate() {
        if agent.wallet_address.is_empty() {
            agent.wallet_address = format!("0x{:040x}", index + 1);
        }
        if agent.private_key.is_empty() {
            agent.private_key = format!("demo-key-{}", index + 1);
        }
        ledger.set_balance(&agent.wallet_address, funding);
    }
    if config.ledger.target_address.is_empty() {
        config.ledger.target_address = format!("0x{:040x}", 0xff);
    }

    let broker: Arc<dyn TransferBroker> = Arc::new(InMemoryBroker::new());
    let worker = TransferWorker::from_config(Arc::clone(&broker), Arc::new(ledger.clone()), &config);

    let runtime = CourierApp::launch_with_config(config);
    runtime.spawn_worker(worker);
    start_agents(&runtime, broker, Arc::new(ledger)).await?;
    shutdown_signal(limit).await;
    runtime.shutdown_all().await
}

async fn start_agents(
    runtime: &AgentRuntime,
    broker: Arc<dyn TransferBroker>,
    ledger: Arc<dyn LedgerService>,
) -> anyhow::Result<()> {
    let agents = CourierApp::build_agents(runtime.config(), broker, ledger).await?;
    for agent in agents {
        runtime.spawn_agent(agent);
    }
    Ok(())
}

/// Resolves on SIGINT or SIGTERM, or once `limit` has elapsed.
async fn shutdown_signal(limit: Option<Duration>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let elapsed = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
        () = elapsed => {}
    }
}
