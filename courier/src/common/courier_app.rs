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

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::agent::Agent;
use crate::behaviors::{BalanceCheckBehavior, RandomMessageBehavior};
use crate::common::{AgentRuntime, CourierConfig, CONFIG};
use crate::handlers::{CryptoTransferHandler, GreetingHandler, TransferTemplate};
use crate::traits::{LedgerService, TransferBroker};

/// Entry point for starting Courier.
#[derive(Default, Debug, Clone)]
pub struct CourierApp;

impl CourierApp {
    /// Starts a runtime with the process-wide configuration, [`CONFIG`].
    #[must_use]
    pub fn launch() -> AgentRuntime {
        trace!("Launching with global configuration");
        Self::launch_with_config(CONFIG.clone())
    }

    /// Starts a runtime with an explicit configuration.
    #[must_use]
    pub fn launch_with_config(config: CourierConfig) -> AgentRuntime {
        trace!("Configuration loaded: {:?}", config);
        AgentRuntime::new(config)
    }

    /// Builds the configured agents, fully equipped, wired into a ring in
    /// configuration order: each agent's outbox is the next one's inbox.
    ///
    /// Every agent gets the greeting and transfer handlers plus the random
    /// message and balance check behaviors.
    ///
    /// # Errors
    ///
    /// Fails when the ledger cannot report the token's decimals.
    pub async fn build_agents(
        config: &CourierConfig,
        broker: Arc<dyn TransferBroker>,
        ledger: Arc<dyn LedgerService>,
    ) -> anyhow::Result<Vec<Agent>> {
        let behaviors = &config.behaviors;
        let mut agents = Vec::new();
        for settings in config.agent_settings() {
            let mut agent = Agent::new(settings.name.clone()).with_tick_interval(config.tick_interval());

            let transfer = CryptoTransferHandler::from_ledger(
                Arc::clone(&broker),
                TransferTemplate::from_config(&config.ledger, &settings),
                ledger.as_ref(),
            )
            .await?
            .with_trigger(behaviors.transfer_trigger_token.clone());

            agent
                .register_handler(GreetingHandler::new(behaviors.greeting_token.clone()))
                .register_handler(transfer)
                .register_behavior(RandomMessageBehavior::from_config(behaviors))
                .register_behavior(BalanceCheckBehavior::new(
                    Arc::clone(&ledger),
                    settings.wallet_address.clone(),
                    Duration::from_millis(behaviors.balance_check_interval_ms),
                ));
            agents.push(agent);
        }

        if agents.len() > 1 {
            let inboxes: Vec<_> = agents.iter().map(|agent| agent.inbox().clone()).collect();
            for (index, agent) in agents.iter_mut().enumerate() {
                agent.set_outbox(inboxes[(index + 1) % inboxes.len()].clone());
            }
        }
        Ok(agents)
    }
}
