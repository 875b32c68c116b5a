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

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use courier::ledger::one_token;
use courier::prelude::*;
use courier_test::prelude::*;

use crate::setup::{eventually, initialize_tracing, template, transfer_job, SOURCE, TARGET};

mod setup;

fn worker(broker: &Arc<InMemoryBroker>, ledger: &InMemoryLedger) -> TransferWorker {
    TransferWorker::new(broker.clone(), Arc::new(ledger.clone()))
        .with_timeouts(Duration::from_millis(50), Duration::from_millis(10))
}

#[courier_test]
async fn test_trigger_queues_one_whole_token() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(18);
    let handler = CryptoTransferHandler::from_ledger(broker.clone(), template(), &ledger).await?;
    assert_eq!(handler.amount(), 1_000_000_000_000_000_000);

    let mut agent = Agent::new("Agent1");
    agent.register_handler(handler);
    agent.inbox().put(Message::text("crypto moon"));
    agent.tick().await;

    assert_eq!(broker.queued(), 1);
    assert!(broker.is_connected());
    let queued = broker.pop(Duration::ZERO).await?.expect("one job queued");
    let job = queued.decode()?;
    assert_eq!(job.amount, 1_000_000_000_000_000_000);
    assert_eq!(job.requesting_agent, "Agent1");
    assert_eq!(job.source_identity, SOURCE);
    assert_eq!(job.target_identity, TARGET);
    Ok(())
}

#[courier_test]
async fn test_non_trigger_message_queues_nothing() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let handler = CryptoTransferHandler::new(broker.clone(), template(), 1, 0);

    let mut agent = Agent::new("Agent1");
    agent.register_handler(handler);
    agent.inbox().put(Message::text("hello sun"));
    agent.tick().await;

    assert_eq!(broker.queued(), 0);
    assert!(!broker.is_connected());
    Ok(())
}

#[courier_test]
async fn test_insufficient_balance_fails_without_submitting() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(18).with_balance(SOURCE, 1000);
    let worker = worker(&broker, &ledger);

    let job = transfer_job("Agent1", 2000);
    let outcome = worker
        .process(&QueuedJob::new(job.to_payload()?))
        .await
        .expect("outcome published");

    let message = outcome.error_message().expect("failure outcome");
    assert!(message.to_lowercase().contains("insufficient balance"), "{message}");
    assert!(ledger.submissions().is_empty());
    assert_eq!(ledger.balance(SOURCE), 1000);
    assert_eq!(broker.peek("Agent1"), Some(outcome));
    Ok(())
}

#[courier_test]
async fn test_confirmed_transfer_is_delivered_exactly_once() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(18).with_balance(SOURCE, 5000);
    let worker = worker(&broker, &ledger);

    let outcome = worker
        .process(&QueuedJob::new(transfer_job("Agent1", 2000).to_payload()?))
        .await
        .expect("outcome published");
    let receipt = outcome.receipt().expect("success outcome").clone();
    assert!(receipt.tx_hash.starts_with("0x"));
    assert!(receipt.block_number > 0);
    assert_eq!(receipt.sender, SOURCE);
    assert_eq!(receipt.gas_used, 21_000);
    assert_eq!(receipt.amount, Some(2000));
    assert_eq!(ledger.balance(TARGET), 2000);

    assert_eq!(broker.take("Agent1").await?, Some(outcome));
    assert_eq!(broker.take("Agent1").await?, None);
    Ok(())
}

#[courier_test]
async fn test_handler_drains_previous_outcome_before_queueing() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(0).with_balance(SOURCE, 10);
    let worker = worker(&broker, &ledger);

    let mut agent = Agent::new("Agent1");
    agent.register_handler(CryptoTransferHandler::from_ledger(broker.clone(), template(), &ledger).await?);

    agent.inbox().put(Message::text("crypto"));
    agent.tick().await;
    let queued = broker.pop(Duration::ZERO).await?.expect("first job");
    assert!(worker.process(&queued).await.is_some_and(|o| o.is_success()));
    assert!(broker.peek("Agent1").is_some());

    agent.inbox().put(Message::text("crypto sky"));
    agent.tick().await;
    assert_eq!(broker.peek("Agent1"), None, "the handler consumed the outcome");
    assert_eq!(broker.queued(), 1);
    Ok(())
}

#[courier_test]
async fn test_reverted_transfer_publishes_failure() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(18).with_balance(SOURCE, 5000);
    ledger.set_confirms(false);
    let worker = worker(&broker, &ledger);

    let outcome = worker.execute(&transfer_job("Agent2", 10)).await;
    assert_eq!(outcome.error_message(), Some("Transaction failed"));
    assert_eq!(ledger.submissions().len(), 1);
    Ok(())
}

#[courier_test]
async fn test_ledger_errors_become_failures() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(18);
    ledger.set_unavailable(Some("node unreachable".to_string()));
    let worker = worker(&broker, &ledger);

    let outcome = worker
        .process(&QueuedJob::new(transfer_job("Agent1", 1).to_payload()?))
        .await
        .expect("outcome published");
    assert!(outcome.error_message().is_some_and(|m| m.contains("node unreachable")));
    assert_eq!(broker.peek("Agent1"), Some(outcome));
    Ok(())
}

#[courier_test]
async fn test_malformed_job_is_reported_to_its_agent() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(18);
    let worker = worker(&broker, &ledger);

    let partial = r#"{"agent_name":"Agent2","source_address":"0xabc","amount":"lots"}"#;
    let outcome = worker
        .process(&QueuedJob::new(partial))
        .await
        .expect("reported to Agent2");
    assert!(!outcome.is_success());
    assert_eq!(broker.peek("Agent2"), Some(outcome));

    assert!(worker.process(&QueuedJob::new("not json")).await.is_none());
    Ok(())
}

#[courier_test]
async fn test_status_read_is_destructive() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = InMemoryBroker::new();
    let first = TransferOutcome::failure(None, "first");
    let second = TransferOutcome::failure(None, "second");

    broker.publish("Agent1", &first).await?;
    broker.publish("Agent1", &second).await?;
    assert_eq!(broker.take("Agent1").await?, Some(second), "last value wins");
    assert_eq!(broker.take("Agent1").await?, None);
    assert_eq!(broker.take("Agent2").await?, None);
    Ok(())
}

#[courier_test]
async fn test_each_job_processed_exactly_once() -> anyhow::Result<()> {
    initialize_tracing();
    const JOBS: usize = 40;
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(0).with_balance(SOURCE, 1_000_000);

    for n in 0..JOBS {
        broker.push(&transfer_job(&format!("agent-{n}"), 1)).await?;
    }

    let workers: Vec<_> = (0..2).map(|_| Arc::new(worker(&broker, &ledger))).collect();
    let tasks: Vec<_> = workers
        .iter()
        .map(|worker| {
            let worker = Arc::clone(worker);
            tokio::spawn(async move { worker.run().await })
        })
        .collect();

    assert!(eventually(Duration::from_secs(5), || ledger.submissions().len() >= JOBS).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    for worker in &workers {
        worker.shutdown();
    }
    for task in tasks {
        tokio::time::timeout(Duration::from_secs(2), task).await??;
    }

    assert_eq!(ledger.submissions().len(), JOBS);
    assert_eq!(broker.queued(), 0);
    let delivered: HashSet<String> = (0..JOBS)
        .filter(|n| broker.peek(&format!("agent-{n}")).is_some_and(|o| o.is_success()))
        .map(|n| format!("agent-{n}"))
        .collect();
    assert_eq!(delivered.len(), JOBS);
    assert_eq!(ledger.balance(TARGET), JOBS as u128);
    Ok(())
}

#[courier_test]
async fn test_worker_survives_backend_outage() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(0).with_balance(SOURCE, 10);
    let worker = Arc::new(worker(&broker, &ledger));

    broker.set_unavailable(true);
    let task = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.run().await })
    };
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!task.is_finished());

    broker.set_unavailable(false);
    broker.push(&transfer_job("Agent1", 3)).await?;
    assert!(eventually(Duration::from_secs(2), || broker.peek("Agent1").is_some()).await);

    worker.shutdown();
    tokio::time::timeout(Duration::from_secs(2), task).await??;
    assert!(!broker.is_connected());
    Ok(())
}

#[courier_test]
async fn test_runtime_hosts_worker_and_agents_end_to_end() -> anyhow::Result<()> {
    initialize_tracing();
    let mut config = CourierConfig::default();
    config.timeouts.tick_interval_ms = 5;
    config.timeouts.dequeue_timeout_secs = 1;
    config.timeouts.shutdown_timeout_ms = 3_000;

    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(18).with_balance(SOURCE, 3 * one_token(18)?);
    let runtime = CourierApp::launch_with_config(config);
    runtime.spawn_worker(worker(&broker, &ledger));

    let mut agent = Agent::new("Agent1").with_tick_interval(Duration::from_millis(5));
    agent.register_handler(CryptoTransferHandler::from_ledger(broker.clone(), template(), &ledger).await?);
    agent.inbox().put(Message::text("crypto"));
    runtime.spawn_agent(agent);

    assert!(eventually(Duration::from_secs(3), || ledger.balance(TARGET) == one_token(18).unwrap_or_default()).await);
    assert!(eventually(Duration::from_secs(2), || broker.peek("Agent1").is_some()).await);

    runtime.shutdown_all().await?;
    assert_eq!(runtime.task_count(), 0);
    Ok(())
}

#[courier_test]
async fn test_outcome_published_after_backend_recovers() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(0).with_balance(SOURCE, 10);
    let worker = Arc::new(worker(&broker, &ledger));
    let queued = QueuedJob::new(transfer_job("Agent1", 3).to_payload()?);

    broker.set_unavailable(true);
    let task = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.process(&queued).await })
    };

    assert!(eventually(Duration::from_secs(2), || ledger.balance(TARGET) == 3).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished(), "outcome is held until the backend returns");

    broker.set_unavailable(false);
    let outcome = tokio::time::timeout(Duration::from_secs(2), task)
        .await??
        .expect("outcome published");
    assert!(outcome.is_success());
    assert_eq!(broker.take("Agent1").await?, Some(outcome));
    assert_eq!(ledger.submissions().len(), 1);
    Ok(())
}

#[courier_test]
async fn test_publish_retry_stops_on_shutdown() -> anyhow::Result<()> {
    initialize_tracing();
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(0).with_balance(SOURCE, 10);
    let worker = Arc::new(worker(&broker, &ledger));
    let queued = QueuedJob::new(transfer_job("Agent1", 3).to_payload()?);

    broker.set_unavailable(true);
    let task = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.process(&queued).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    worker.shutdown();

    let outcome = tokio::time::timeout(Duration::from_secs(2), task).await??;
    assert!(outcome.is_some_and(|o| o.is_success()));
    broker.set_unavailable(false);
    assert_eq!(broker.take("Agent1").await?, None);
    Ok(())
}

#[courier_test]
async fn test_worker_names_are_never_reused() -> anyhow::Result<()> {
    initialize_tracing();
    let mut config = CourierConfig::default();
    config.timeouts.shutdown_timeout_ms = 2_000;
    let broker = Arc::new(InMemoryBroker::new());
    let ledger = InMemoryLedger::new(0);
    let runtime = CourierApp::launch_with_config(config);

    let first = runtime.spawn_worker(worker(&broker, &ledger));
    let second = runtime.spawn_worker(worker(&broker, &ledger));
    assert_ne!(first.id(), second.id());
    assert_eq!(runtime.task_count(), 2);

    second.stop().await?;
    runtime.shutdown_all().await?;
    assert_eq!(runtime.task_count(), 0);

    let third = runtime.spawn_worker(worker(&broker, &ledger));
    assert_ne!(third.id(), first.id());
    assert_ne!(third.id(), second.id());
    let fourth = runtime.spawn_worker(worker(&broker, &ledger));
    assert_ne!(fourth.id(), third.id());
    assert_eq!(runtime.task_count(), 2, "no handle was replaced");

    runtime.shutdown_all().await?;
    assert_eq!(runtime.task_count(), 0);
    Ok(())
}
