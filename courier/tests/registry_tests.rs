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

use std::time::Duration;

use courier::prelude::*;
use courier_test::prelude::*;

use crate::setup::{initialize_tracing, CountingBehavior, RecordingHandler};

mod setup;

#[courier_test]
async fn test_message_offered_only_to_handlers_of_its_kind() -> anyhow::Result<()> {
    initialize_tracing();
    let text = RecordingHandler::new("text", &[MessageKind::Text]);
    let balance = RecordingHandler::new("balance", &[MessageKind::BalanceCheck]);

    let mut agent = Agent::new("Dispatcher");
    agent.register_handler(text.clone()).register_handler(balance.clone());

    let invoked = agent.process_message(&Message::text("hello sun")).await;
    assert_eq!(invoked, 1);
    assert_eq!(text.handled(), vec!["text:hello sun"]);
    assert!(balance.handled().is_empty());
    assert_eq!(balance.offered.load(std::sync::atomic::Ordering::SeqCst), 0);

    let invoked = agent
        .process_message(&Message::new(MessageKind::TransactionRequest, "tx"))
        .await;
    assert_eq!(invoked, 0, "no handler registered for transaction requests");
    Ok(())
}

#[courier_test]
async fn test_rejecting_handler_is_never_invoked() -> anyhow::Result<()> {
    initialize_tracing();
    let picky = RecordingHandler::new("picky", &[MessageKind::Text]).accepting("crypto");

    let mut agent = Agent::new("Picky");
    agent.register_handler(picky.clone());

    assert_eq!(agent.process_message(&Message::text("moon sky")).await, 0);
    assert!(picky.handled().is_empty());
    assert_eq!(agent.process_message(&Message::text("crypto sky")).await, 1);
    assert_eq!(picky.handled(), vec!["picky:crypto sky"]);
    Ok(())
}

#[courier_test]
async fn test_every_accepting_handler_runs_in_registration_order() -> anyhow::Result<()> {
    initialize_tracing();
    let first = RecordingHandler::new("first", &[MessageKind::Text]);
    let second = RecordingHandler::new("second", &[MessageKind::Text, MessageKind::Text]);
    let both = RecordingHandler::new("both", &[MessageKind::Text, MessageKind::BalanceCheck]);
    let log = first.handled.clone();
    let second = RecordingHandler {
        handled: log.clone(),
        ..second
    };
    let both = RecordingHandler {
        handled: log.clone(),
        ..both
    };

    let mut agent = Agent::new("Ordered");
    agent
        .register_handler(first)
        .register_handler(second)
        .register_handler(both);

    assert_eq!(agent.process_message(&Message::text("ocean")).await, 3);
    assert_eq!(
        log.lock().clone(),
        vec!["first:ocean", "second:ocean", "both:ocean"],
        "a handler listing a kind twice is still invoked once"
    );
    Ok(())
}

#[courier_test]
async fn test_failing_handler_does_not_stop_dispatch() -> anyhow::Result<()> {
    initialize_tracing();
    let broken = RecordingHandler::new("broken", &[MessageKind::Text]).failing();
    let healthy = RecordingHandler::new("healthy", &[MessageKind::Text]);

    let mut agent = Agent::new("Resilient");
    agent.register_handler(broken.clone()).register_handler(healthy.clone());

    assert_eq!(agent.process_message(&Message::text("universe")).await, 2);
    assert_eq!(broken.handled().len(), 1);
    assert_eq!(healthy.handled(), vec!["healthy:universe"]);
    Ok(())
}

#[courier_test]
async fn test_behavior_acts_only_when_due() -> anyhow::Result<()> {
    initialize_tracing();
    let hourly = CountingBehavior::new("hourly", Duration::from_secs(3600));
    let always = CountingBehavior::new("always", Duration::ZERO);

    let mut agent = Agent::new("Scheduler");
    agent
        .register_behavior(hourly.clone())
        .register_behavior(always.clone());

    assert_eq!(agent.run_behaviors().await, 2, "never-fired behaviors are due");
    assert_eq!(agent.run_behaviors().await, 1);
    assert_eq!(agent.run_behaviors().await, 1);
    assert_eq!(hourly.count(), 1);
    assert_eq!(always.count(), 3);
    Ok(())
}

#[courier_test]
async fn test_behavior_due_again_after_its_interval() -> anyhow::Result<()> {
    initialize_tracing();
    let short = CountingBehavior::new("short", Duration::from_millis(30));

    let mut agent = Agent::new("Interval");
    agent.register_behavior(short.clone());

    agent.run_behaviors().await;
    agent.run_behaviors().await;
    assert_eq!(short.count(), 1);
    tokio::time::sleep(Duration::from_millis(40)).await;
    agent.run_behaviors().await;
    assert_eq!(short.count(), 2);
    Ok(())
}

#[courier_test]
async fn test_failing_behavior_waits_for_next_interval() -> anyhow::Result<()> {
    initialize_tracing();
    let flaky = CountingBehavior::new("flaky", Duration::from_secs(3600)).failing();
    let steady = CountingBehavior::new("steady", Duration::ZERO);

    let mut agent = Agent::new("Flaky");
    agent
        .register_behavior(flaky.clone())
        .register_behavior(steady.clone());

    agent.run_behaviors().await;
    agent.run_behaviors().await;
    assert_eq!(flaky.count(), 1, "no retry within the interval");
    assert_eq!(steady.count(), 2);
    Ok(())
}
