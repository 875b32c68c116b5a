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

use std::io::Write;

use courier::common::{ConfigError, ConfigSource, CourierConfig};
use courier_test::prelude::*;

use crate::setup::initialize_tracing;

mod setup;

#[courier_test]
async fn test_load_config_from_file() -> anyhow::Result<()> {
    initialize_tracing();
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"
[timeouts]
tick_interval_ms = 250
shutdown_timeout_ms = 1500

[backend]
redis_url = "redis://queue:6379/2"

[behaviors]
vocabulary = ["alpha", "beta", "gamma"]

[ledger]
token_address = "0x3333333333333333333333333333333333333333"

[[agents]]
name = "Scout"
wallet_address = "0x1111111111111111111111111111111111111111"
"#
    )?;

    let config = CourierConfig::load_from_path(file.path())?;
    assert_eq!(config.timeouts.tick_interval_ms, 250);
    assert_eq!(config.shutdown_timeout().as_millis(), 1500);
    assert_eq!(config.timeouts.dequeue_timeout_secs, 1, "unset keys keep defaults");
    assert_eq!(config.backend.redis_url, "redis://queue:6379/2");
    assert_eq!(config.backend.queue_name, "crypto_transfers");
    assert_eq!(config.behaviors.vocabulary, vec!["alpha", "beta", "gamma"]);
    assert_eq!(config.behaviors.greeting_token, "hello");
    assert_eq!(config.ledger.gas_limit, 1_000_000);

    let agents = config.agent_settings();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].name, "Scout");
    assert!(agents[0].private_key.is_empty());
    Ok(())
}

#[courier_test]
async fn test_malformed_config_is_a_parse_error() -> anyhow::Result<()> {
    initialize_tracing();
    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, "[timeouts]\ntick_interval_ms = \"soon\"\n")?;

    let error = CourierConfig::load_from_path(file.path()).unwrap_err();
    assert!(matches!(error, ConfigError::Parse { .. }), "{error}");
    Ok(())
}

#[courier_test]
async fn test_missing_config_is_a_read_error() -> anyhow::Result<()> {
    initialize_tracing();
    let dir = tempfile::tempdir()?;
    let error = CourierConfig::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(error, ConfigError::Read { .. }));
    Ok(())
}

#[courier_test]
async fn test_xdg_load_reports_its_source() -> anyhow::Result<()> {
    initialize_tracing();
    let home = tempfile::tempdir()?;
    let dir = home.path().join("courier");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("config.toml");
    std::fs::write(&path, "[timeouts]\ntick_interval_ms = 40\n")?;
    std::env::set_var("XDG_CONFIG_HOME", home.path());

    let (config, source) = CourierConfig::load_with_source();
    assert_eq!(config.timeouts.tick_interval_ms, 40);
    assert_eq!(source, ConfigSource::File(path.clone()));

    std::fs::write(&path, "[timeouts]\ntick_interval_ms = \"soon\"\n")?;
    let (config, source) = CourierConfig::load_with_source();
    assert_eq!(config.timeouts.tick_interval_ms, 100);
    assert!(matches!(source, ConfigSource::Fallback(ref reason) if reason.contains("config.toml")));
    Ok(())
}
