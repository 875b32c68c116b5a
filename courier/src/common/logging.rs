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

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::common::LoggingConfig;

/// Installs the global tracing subscriber for a Courier process.
///
/// Console output is always enabled. `RUST_LOG` takes precedence; otherwise the
/// level is `debug` when `debug` is set and `info` when it is not. If a log
/// directory is configured, a daily rolling `courier.log` is written there as
/// well, and the returned guard must be kept alive to flush it.
pub fn init_tracing(debug: bool, logging: &LoggingConfig) -> Option<WorkerGuard> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let console = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .with_filter(filter());

    let (file, guard) = match logging.log_directory.as_deref() {
        Some(directory) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, directory, "courier.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_line_number(true)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
    {
        eprintln!("tracing already initialised: {e}");
    }
    guard
}
