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

use crate::common::{LedgerError, LedgerResult};

/// Renders an amount in smallest units as a decimal token amount, e.g.
/// `1500000000000000000` with 18 decimals as `"1.5"`.
pub fn format_units(amount: u128, decimals: u8) -> String {
    let digits = amount.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// The smallest-unit amount of one whole token, `10^decimals`.
///
/// # Errors
///
/// Fails when the result does not fit in a `u128` (more than 38 decimals).
pub fn one_token(decimals: u8) -> LedgerResult<u128> {
    10u128.checked_pow(u32::from(decimals)).ok_or_else(|| {
        LedgerError::InvalidInput(format!("{decimals} decimals overflow a u128 amount"))
    })
}

/// Shortens an address for log lines: `0x1234...abcd`.
pub fn abbreviate(identity: &str) -> String {
    if identity.len() <= 13 || !identity.is_ascii() {
        return identity.to_string();
    }
    format!("{}...{}", &identity[..6], &identity[identity.len() - 4..])
}
