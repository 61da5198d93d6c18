// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Split, SplitFunc, SplitResult};

/// When the pending partial token last grew, and how long it was then.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushState {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_data_change: DateTime<Utc>,
    #[serde(default)]
    pub last_data_length: usize,
}

impl FlushState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_data_change: now,
            last_data_length: 0,
        }
    }

    fn reset(&mut self, now: DateTime<Utc>) {
        self.last_data_change = now;
        self.last_data_length = 0;
    }

    fn expired(&self, now: DateTime<Utc>, period: Duration) -> bool {
        (now - self.last_data_change)
            .to_std()
            .map(|elapsed| elapsed > period)
            .unwrap_or(false)
    }
}

impl Default for FlushState {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// Forces a partial token out once it has not grown for `period`.
///
/// A zero period disables flushing and passes the inner result through.
pub struct Flush<S> {
    inner: S,
    state: FlushState,
    period: Duration,
}

impl<S> Flush<S> {
    pub fn new(inner: S, state: FlushState, period: Duration) -> Self {
        Self {
            inner,
            state,
            period,
        }
    }

    pub fn state(&self) -> FlushState {
        self.state
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SplitFunc> SplitFunc for Flush<S> {
    fn split(&mut self, data: &[u8], at_eof: bool) -> SplitResult {
        let result = self.inner.split(data, at_eof)?;

        if self.period.is_zero() {
            return Ok(result);
        }

        let now = Utc::now();

        if result.token.is_some() {
            self.state.reset(now);
            return Ok(result);
        }

        if data.is_empty() {
            return Ok(result);
        }

        if result.advance > 0 {
            self.state.reset(now);
            return Ok(result);
        }

        if data.len() > self.state.last_data_length {
            self.state.last_data_change = now;
            self.state.last_data_length = data.len();
            return Ok(Split::need_more());
        }

        if self.state.expired(now, self.period) {
            self.state.reset(now);
            return Ok(Split::token(data.len(), 0..data.len()));
        }

        Ok(Split::need_more())
    }
}
