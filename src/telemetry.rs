// SPDX-License-Identifier: Apache-2.0

use opentelemetry::metrics::{Meter, UpDownCounter};
use opentelemetry::{KeyValue, global};

pub fn get_meter() -> Meter {
    global::meter("fileconsumer")
}

/// Live gauges of what the consumer is doing.
#[derive(Clone)]
pub struct Telemetry {
    reading_files: UpDownCounter<i64>,
    open_files: UpDownCounter<i64>,
    tags: [KeyValue; 1],
}

impl Telemetry {
    pub fn new() -> Self {
        let reading_files = get_meter()
            .i64_up_down_counter("fileconsumer_reading_files")
            .with_description("Number of files currently being read.")
            .with_unit("{files}")
            .build();

        let open_files = get_meter()
            .i64_up_down_counter("fileconsumer_open_files")
            .with_description("Number of files currently held open.")
            .with_unit("{files}")
            .build();

        Self {
            reading_files,
            open_files,
            tags: [KeyValue::new("component", "fileconsumer")],
        }
    }

    pub fn add_reading_files(&self, delta: i64) {
        self.reading_files.add(delta, &self.tags);
    }

    pub fn add_open_files(&self, delta: i64) {
        self.open_files.add(delta, &self.tags);
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}
