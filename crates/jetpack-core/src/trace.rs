//! Phase timings in Chrome trace-event format.
//!
//! The resulting JSON loads in `chrome://tracing` and Perfetto. Every
//! recorded phase becomes one complete (`"ph": "X"`) event.

use serde::Serialize;
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TraceEvent {
    pub name: String,
    pub cat: &'static str,
    pub ph: &'static str,
    /// Start in microseconds since the recorder was created.
    pub ts: u64,
    /// Duration in microseconds.
    pub dur: u64,
    pub pid: u32,
    pub tid: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TraceFile<'a> {
    trace_events: &'a [TraceEvent],
}

/// Records how long each resolver phase takes.
#[derive(Debug)]
pub struct TraceRecorder {
    origin: Instant,
    events: Mutex<Vec<TraceEvent>>,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Mark the start of a phase. Pass the result to [`TraceRecorder::finish`].
    #[must_use]
    pub fn start(&self) -> Instant {
        Instant::now()
    }

    /// Record the phase `name` that began at `started`.
    pub fn finish(&self, name: &str, started: Instant) {
        let ts = micros(started.saturating_duration_since(self.origin));
        let dur = micros(started.elapsed());
        tracing::debug!(phase = name, micros = dur, "phase finished");
        if let Ok(mut events) = self.events.lock() {
            events.push(TraceEvent {
                name: name.to_string(),
                cat: "jetpack",
                ph: "X",
                ts,
                dur,
                pid: std::process::id(),
                tid: 0,
            });
        }
    }

    /// Snapshot of the recorded events, in recording order.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// The trace as `{"traceEvents": [...]}`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let events = self.events();
        serde_json::to_string_pretty(&TraceFile {
            trace_events: &events,
        })
    }
}

fn micros(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_complete_events() {
        let recorder = TraceRecorder::new();
        let started = recorder.start();
        recorder.finish("discover", started);
        let started = recorder.start();
        recorder.finish("emit", started);

        let names: Vec<_> = recorder.events().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["discover", "emit"]);
        assert!(recorder.events().iter().all(|e| e.ph == "X"));
    }

    #[test]
    fn test_json_shape() {
        let recorder = TraceRecorder::new();
        recorder.finish("link", recorder.start());
        let value: serde_json::Value = serde_json::from_str(&recorder.to_json().unwrap()).unwrap();
        let events = value["traceEvents"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["name"], "link");
        assert_eq!(events[0]["ph"], "X");
        assert!(events[0]["dur"].is_u64());
    }
}
