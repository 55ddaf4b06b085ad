use std::sync::Mutex;

use folio_model::ScanEvent;
use tokio::sync::broadcast;

/// Notification sink for scan progress. Publishing never blocks and never
/// fails from the scanner's point of view.
pub trait ScanEventSink: Send + Sync {
    fn publish(&self, event: ScanEvent);
}

/// In-process fan-out of scan events. Receivers that fall behind lose the
/// oldest events; the scan does not wait for them.
#[derive(Debug, Clone)]
pub struct InProcScanEventBus {
    sender: broadcast::Sender<ScanEvent>,
}

impl InProcScanEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }
}

impl ScanEventSink for InProcScanEventBus {
    fn publish(&self, event: ScanEvent) {
        let _ = self.sender.send(event);
    }
}

/// Drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl ScanEventSink for NullEventSink {
    fn publish(&self, _event: ScanEvent) {}
}

/// Keeps every event in memory. Handy for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<ScanEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ScanEventSink for RecordingEventSink {
    fn publish(&self, event: ScanEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
