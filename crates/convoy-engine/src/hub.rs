use convoy_protocol::EngineEvent;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Live fan-out of [`EngineEvent`]s to dashboards and the daemon.
///
/// Published after durable state commits; a lagging subscriber drops
/// events without affecting the engine.
#[derive(Clone, Debug)]
pub struct EventStreamHub {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventStreamHub {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    pub fn publish(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn subscribe_stream(&self) -> BroadcastStream<EngineEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }
}
