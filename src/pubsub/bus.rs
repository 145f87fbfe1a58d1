use tokio::sync::broadcast;

use super::Channel;
use crate::error::TransportError;

/// Capacity of the in-process bus; slow subscribers beyond this lag.
const BUS_CAPACITY: usize = 256;

/// A raw message as carried by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: Channel,
    pub payload: String,
}

/// Publish/subscribe transport the node is wired to.
pub trait Transport: Send + Sync {
    fn publish(&self, channel: Channel, payload: String) -> Result<(), TransportError>;
    fn subscribe(&self) -> broadcast::Receiver<BusMessage>;
}

/// In-process bus. Clones share the same channel, so several nodes in one
/// process can talk to each other through it.
#[derive(Debug, Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<BusMessage>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }
}

impl Transport for LocalBus {
    fn publish(&self, channel: Channel, payload: String) -> Result<(), TransportError> {
        self.sender
            .send(BusMessage { channel, payload })
            .map(|_| ())
            .map_err(|_| TransportError::NoSubscribers)
    }

    fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_fails() {
        let bus = LocalBus::new();
        assert!(matches!(
            bus.publish(Channel::Transaction, "{}".into()),
            Err(TransportError::NoSubscribers)
        ));
    }

    #[test]
    fn every_subscriber_receives_a_copy() {
        let bus = LocalBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.clone().subscribe();
        bus.publish(Channel::Blockchain, "payload".into()).unwrap();

        let expected = BusMessage {
            channel: Channel::Blockchain,
            payload: "payload".into(),
        };
        assert_eq!(a.try_recv().unwrap(), expected);
        assert_eq!(b.try_recv().unwrap(), expected);
    }
}
