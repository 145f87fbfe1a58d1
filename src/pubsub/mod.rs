//! Message exchange between nodes.
//!
//! Payloads travel inside an envelope `{ "id": <origin node>, "message": ... }`
//! on two channels. A node drops envelopes carrying its own id so its
//! broadcasts do not echo back.

pub mod bus;

use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

pub use bus::{BusMessage, LocalBus, Transport};

use crate::blockchain::Block;
use crate::error::NodeError;
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Blockchain,
    Transaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: String,
    pub message: T,
}

/// A decoded message from another node.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Chain(Vec<Block>),
    Transaction(Transaction),
}

/// Node-side handle on the transport: knows the local node id and speaks the
/// envelope format.
#[derive(Clone)]
pub struct PubSub {
    node_id: String,
    transport: Arc<dyn Transport>,
}

impl PubSub {
    pub fn new(node_id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            node_id: node_id.into(),
            transport,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.transport.subscribe()
    }

    fn publish<T: Serialize + ?Sized>(&self, channel: Channel, message: &T) -> Result<(), NodeError> {
        let payload = serde_json::to_string(&Envelope {
            id: self.node_id.clone(),
            message,
        })?;
        self.transport.publish(channel, payload)?;
        debug!("published on {:?} as {}", channel, self.node_id);
        Ok(())
    }

    pub fn broadcast_chain(&self, chain: &[Block]) -> Result<(), NodeError> {
        self.publish(Channel::Blockchain, chain)
    }

    pub fn broadcast_transaction(&self, transaction: &Transaction) -> Result<(), NodeError> {
        self.publish(Channel::Transaction, transaction)
    }

    /// Decode a bus message. `Ok(None)` for messages this node sent itself.
    pub fn decode(&self, msg: &BusMessage) -> Result<Option<Inbound>, serde_json::Error> {
        let envelope: Envelope<serde_json::Value> = serde_json::from_str(&msg.payload)?;
        if envelope.id == self.node_id {
            return Ok(None);
        }
        let inbound = match msg.channel {
            Channel::Blockchain => Inbound::Chain(serde_json::from_value(envelope.message)?),
            Channel::Transaction => Inbound::Transaction(serde_json::from_value(envelope.message)?),
        };
        Ok(Some(inbound))
    }
}
