use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use discuss_core::Channel;
use tracing::{info, warn};

use crate::{
    channel::ChannelTransport,
    error::ChannelError,
    types::{OutboundMessage, SendReceipt},
};

/// Routes outbound messages to the transport registered for their channel.
///
/// The registry is itself a [`ChannelTransport`], so the relay only ever holds
/// one transport handle regardless of how many channels are configured.
#[derive(Default)]
pub struct TransportRegistry {
    transports: HashMap<Channel, Arc<dyn ChannelTransport>>,
}

impl TransportRegistry {
    /// Create an empty registry with no transports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport for `channel`.
    ///
    /// If a transport is already registered for the channel it is replaced.
    pub fn register(&mut self, channel: Channel, transport: Arc<dyn ChannelTransport>) {
        info!(channel = %channel, transport = %transport.name(), "registering channel transport");
        if self.transports.insert(channel, transport).is_some() {
            warn!(channel = %channel, "replaced previously registered transport");
        }
    }

    /// Return the transport for `channel`, if one is registered.
    pub fn get(&self, channel: Channel) -> Option<&Arc<dyn ChannelTransport>> {
        self.transports.get(&channel)
    }

    /// Channels with a registered transport, sorted for deterministic output.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.transports.keys().copied().collect();
        channels.sort_by_key(|c| c.as_str());
        channels
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

#[async_trait]
impl ChannelTransport for TransportRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<SendReceipt, ChannelError> {
        let transport = self
            .transports
            .get(&msg.channel)
            .ok_or(ChannelError::NotConfigured(msg.channel))?;
        transport.send(msg).await
    }
}
