//! Contract between the emulator core and the GATT transport.
//!
//! The BLE stack (advertising, pairing, connections, the GATT server) lives
//! outside this crate. It registers the rowing service's handlers through
//! [`GattRegistry`] and hands every new subscriber a [`NotifySink`]. The
//! in-memory [`MemoryGatt`] implements the same contract for tests and
//! demos, with subscribers receiving notifications on an mpsc channel.

use async_trait::async_trait;
use bytes::Bytes;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    error::{EmulatorError, Result},
    types::{CharacteristicId, WriteStatus},
};

/// Destination for notifications of one subscribed characteristic
#[async_trait]
pub trait NotifySink: Send + Sync {
    /// Push one notification payload to the subscriber
    ///
    /// # Errors
    ///
    /// Any error means the subscriber can no longer be reached; the caller
    /// stops notifying this sink.
    async fn notify(&self, data: Bytes) -> Result<()>;
}

/// Called with the subscriber's sink when a client enables notifications
pub type SubscribeHandler = Box<dyn Fn(Arc<dyn NotifySink>) + Send + Sync>;
/// Called when a client disables notifications or disconnects
pub type UnsubscribeHandler = Box<dyn Fn() + Send + Sync>;
/// Produces the value of a characteristic read
pub type ReadHandler = Box<dyn Fn() -> Bytes + Send + Sync>;
/// Consumes a characteristic write and returns the protocol status
pub type WriteHandler = Box<dyn Fn(&[u8]) -> WriteStatus + Send + Sync>;

/// Registration surface the GATT transport offers to the rowing service
pub trait GattRegistry {
    /// Register notify handlers for a characteristic
    fn register_characteristic(
        &mut self,
        id: CharacteristicId,
        on_subscribe: SubscribeHandler,
        on_unsubscribe: UnsubscribeHandler,
    );

    /// Register the read handler for a characteristic
    fn register_read_handler(&mut self, id: CharacteristicId, handler: ReadHandler);

    /// Register the write handler for a characteristic
    fn register_write_handler(&mut self, id: CharacteristicId, handler: WriteHandler);
}

/// [`NotifySink`] backed by an unbounded mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Bytes>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes its notifications
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl NotifySink for ChannelSink {
    async fn notify(&self, data: Bytes) -> Result<()> {
        self.sender
            .send(data)
            .map_err(|_| EmulatorError::SinkClosed)
    }
}

#[derive(Default)]
struct Handlers {
    on_subscribe: Option<SubscribeHandler>,
    on_unsubscribe: Option<UnsubscribeHandler>,
    read: Option<ReadHandler>,
    write: Option<WriteHandler>,
}

/// In-process GATT registry that plays the client side for tests and demos
#[derive(Default)]
pub struct MemoryGatt {
    handlers: HashMap<CharacteristicId, Handlers>,
}

impl MemoryGatt {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Characteristics with at least one registered handler
    #[must_use]
    pub fn characteristics(&self) -> Vec<CharacteristicId> {
        let mut ids: Vec<_> = self.handlers.keys().copied().collect();
        ids.sort_by_key(|id| id.code());
        ids
    }

    /// Enable notifications on a characteristic
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::UnknownCharacteristic`] if nothing registered
    /// notify handlers for `id`.
    pub fn subscribe(&self, id: CharacteristicId) -> Result<mpsc::UnboundedReceiver<Bytes>> {
        let handler = self
            .handlers
            .get(&id)
            .and_then(|h| h.on_subscribe.as_ref())
            .ok_or(EmulatorError::UnknownCharacteristic { code: id.code() })?;

        let (sink, receiver) = ChannelSink::new();
        debug!("Client subscribed to {}", id);
        handler(Arc::new(sink));
        Ok(receiver)
    }

    /// Disable notifications on a characteristic
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::UnknownCharacteristic`] if nothing registered
    /// notify handlers for `id`.
    pub fn unsubscribe(&self, id: CharacteristicId) -> Result<()> {
        let handler = self
            .handlers
            .get(&id)
            .and_then(|h| h.on_unsubscribe.as_ref())
            .ok_or(EmulatorError::UnknownCharacteristic { code: id.code() })?;

        debug!("Client unsubscribed from {}", id);
        handler();
        Ok(())
    }

    /// Read a characteristic value
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::UnknownCharacteristic`] if `id` is not readable.
    pub fn read(&self, id: CharacteristicId) -> Result<Bytes> {
        let handler = self
            .handlers
            .get(&id)
            .and_then(|h| h.read.as_ref())
            .ok_or(EmulatorError::UnknownCharacteristic { code: id.code() })?;
        Ok(handler())
    }

    /// Write a characteristic value
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::UnknownCharacteristic`] if `id` is not writable.
    pub fn write(&self, id: CharacteristicId, data: &[u8]) -> Result<WriteStatus> {
        let handler = self
            .handlers
            .get(&id)
            .and_then(|h| h.write.as_ref())
            .ok_or(EmulatorError::UnknownCharacteristic { code: id.code() })?;
        Ok(handler(data))
    }
}

impl GattRegistry for MemoryGatt {
    fn register_characteristic(
        &mut self,
        id: CharacteristicId,
        on_subscribe: SubscribeHandler,
        on_unsubscribe: UnsubscribeHandler,
    ) {
        let entry = self.handlers.entry(id).or_default();
        entry.on_subscribe = Some(on_subscribe);
        entry.on_unsubscribe = Some(on_unsubscribe);
    }

    fn register_read_handler(&mut self, id: CharacteristicId, handler: ReadHandler) {
        self.handlers.entry(id).or_default().read = Some(handler);
    }

    fn register_write_handler(&mut self, id: CharacteristicId, handler: WriteHandler) {
        self.handlers.entry(id).or_default().write = Some(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_channel_sink_delivers_and_detects_close() {
        let (sink, mut receiver) = ChannelSink::new();
        sink.notify(Bytes::from_static(&[1, 2, 3])).await.unwrap();
        assert_eq!(receiver.recv().await.unwrap(), Bytes::from_static(&[1, 2, 3]));

        drop(receiver);
        let err = sink.notify(Bytes::from_static(&[4])).await.unwrap_err();
        assert!(err.is_transport_error());
    }

    #[tokio::test]
    async fn test_memory_gatt_routes_handlers() {
        let unsubscribed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&unsubscribed);

        let mut gatt = MemoryGatt::new();
        gatt.register_characteristic(
            CharacteristicId::GeneralStatus,
            Box::new(|sink| {
                tokio::spawn(async move {
                    let _ = sink.notify(Bytes::from_static(&[0xAB])).await;
                });
            }),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        gatt.register_read_handler(
            CharacteristicId::StatusRate,
            Box::new(|| Bytes::from_static(&[2])),
        );
        gatt.register_write_handler(
            CharacteristicId::StatusRate,
            Box::new(|_| WriteStatus::Success),
        );

        let mut receiver = gatt.subscribe(CharacteristicId::GeneralStatus).unwrap();
        assert_eq!(receiver.recv().await.unwrap(), Bytes::from_static(&[0xAB]));

        gatt.unsubscribe(CharacteristicId::GeneralStatus).unwrap();
        assert_eq!(unsubscribed.load(Ordering::SeqCst), 1);

        assert_eq!(gatt.read(CharacteristicId::StatusRate).unwrap()[..], [2]);
        assert_eq!(
            gatt.write(CharacteristicId::StatusRate, &[1]).unwrap(),
            WriteStatus::Success
        );
        assert_eq!(
            gatt.characteristics(),
            vec![CharacteristicId::GeneralStatus, CharacteristicId::StatusRate]
        );
    }

    #[test]
    fn test_memory_gatt_rejects_unregistered() {
        let gatt = MemoryGatt::new();
        assert!(matches!(
            gatt.subscribe(CharacteristicId::StrokeData),
            Err(EmulatorError::UnknownCharacteristic { code: 0x0035 })
        ));
        assert!(gatt.read(CharacteristicId::StatusRate).is_err());
    }
}
