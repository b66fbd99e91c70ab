#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

//! # PM5 Emulator 🚣
//!
//! Core of a Concept2 Performance Monitor 5 (PM5) Bluetooth Low Energy
//! emulator, for developing rowing apps without a rowing machine.
//!
//! The crate produces the byte-exact payloads of the PM5 rowing service
//! characteristics, notifies subscribers on the cadence the monitor uses, and
//! replays captured multiplexed-info logs with their original timing. The
//! BLE stack itself (advertising, pairing, the GATT server) stays outside:
//! it plugs in through the [`GattRegistry`] and [`NotifySink`] traits.
//!
//! ## Characteristics
//!
//! All characteristics live under the Concept2 base UUID
//! `CE06xxxx-43E5-11E4-916C-0800200C9A66`:
//!
//! - **0x0031-0x0033**: general and additional status, sent every status period
//! - **0x0034**: status rate, read/write, selects the status period
//! - **0x0035-0x003D**: stroke, split, summary, belt and force curve data
//! - **0x0080**: multiplexed info, fed from a replay log
//!
//! Frames carry elapsed time, distance, stroke rate and split pace at fixed
//! offsets; every other field is zero.
//!
//! ## Quick Start
//!
//! ```
//! use pm5_emulator::{CharacteristicId, EmulatorConfig, MemoryGatt, RowingService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RowingService::new(EmulatorConfig::default());
//!
//!     // Any GATT server implementing GattRegistry works here
//!     let mut gatt = MemoryGatt::new();
//!     service.register(&mut gatt).await;
//!
//!     let mut status = gatt.subscribe(CharacteristicId::GeneralStatus)?;
//!     let frame = status.recv().await.ok_or("no notification")?;
//!     assert_eq!(frame.len(), 19);
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Little-endian field encoding and hex payload decoding
pub mod codec;
/// Session clock and frame generation
pub mod engine;
/// Error types and handling
pub mod error;
/// Characteristic frame layouts
pub mod protocol;
/// Timed replay of multiplexed-info logs
pub mod replay;
/// Per-characteristic notification tasks
pub mod scheduler;
/// Rowing service wiring
pub mod service;
/// GATT transport contract and in-memory transport
pub mod transport;
/// Type definitions and configuration
pub mod types;

// Re-export the main types for convenient usage
pub use engine::{Session, TelemetryEngine};
pub use error::{DecodeError, EmulatorError, Result};
pub use replay::{ReplayEvent, ReplayHandle, ReplayPlayer, ReplayStats};
pub use scheduler::{Cadence, NotificationScheduler};
pub use service::RowingService;
pub use transport::{ChannelSink, GattRegistry, MemoryGatt, NotifySink};
pub use types::{CharacteristicId, EmulatorConfig, StatusRate, WriteStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Concept2 base UUID; each characteristic places its 16-bit code in the
/// second and third bytes
pub const C2_BASE_UUID: u128 = 0xCE06_0000_43E5_11E4_916C_0800_200C_9A66;

/// PM5 rowing service UUID
pub const ROWING_SERVICE_UUID: &str = "CE060030-43E5-11E4-916C-0800200C9A66";

/// Multiplexed-info characteristic UUID, the replay target
pub const MULTIPLEXED_INFO_UUID: &str = "CE060080-43E5-11E4-916C-0800200C9A66";
