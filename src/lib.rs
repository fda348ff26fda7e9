//! A symbolic, strongly-typed client for Siemens S7 PLCs over OPC UA.
//!
//! Callers talk to a [`ServiceCoordinator`], which owns a [`store::DataStore`]
//! mirroring the PLC's address space, a [`client::MainClient`] that holds the
//! long-lived subscription session, and a [`pool::SessionPool`] of stateless
//! sessions used for browse/read/write. Discovery, type conversion, and
//! snapshot persistence are separate, independently testable components
//! wired together by the coordinator.

pub mod cancel;
pub mod client;
pub mod codec;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod fs;
pub mod opcua;
pub mod pool;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod types;

pub use cancel::CancellationToken;
pub use client::{ConnectionState, MainClient};
pub use codec::{Codec, CodecError, CodecRegistry};
pub use config::ApplicationConfiguration;
pub use discovery::DiscoveryEngine;
pub use error::{Result, S7ClientError};
pub use events::{Callback, ConnectionEvent, EventBus, HandlerId, MonitoredItemChanged, VariableValueChanged};
pub use fs::{FileSystem, TokioFileSystem};
pub use opcua::{CertificateValidator, EndpointDescription, OpcUaSession, OpcUaStack};
pub use pool::SessionPool;
pub use service::ServiceCoordinator;
pub use snapshot::SnapshotCodec;
pub use store::DataStore;
pub use types::{HostValue, NodeId, S7DataType, StoreRoot, StructureElement, Variable, WireValue};
