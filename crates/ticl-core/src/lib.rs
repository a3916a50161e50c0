//! Ticl invalidation client core logic
//!
//! This crate contains the pure state machine logic for the client half of
//! the Ticl invalidation protocol: the protocol handler, the registration
//! manager, and the deduplicating operation scheduler. It is completely
//! decoupled from I/O, enabling deterministic testing.
//!
//! # Architecture
//!
//! Protocol logic is strictly separated from transport and persistence
//! concerns:
//!
//! ```text
//!      ┌───────────────────────────────┐
//!      │ ticl-core                     │
//!      │ - Protocol handler            │
//!      │ - Registration manager        │
//!      │ - Operation scheduler         │
//!      └───────────────────────────────┘
//!         ↓                      ↓
//! ┌────────────────┐  ┌────────────────────┐
//! │ ticl-harness   │  │ production client  │
//! │ - Sim clock    │  │ - Real network     │
//! │ - Scripted     │  │ - System clock     │
//! │   listener     │  │ - Storage          │
//! └────────────────┘  └────────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - No I/O in core: the handler never reads a clock or touches a socket.
//!   Time arrives as a `now_ms` parameter; outbound frames leave as returned
//!   byte vectors for the driver to hand to its network channel.
//! - Single mutator: the driver owns every component and is the only code
//!   that calls into them, which is what the protocol's "internal thread"
//!   requires. There is no locking anywhere in this crate.
//! - Deterministic: given the same inputs and timestamps, the components
//!   produce the same outputs.
//!
//! # Modules
//!
//! - [`protocol_handler`]: framing, batching, token and pacing discipline
//! - [`registration_manager`]: the desired registration set and its digest
//! - [`operation_scheduler`]: deduplicating deferred-task dispatcher
//! - [`digest`]: the digest-function seam used by the registration store
//! - [`statistics`]: event counters for sends, receives, and client errors

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod digest;
pub mod operation_scheduler;
pub mod protocol_handler;
pub mod registration_manager;
pub mod statistics;

pub use digest::{DigestFunction, Sha256Digest};
pub use operation_scheduler::OperationScheduler;
pub use protocol_handler::{
    ProtocolHandler, ProtocolHandlerConfig, ProtocolListener, ServerMessageHeader,
};
pub use registration_manager::{DesiredRegistrationStore, RegistrationManager};
pub use statistics::{ClientErrorType, ReceivedMessageType, SentMessageType, Statistics};
