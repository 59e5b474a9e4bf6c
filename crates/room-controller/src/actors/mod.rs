//! Actor model implementation.
//!
//! The Room Controller uses an actor hierarchy:
//!
//! ```text
//! RegistryActor (singleton per controller instance)
//! ├── owns the room map, serializes room creation, runs eviction
//! └── supervises N RoomActors
//!     └── RoomActor (one per active room)
//!         ├── owns peer/transport/producer/consumer state
//!         └── reconciles provider lifecycle events
//!
//! DispatcherActor (one per signaling connection)
//! └── resolves requests against the registry and rooms under a
//!     per-request deadline; cleans up its peer on disconnect
//! ```
//!
//! Handles wrap an `mpsc` sender plus a cancellation token; request
//! methods pair each message with a `oneshot` reply channel.

pub mod dispatcher;
pub mod metrics;
pub mod registry;
pub mod room;

pub use dispatcher::{DispatcherActor, DispatcherActorHandle};
pub use metrics::{ActorMetrics, ActorType, MailboxLevel, MailboxMonitor};
pub use registry::{RegistryActorHandle, RegistryStatus};
pub use room::{JoinResult, PeerSnapshot, RoomActor, RoomActorHandle, RoomStateSnapshot};
