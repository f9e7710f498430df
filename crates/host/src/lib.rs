//! Host side of davpush: turns host events into publish requests.
//!
//! The host owns a [`PublishSession`] built from persisted [`Settings`]
//! and a transport factory. Each [`HostEvent`] is mapped to a
//! [`PublishRequest`](davpush_publish::PublishRequest) using the
//! configured strftime templates and handed to the publisher.

pub mod events;
pub mod naming;
pub mod session;
pub mod settings;

pub use events::{EventError, HostEvent};
pub use session::{PublishSession, SessionError, StorageFactory};
pub use settings::{EventSettings, ProbeCadence, Settings, SettingsError, settings_path};
