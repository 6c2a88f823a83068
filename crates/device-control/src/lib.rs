//! Device Control
//!
//! Actuator command delivery over the asynchronous device-control channel,
//! with two interchangeable transports: a fire-and-forget MQTT publish or a
//! retained device-shadow desired-state update. Every successful dispatch is
//! optimistically reflected in the repository's device state.

mod command;
mod dispatcher;

pub use command::{Actuator, ActuatorCommand, CommandPayload, SettingsAnnouncement};
pub use dispatcher::{
    CommandDispatcher, CommandSink, CommandTransport, DispatchError, COMMAND_SOURCE,
    SETTINGS_TOPIC,
};
