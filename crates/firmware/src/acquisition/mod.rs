//! Non-blocking multi-device acquisition.
//!
//! - [`plan`]: Device Plan Table and its flattened step view
//! - [`router`]: multiplexer channel select
//! - [`scheduler`]: pure sweep state machine
//! - [`frame`] / [`store`]: decoded frames and the front/back pair
//! - [`engine`]: everything above bound to one bus

pub mod engine;
pub mod frame;
pub mod plan;
pub mod router;
pub mod scheduler;
pub mod store;

pub use engine::{
    service_detached, AcquisitionConfig, AcquisitionEngine, Maintenance, SharedEngine,
};
pub use frame::{Field, Reading, ResultFrame};
pub use plan::{DeviceDescriptor, DeviceKind, DevicePlan, MuxChannel, MuxRoute};
pub use scheduler::{AbortCause, SweepState};
