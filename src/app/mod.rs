//! Application core: lifecycle logic, zero direct I/O.
//!
//! This module holds the cooperating state machines of the PlantOps node:
//! network connectivity, identity provisioning, the broker session, and
//! the lifecycle controller that ties them into one polling loop.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod connectivity;
pub mod controller;
pub mod events;
pub mod model;
pub mod ports;
pub mod provisioner;
pub mod session;
