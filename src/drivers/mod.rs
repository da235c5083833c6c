//! Hardware initialisation, the task watchdog and input helpers.

pub mod button;
pub mod hw_init;
pub mod watchdog;
