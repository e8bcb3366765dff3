#![no_std]

#[cfg(feature = "std")]
extern crate std;

// Timing core for the dual-channel pulse tester.
//
// Everything here is clock- and transport-agnostic so the host runner and the
// scenario tests drive the same scheduler with their own instant types and
// notification sinks.

pub mod channel;
pub mod command;
pub mod notify;
pub mod rate;
pub mod scheduler;
pub mod simulation;
pub mod telemetry;
pub mod time;
