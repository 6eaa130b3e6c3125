//! Call handlers served by the dispatcher.
//!
//! # Responsibilities
//! - `demo`: answer, play an interruptible prompt, hang up
//! - `slack`: answer, post the elevator request, hang up
//! - `welcome`: set a greeting variable for a recognised caller
//! - default: return control to the dialplan untouched

pub mod demo;
pub mod elevator;
pub mod noop;
pub mod welcome;

pub use demo::DemoHandler;
pub use elevator::{ElevatorHandler, ELEVATOR_MESSAGE};
pub use noop::NoopHandler;
pub use welcome::{greet_caller, GreetingDelivery, WelcomeHandler, WELCOME_VARIABLE};
