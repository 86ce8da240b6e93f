//! Domain types for the course player: the course tree, questions and answers,
//! assessment sessions, enrollment progress, routes and throttle state.

pub mod model;
pub mod time;

pub use time::{Clock, fixed_clock, fixed_now};
