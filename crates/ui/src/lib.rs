//! Presentation models for the course client. Hosts render these; they hold no state.

pub mod vm;
