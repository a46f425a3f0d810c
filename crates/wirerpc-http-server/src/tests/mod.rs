//! Test modules for wirerpc-http-server crate
//!
//! These drive the transport adapter directly with in-memory bodies.
