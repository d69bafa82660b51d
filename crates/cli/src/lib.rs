//! Strata CLI library
//!
//! The binary is a thin clap front end over these modules; integration
//! tests drive the commands through the blocking entry points directly.

pub mod cmd;
pub mod locks;
pub mod util;
