//! Zero-copy file-to-socket copying, and a driver that proves the bytes
//! arrive intact.
//!
//! [`copy_file`] picks `sendfile(2)` when the destination socket supports
//! it and a buffered read/write loop otherwise. [`run`] serves a large
//! zero-filled temp file over loopback through that path and checks the
//! received length and SHA-256.

mod common;
mod config;
mod copy;
mod error;
mod sendfile;
mod transfer;
mod zero;

pub use crate::config::Config;
pub use crate::copy::*;
pub use crate::error::TransferError;
pub use crate::sendfile::*;
pub use crate::transfer::*;
pub use crate::zero::*;
