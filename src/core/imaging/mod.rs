//! # Imaging Module
//!
//! Bytes-based decode, encode and resize helpers shared by the compression
//! pass, the scoring oracle and the filesystem library backend.

mod codec;
mod thumbnail;

pub use codec::{decode_bytes, encode_jpeg};
pub use thumbnail::{fit_inside, thumbnail_jpeg};
