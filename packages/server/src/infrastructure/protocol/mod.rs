//! ProtocolClient の実装
//!
//! - `matrix`: Matrix client-server API を application service として呼び出す実装

pub mod matrix;

pub use matrix::MatrixClient;
