//! Infrastructure layer.
//!
//! ドメイン層が定義する trait の具体的な実装と、外部とやり取りする DTO を提供します。

pub mod dto;
pub mod encoder;
pub mod protocol;
pub mod registry;
pub mod repository;
