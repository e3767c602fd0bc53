//! API 핸들러.

pub mod perception;
pub mod stream;
pub mod video;
