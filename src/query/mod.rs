//! Read path: query construction and result streaming

pub mod builder;
pub mod stream;

pub use builder::{BuiltQuery, QueryBuilder, ReadOptions};
pub use stream::{DEFAULT_STREAM_BUFFER, ReadStream};
