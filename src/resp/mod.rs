pub mod parser;
pub mod types;
pub mod writer;

pub use parser::{parse, parse_slice};
pub use types::Value;
pub use writer::{encode_batch, encode_command};
