//! Server-Sent-Events ingestion: bytes → frames → parsed events → interpreted events.

pub mod interpret;
pub mod parser;
pub mod splitter;

pub use interpret::{Interpreted, InterpretedEvent, extract_delta, interpret, interpret_line};
pub use parser::{ParsedEvent, parse_frame, strip_data_prefix};
pub use splitter::{FrameSplitter, FrameStream};
