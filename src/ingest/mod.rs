//! Record ingestion for logscope

mod parser;
mod stream;

pub use parser::{InputFormat, IngestRecord};
pub use stream::{Incoming, InputSource, InputStream};
