pub mod log_decoder;

pub use log_decoder::{Decoded, DecodedLog, EncodedLog, LogDecoder, RawLog};
