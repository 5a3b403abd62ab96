//! Wire protocol: messages, binary frames and addresses

pub mod address;
pub mod codec;
pub mod message;

pub use address::{output_list_address, output_region_address, InboundPattern, InboundTarget};
pub use codec::{Codec, Encoded, DEFAULT_MAX_FRAME, RECOMMENDED_MAX_FRAME};
pub use message::{ArgType, Argument, WireMessage};
