//! Protocol module containing the wire vocabulary, the field codec, and the
//! async field stream.

pub mod codec;
pub mod messages;
pub mod stream;

pub use codec::{decode_field, encode_field, ProtocolError, LENGTH_PREFIX_SIZE, MAX_FIELD_LEN};
pub use messages::*;
pub use stream::{FieldStream, StreamError};
