//! Protocol module: frame types, the binary codec, the correlation counter and
//! the frame interpreter.

pub mod codec;
pub mod correlation;
pub mod frame;
pub mod interpreter;

pub use codec::{
    decode, decode_frame, encode_command, encode_frame, encode_ok_response, encode_response,
    ProtocolError,
};
pub use correlation::CorrelationCounter;
pub use frame::{Frame, FrameContent, MessageKind, ResponseStatus, HEADER_SIZE, MAX_BODY_LEN};
pub use interpreter::{interpret, EventPayload, PinEvent};
