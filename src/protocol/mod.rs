//! WebSocket protocol core (RFC 6455): framing, reassembly and the opening
//! handshake. Nothing here performs I/O.

pub mod assembler;
pub mod decoder;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod utf8;
pub mod validation;

pub use assembler::MessageAssembler;
pub use decoder::FrameDecoder;
pub use frame::{Frame, FrameHeader, MAX_CONTROL_FRAME_PAYLOAD};
pub use handshake::{
    ClientHandshake, HandshakeRequest, HandshakeResponse, WS_GUID, compute_accept_key,
};
pub use mask::{MaskGenerator, apply_mask};
pub use opcode::OpCode;
pub use utf8::Utf8Validator;
pub use validation::FrameValidator;
