//! Wire protocol shared between the Battleship server and its clients:
//! frame codec, AES-CTR confidentiality, CRC32 integrity and the tagged
//! message catalogue carried inside a frame.

pub mod codec;
pub mod crypto;
pub mod error;
pub mod messages;

pub use codec::FrameCodec;
pub use error::{GameError, GameResult};
pub use messages::{MessageKind, Payload};
