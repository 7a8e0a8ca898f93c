//! Codecs for the supported point record kinds.

pub mod bytes;
pub mod rgbnir;
pub mod wavepacket;
pub(crate) mod utils;

pub use rgbnir::RgbNir;
pub use wavepacket::WavePacket;
