//! FileFerry -- reliable, in-order, one-way file transfer layered on an
//! unreliable datagram service.
//!
//! The underlying transport may lose, reorder, duplicate, or corrupt
//! datagrams; FileFerry produces a byte-exact copy on the receiving side
//! using numbered, checksummed packets under a fixed sliding window with
//! acknowledgment, NAK, and timeout-driven retransmission:
//!
//! - [`packet`]: the fixed-layout wire codec
//! - [`window`]: the sender's in-flight ring
//! - [`reorder`]: the receiver's reordering buffer
//! - [`sender`] / [`receiver`]: the single-threaded event loops
//! - [`io`]: byte source/sink collaborator seams

pub mod config;
pub mod error;
pub mod io;
pub mod packet;
pub mod receiver;
pub mod reorder;
pub mod sender;
pub mod window;

// Re-export key public types at crate root.
pub use config::TransferConfig;
pub use error::{FileFerryError, Result};
pub use packet::{Packet, PacketKind};
pub use receiver::{receive_transfer, FileReceiver, RecvStats};
pub use reorder::ReorderBuffer;
pub use sender::{send_transfer, FileSender, SendStats};
pub use window::SendWindow;
