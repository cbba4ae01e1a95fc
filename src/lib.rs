//! A user-space TCP endpoint: stream reassembly, the receiver and sender
//! halves, and the connection state machine that joins them.
//!
//! This crate does not move bytes on a wire. It is handed [`Segment`]s by
//! whatever owns IP routing, checksums, and socket multiplexing, and hands
//! back the segments it wants sent in return. [`Connection`] is the entry
//! point; everything else is a collaborator it drives.

pub mod byte_stream;
pub mod config;
pub mod connection;
pub mod error;
pub mod reassembler;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod seqno;

pub use byte_stream::ByteStream;
pub use config::Config;
pub use connection::Connection;
pub use error::Error;
pub use reassembler::Reassembler;
pub use receiver::Receiver;
pub use segment::{Flags, Segment};
pub use sender::Sender;
pub use seqno::Seqno;
