//! A minimal TFTP-style file transfer over UDP.
//!
//! A client sends a read or write request to the server's well-known port. The server answers
//!  from a fresh ephemeral port that is used for the rest of the transfer, so each transfer has
//!  its own pair of endpoints. The file is moved in DATA blocks of up to 512 bytes, each of which
//!  is acknowledged before the next one is sent. A block shorter than 512 bytes (possibly empty)
//!  ends the transfer.
//!
//! Wire format (big endian):
//! ```ascii
//! RRQ:   | 0 | 1 | file name ...               |
//! WRQ:   | 0 | 2 | file name ...               |
//! DATA:  | 0 | 3 | block (u16) | payload 0..512 |
//! ACK:   | 0 | 4 | block (u16) |
//! ERROR: | 0 | 5 | message ...                 |
//! ```

pub mod block_number;
pub mod client;
pub mod config;
pub mod error;
pub mod packet;
pub mod server;
pub mod transfer;

#[cfg(test)] pub mod test_util;
