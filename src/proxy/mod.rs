mod fetcher;
mod handler;
mod range;
mod server;
mod stream;

pub use fetcher::*;
pub use handler::*;
pub use range::*;
pub use server::*;
pub use stream::*;

pub const CHUNK_SIZE: usize = 64 * 1024; // 64KiB chunks
