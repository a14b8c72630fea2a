pub mod archive;
pub mod builder;
pub mod cli;
pub mod entry;
pub mod error;
pub mod extract;
pub mod header;
pub mod hexdump;
pub mod sink;
pub mod transform;
