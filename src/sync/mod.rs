pub mod driver;
pub mod watermark;

pub use driver::SyncDriver;
