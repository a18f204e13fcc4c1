pub mod cancel;
pub mod fs;
pub mod http;

pub use cancel::cancellable;
pub use fs::FsUtils;
