pub mod downloader;
pub mod staging;

pub use downloader::Downloader;
pub use staging::StagingArea;
