pub mod constants;
pub mod filename;
pub mod logging;
pub mod progress;

pub use constants::*;
pub use filename::{file_name_from_url, site_name_from_path};
pub use logging::init_logging;
pub use progress::ProgressReporter;
