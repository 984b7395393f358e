pub mod reading;
pub mod site;
pub mod tabular;

pub use reading::{Datapoint, Measurement, Reading};
pub use site::{NewSite, Site};
pub use tabular::{HeaderTriple, ParsedFile, RawRow};
