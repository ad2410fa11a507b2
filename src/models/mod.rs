mod assessment;
mod document;
mod section;

pub use assessment::*;
pub use document::*;
pub use section::*;
