pub mod macros;
pub mod scan;

pub use macros::MacroRecord;
pub use scan::ScanResult;
