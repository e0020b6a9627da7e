pub mod records;
pub mod vendor;

pub use records::*;
pub use vendor::{VendorDevice, VendorRecord};
