pub mod errors;
pub mod fields;
pub mod model;
pub mod referral;
pub mod report;
