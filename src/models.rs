pub mod payment;
pub mod proposal;
pub mod signature;
pub mod status;
pub mod store;
