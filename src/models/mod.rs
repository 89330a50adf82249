pub mod invoice;
pub mod transaction;
