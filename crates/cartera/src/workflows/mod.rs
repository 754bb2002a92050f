pub mod arrears;
pub mod collections;
