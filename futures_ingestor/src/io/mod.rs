pub mod atomic;
pub mod price_store;
pub mod sink;
