pub mod memory;
pub mod pool;
pub mod postgres;
pub mod schema;
pub mod store;
