pub mod columns;
pub mod connection;
pub mod identity;
pub mod migrate;
pub mod queries;
