pub mod flow;
pub mod store;
pub mod sweeper;
