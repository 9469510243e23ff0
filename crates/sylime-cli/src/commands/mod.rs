pub mod config_ops;
pub mod learn_ops;
pub mod store_ops;
