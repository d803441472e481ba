pub mod backend_client;
pub mod cli;
pub mod error;
pub mod inference_client;
