pub mod engine;
pub mod outcome;
pub mod validator;

pub use engine::process_bid_request;
pub use outcome::IngestOutcome;
