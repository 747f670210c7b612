pub mod http;
pub mod redfin;
pub mod registry;
