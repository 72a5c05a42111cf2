pub mod client;
pub mod params;
pub mod run_url;
pub mod uniq;
