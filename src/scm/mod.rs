pub mod diff;
pub mod pipelines;
pub mod repo;
