pub mod replay;
pub mod scoring;
