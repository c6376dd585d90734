pub mod deletion;
pub mod link_service;

pub use deletion::{DeletionPipeline, DeletionSummary, DeletionTicket};
pub use link_service::{BatchShortenOutcome, LinkService, ShortenOutcome, ShortenRequest};
