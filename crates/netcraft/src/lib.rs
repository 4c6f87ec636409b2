pub mod client;

pub use client::{decode_submission, ClassifyError, NetcraftClient, SubmissionUrls};
