// Pipeline orchestration — the long-running ingest loop that drives the
// curation engine from the subscription stream.

pub mod ingest;
