// Firehose transport boundary — commit events, record schemas, and the
// grouping of raw repo operations into the typed batches the engine
// consumes. The wire protocol itself (websocket framing, reconnection)
// lives in pipeline::ingest.

pub mod ops;
pub mod records;
