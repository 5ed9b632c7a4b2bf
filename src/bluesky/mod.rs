// Bluesky API collaborators: public XRPC client, author snapshots,
// post label lookups, and the AgentView trait the engine consumes.

pub mod agent;
pub mod client;
pub mod posts;
pub mod profiles;
