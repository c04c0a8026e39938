// Coordinator
pub const WORKER_SPAWN_ERR_MSG: &str = "Could not spawn partition worker thread:";

// PlanBuilder
pub const MISSING_AGG_CONNECTION_MSG: &str = "A plan needs an aggregation connection.";
pub const MISSING_AGG_TABLE_MSG: &str = "A plan needs an aggregation table.";
pub const MISSING_AGG_QUERY_MSG: &str = "A plan needs an aggregation query.";
pub const EMPTY_AGG_TABLE_MSG: &str = "The aggregation table needs at least one column.";
