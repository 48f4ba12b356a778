//! Field keys and event names of grove's structured log events
//!
//! Every operation boundary produces exactly one `start` event followed by
//! either an `end` or an `end_error` event, all carrying the same `op`.

/// Module path of the code that emitted the event
pub const FIELD_COMPONENT: &str = "component";
/// Operation name, e.g. `update_node_parent`
pub const FIELD_OP: &str = "op";
/// One of the `EVENT_*` names
pub const FIELD_EVENT: &str = "event";
/// Elapsed milliseconds, on `end` and `end_error`
pub const FIELD_DURATION_MS: &str = "duration_ms";
/// `ExErrorKind` of the failure, on `end_error`
pub const FIELD_ERR_KIND: &str = "err_kind";
/// Stable `ERR_*` code of the failure, on `end_error`
pub const FIELD_ERR_CODE: &str = "err_code";
/// Id of the record the failure concerns, empty when none
pub const FIELD_ENTITY_ID: &str = "entity_id";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
