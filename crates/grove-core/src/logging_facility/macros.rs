//! Boundary logging macros
//!
//! All three expand to one `tracing` event tagged with the calling module,
//! the operation name and a boundary event name. Extra `key = value` fields
//! are passed through to `tracing` untouched.
//!
//! `tracing` field names must be literals, so the keys written here are the
//! values of the `FIELD_*` constants in `grove_core_types::schema`.

#[doc(hidden)]
#[macro_export]
macro_rules! __grove_op_event {
    ($level:ident, $op:expr, $event:expr) => {
        tracing::$level!(component = module_path!(), op = $op, event = $event)
    };
    ($level:ident, $op:expr, $event:expr, $($field:tt)+) => {
        tracing::$level!(component = module_path!(), op = $op, event = $event, $($field)+)
    };
}

/// Open an operation
///
/// ```
/// # use grove_core::log_op_start;
/// log_op_start!("load_tree");
/// log_op_start!("get_node", node_id = "4");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)+)?) => {
        $crate::__grove_op_event!(
            info,
            $op,
            $crate::types::schema::EVENT_START
            $(, $($field)+)?
        )
    };
}

/// Close an operation that succeeded
///
/// ```
/// # use grove_core::log_op_end;
/// log_op_end!("load_tree", duration_ms = 3, node_count = 120);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {
        $crate::__grove_op_event!(
            info,
            $op,
            $crate::types::schema::EVENT_END,
            duration_ms = $duration
            $(, $($field)+)?
        )
    };
}

/// Close an operation that failed
///
/// The error is converted into an `ExError` so its kind, code and entity id
/// are logged as fields.
///
/// ```
/// # use grove_core::{log_op_error, errors::GroveError};
/// let err = GroveError::ParentNotFound { parent_id: "9".to_string() };
/// log_op_error!("insert_node", err, duration_ms = 1);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        $crate::__grove_op_event!(
            error,
            $op,
            $crate::types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            entity_id = ex_err.entity_id().unwrap_or_default(),
            message = ex_err.message()
            $(, $($field)+)?
        )
    }};
}
