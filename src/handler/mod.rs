//! Operation handlers: descriptors, the composed pipeline, error
//! classification and response envelopes.

mod classify;
mod descriptor;
mod pipeline;
mod response;

pub use classify::{ClassifiedError, ErrorKind, classify, extract_details, extract_value_details};
pub use descriptor::{
    ActionFn, ListFormatter, ListView, OperationDescriptor, Output, Shape, ValidatedArgs, action,
    render_template,
};
pub use pipeline::{
    CatchErrors, DEBUG_ARG, Handler, HandlerFactory, Operation, ResolveAndRun, Trace, Validate,
    ValidatedOperation,
};
pub use response::{
    Envelope, MAX_CHUNK_CHARS, Meta, Pagination, build_error, build_success, chunk,
};
