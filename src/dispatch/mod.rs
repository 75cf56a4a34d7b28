//! Operation routing.
//!
//! - [`OperationRegistry`] classifies the engine's declared operations once
//! - [`Dispatcher`] validates per-request arguments against that table,
//!   fetches remote input for paste operations and invokes the engine
//! - [`ImageFetcher`] is the seam for remote image retrieval

mod dispatcher;
mod fetch;
mod registry;

pub use dispatcher::{DispatchRequest, Dispatcher};
pub use fetch::{
    check_response, HttpImageFetcher, ImageFetcher, DEFAULT_FETCH_TIMEOUT, MAX_FETCH_SIZE,
};
pub use registry::{OperationDescriptor, OperationRegistry, Shape};
