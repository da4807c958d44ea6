//! Call dispatch substrate
//!
//! Every `*_future` engine call and dispatcher-submitted switch runs here:
//! a fixed pool of worker tasks draining one bounded FIFO queue.

mod dispatcher;

pub use dispatcher::{CallHandle, Dispatcher, DispatcherConfig};
