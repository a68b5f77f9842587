//! Consumer and producer sides of the plot bridge.
//!
//! A producer streams command text, data declarations and control literals.
//! The consumer reassembles them into command cycles and hands each finished
//! cycle to an injected [`Evaluator`]:
//!
//! ```text
//! socket → receive loop → DispatchQueue → processing loop
//!        → CommandAccumulator → Dispatcher → Evaluator / ReturnChannel
//! ```
//!
//! The receive loop only relays frames. Classification, accumulation and
//! dispatch happen on the processing loop, which is the single writer of the
//! open cycle and the persistent binding set.

pub mod accumulator;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod producer;
pub mod queue;
pub mod server;
pub mod session;

pub use accumulator::{Bindings, CommandAccumulator, CommandCycle};
pub use config::{BridgeConfig, DEFAULT_POLL_INTERVAL};
pub use dispatcher::{
    DispatchResult, Dispatcher, EvalError, Evaluator, Renderer, ReturnChannel,
};
pub use error::{BridgeError, Result};
pub use lifecycle::{Lifecycle, State, StopReason};
pub use producer::{Producer, ReturnValue};
pub use queue::{DispatchQueue, Pop};
pub use server::Bridge;
pub use session::{run_session, FrameSource, Processor, SessionEnd, SessionStats, Step};
