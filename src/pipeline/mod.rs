pub mod coordinator;
pub mod dispatcher;
pub mod sink;

pub use coordinator::{run_extraction_step, Coordinator, StepOutcome};
pub use dispatcher::{dispatch, DispatchError, DispatchStats};
pub use sink::{sink_for, ChannelSink, EventSink, JsonLinesSink, LogSink};
