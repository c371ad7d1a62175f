pub mod machine;
pub mod service;
pub mod states;

pub use machine::{request_number, RequestMachine};
pub use service::{ListFilter, RequestService, RequestSummary, RequestView};
pub use states::{
    ProcessingEvent, TransitionOutcome, TransitionPayload, WorkflowCommand, WorkflowEvent,
};
