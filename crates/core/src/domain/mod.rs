pub mod actor;
pub mod comment;
pub mod request;

pub use actor::{Actor, ActorId, Role};
pub use comment::{Comment, CommentId};
pub use request::{
    ApprovalLevel, NewRequest, Priority, Request, RequestId, RequestStatus, RequestType,
};
