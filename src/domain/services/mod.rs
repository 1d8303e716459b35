mod digest;
mod record_matcher;
mod work_queue;

pub use digest::digest;
pub use record_matcher::RecordMatcher;
pub use work_queue::{
    Disposition, FailureReason, SkipReason, WorkQueue, WorkState, WorkTicket,
};
