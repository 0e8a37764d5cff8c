pub mod alert;
pub mod submission;

pub use alert::{Alert, MaskedDetails, NewAlert, Severity};
pub use submission::{AlertSubmission, SubmitReceipt};
