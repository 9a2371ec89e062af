mod batch;
mod contribution;
mod notification;
mod observable;

pub(crate) use batch::Batch;
pub(crate) use contribution::Contribution;
pub(crate) use notification::{channel, Notification, Outcome};
pub(crate) use observable::ObservableRequest;
pub use observable::RequestKind;
