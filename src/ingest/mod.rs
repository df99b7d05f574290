pub mod status;
pub mod subscriber;
pub mod validator;

pub use status::{SubscriberPhase, SubscriberStatus};
pub use subscriber::{IngestionSubscriber, SubscriberHandle};
