//! Change notifications.
//!
//! After a successful write, handlers hand a [`ChangeEvent`] to the
//! [`EventDispatcher`], which publishes it in the background. Delivery is
//! best-effort: a failed publish is logged and never reaches the caller.

mod publisher;
mod redis_queue;

pub use self::publisher::{ChangeEvent, EventDispatcher, EventPublisher};
pub use self::redis_queue::{RedisBroker, RedisQueuePublisher};
