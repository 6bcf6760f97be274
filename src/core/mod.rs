pub mod batcher;
pub mod shutdown;
pub mod snippet;
pub mod source;
pub mod stream;

pub use crate::domain::model::{Batch, Delivery, DeliveryTarget, FileUpload, Line};
pub use crate::domain::ports::{ConfigProvider, Deliver};
pub use crate::utils::error::Result;
