pub mod error;
pub mod id;
pub mod parameter;
pub mod scope;
pub mod time;

pub use error::{CoreError, Result};
pub use id::{generate_id, validate_external_id, validate_id};
pub use parameter::{ChildParameter, ExternalParameterView, ParameterStatus, ParentResource};
pub use scope::{OwnerId, ScopeKey};
pub use time::now_utc;
