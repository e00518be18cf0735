pub mod error;
pub mod types;

pub use error::{PitError, Result};
pub use types::{ContextToken, Document, ShardId, ShardReference};
