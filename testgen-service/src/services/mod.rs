pub mod metrics;
pub mod providers;
pub mod relay;
pub mod resolver;
pub mod storage;

pub use self::metrics::{get_metrics, init_metrics};
pub use relay::{GenerationError, GenerationRelay};
pub use resolver::resolve_payload;
pub use storage::{LocalStorage, Storage};
