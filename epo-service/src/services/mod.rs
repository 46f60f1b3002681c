pub mod epo;
pub mod metrics;

pub use epo::{MockPatentSearch, OpsClient, PatentSearch, UpstreamError, UpstreamPayload};
pub use metrics::{get_metrics, init_metrics};
