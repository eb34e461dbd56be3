pub mod json;
pub mod prometheus;

pub use json::{JsonExporter, StoreSnapshot};
pub use self::prometheus::{encode_text, normalize_name, PrometheusExporter, TEXT_CONTENT_TYPE};
