use std::sync::Arc;

use crate::config::AppConfig;
use crate::data::RateSource;
use crate::ml::ModelHandle;

/// Combined application state for the scoring service. Cheap to clone;
/// every field is a handle.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub model: ModelHandle,
    pub rates: Arc<dyn RateSource>,
}
