use std::sync::Arc;

use doccoord_kv::Engine;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub config: Arc<Config>,
}
