use hearth_core::HouseholdStore;
use hearth_notify::PushDispatcher;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<PushDispatcher>,
    pub store: Arc<dyn HouseholdStore>,
    pub api_key: Option<Arc<str>>,
}
