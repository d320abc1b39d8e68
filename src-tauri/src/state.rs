use autospot_core::models::{Appointment, Vehicle};
use autospot_core::{AuthContext, Latest, RankedWorkshop};
use std::sync::Arc;

/// Shared by every command. The `Latest` slots hold the last applied load of
/// the screens that refresh on focus or on location updates.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthContext>,
    pub appointments: Arc<Latest<Vec<Appointment>>>,
    pub vehicles: Arc<Latest<Vec<Vehicle>>>,
    pub workshops: Arc<Latest<Vec<RankedWorkshop>>>,
}

impl AppState {
    pub fn new(auth: AuthContext) -> Self {
        Self {
            auth: Arc::new(auth),
            appointments: Arc::new(Latest::new()),
            vehicles: Arc::new(Latest::new()),
            workshops: Arc::new(Latest::new()),
        }
    }

    /// Drops cached screen data, e.g. after the user signs out.
    pub fn clear_screens(&self) {
        self.appointments.clear();
        self.vehicles.clear();
        self.workshops.clear();
    }
}
