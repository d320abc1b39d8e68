use crate::auth::AuthContext;
use crate::clients::{current_client, require_client};
use crate::error::{Error, Result};
use crate::models::{Appointment, AppointmentDetails, AppointmentStatus, NewAppointment};
use crate::query::{Direction, Query};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

const LIST_COLUMNS: &str = "*, vehicle:vehicles(make, model, license_plate), service:service_catalog(name, estimated_price)";
const DETAIL_COLUMNS: &str = "*, vehicle:vehicles(*), service:service_catalog(*)";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub vehicle_id: String,
    pub service_id: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub notes: String,
}

/// Appointments of the signed-in user's client, earliest first, with vehicle
/// and service summaries embedded. Empty when there is no client.
pub fn user_appointments(ctx: &AuthContext) -> Result<Vec<Appointment>> {
    let Some(client) = current_client(ctx)? else {
        return Ok(Vec::new());
    };
    ctx.select(
        &Query::from("appointments")
            .select(LIST_COLUMNS)
            .eq("client_id", client.id.as_str())
            .order("scheduled_at", Direction::Ascending),
    )
}

/// Books an appointment with status `scheduled`. The client row must already
/// exist. Vehicle ownership is left to the backend.
pub fn schedule_appointment(ctx: &AuthContext, request: &ScheduleRequest) -> Result<Appointment> {
    let client = require_client(ctx)?;
    let row = NewAppointment {
        client_id: client.id,
        vehicle_id: request.vehicle_id.clone(),
        service_id: request.service_id.clone().filter(|id| !id.is_empty()),
        scheduled_at: request.scheduled_at,
        notes: request.notes.clone(),
        status: AppointmentStatus::Scheduled,
    };
    let created: Appointment = ctx.insert_one("appointments", &row)?;
    info!(appointment = %created.id, "appointment scheduled");
    Ok(created)
}

pub fn appointment_details(ctx: &AuthContext, id: &str) -> Result<AppointmentDetails> {
    let rows: Vec<AppointmentDetails> = ctx.select(
        &Query::from("appointments")
            .select(DETAIL_COLUMNS)
            .eq("id", id)
            .limit(1),
    )?;
    rows.into_iter().next().ok_or_else(|| Error::NotFound {
        entity: "appointment",
        id: id.to_string(),
    })
}
