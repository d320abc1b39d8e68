use crate::auth::AuthContext;
use crate::clients::{current_client, ensure_client};
use crate::error::Result;
use crate::models::{NewVehicle, Vehicle};
use crate::query::Query;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
struct VehicleRow<'a> {
    #[serde(flatten)]
    vehicle: &'a NewVehicle,
    client_id: &'a str,
}

/// Vehicles of the signed-in user's client. Empty when signed out or when
/// the user has no client row yet.
pub fn user_vehicles(ctx: &AuthContext) -> Result<Vec<Vehicle>> {
    let Some(client) = current_client(ctx)? else {
        return Ok(Vec::new());
    };
    ctx.select(&Query::from("vehicles").eq("client_id", client.id.as_str()))
}

/// Registers a vehicle under the user's client, creating the client row
/// first when needed. The stored `client_id` is the client row's id, the
/// same key [`user_vehicles`] reads by.
pub fn add_vehicle(ctx: &AuthContext, vehicle: &NewVehicle) -> Result<Vehicle> {
    let client = ensure_client(ctx)?;
    let created: Vehicle = ctx.insert_one(
        "vehicles",
        &VehicleRow {
            vehicle,
            client_id: &client.id,
        },
    )?;
    info!(vehicle = %created.id, client = %client.id, "vehicle registered");
    Ok(created)
}

/// `AUTO-` followed by the last six digits of the epoch milliseconds.
pub fn placeholder_plate(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(6)..];
    format!("AUTO-{tail}")
}
