//! Great-circle distance from the user to each workshop.

use crate::auth::AuthContext;
use crate::error::{Error, Result};
use crate::models::Workshop;
use crate::query::Query;
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Rejects non-finite values and anything outside ±90 / ±180.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::validation(format!("latitude out of range: {latitude}")));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::validation(format!("longitude out of range: {longitude}")));
        }
        Ok(Self { latitude, longitude })
    }
}

/// Haversine distance in kilometres.
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedWorkshop {
    #[serde(flatten)]
    pub workshop: Workshop,
    pub distance_km: f64,
}

/// Attaches the distance from `origin` to every workshop and sorts nearest
/// first. Ties keep their input order.
pub fn rank_by_distance(origin: Coordinates, workshops: Vec<Workshop>) -> Vec<RankedWorkshop> {
    let mut ranked: Vec<RankedWorkshop> = workshops
        .into_iter()
        .map(|workshop| {
            let at = Coordinates {
                latitude: workshop.latitude,
                longitude: workshop.longitude,
            };
            RankedWorkshop {
                distance_km: haversine_km(origin, at),
                workshop,
            }
        })
        .collect();
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked
}

pub fn nearby_workshops(ctx: &AuthContext, origin: Coordinates) -> Result<Vec<RankedWorkshop>> {
    let workshops: Vec<Workshop> = ctx.select(&Query::from("workshops_with_coords"))?;
    Ok(rank_by_distance(origin, workshops))
}
