use crate::auth::AuthContext;
use crate::error::{Error, Result};
use crate::models::{ServiceCatalogEntry, VehicleBrand, VehicleModel};
use crate::query::{Direction, Query};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServiceFilter {
    #[default]
    All,
    ActiveOnly,
}

pub fn services(ctx: &AuthContext, filter: ServiceFilter) -> Result<Vec<ServiceCatalogEntry>> {
    let mut query = Query::from("service_catalog");
    if filter == ServiceFilter::ActiveOnly {
        query = query.eq("active", true);
    }
    ctx.select(&query)
}

/// Brands ordered by name.
pub fn brands(ctx: &AuthContext) -> Result<Vec<VehicleBrand>> {
    ctx.select(
        &Query::from("vehicle_brands")
            .select("id, name")
            .order("name", Direction::Ascending),
    )
}

/// Models of one brand ordered by name.
pub fn models_by_brand(ctx: &AuthContext, brand_id: &str) -> Result<Vec<VehicleModel>> {
    ctx.select(
        &Query::from("vehicle_models")
            .select("id, brand_id, name")
            .eq("brand_id", brand_id)
            .order("name", Direction::Ascending),
    )
}

pub fn brand(ctx: &AuthContext, id: &str) -> Result<VehicleBrand> {
    let rows: Vec<VehicleBrand> = ctx.select(&Query::from("vehicle_brands").eq("id", id).limit(1))?;
    rows.into_iter().next().ok_or_else(|| Error::NotFound {
        entity: "vehicle brand",
        id: id.to_string(),
    })
}

pub fn model(ctx: &AuthContext, id: &str) -> Result<VehicleModel> {
    let rows: Vec<VehicleModel> = ctx.select(&Query::from("vehicle_models").eq("id", id).limit(1))?;
    rows.into_iter().next().ok_or_else(|| Error::NotFound {
        entity: "vehicle model",
        id: id.to_string(),
    })
}
