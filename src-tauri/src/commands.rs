use crate::state::AppState;
use autospot_core::appointments::{self, ScheduleRequest};
use autospot_core::catalog::{self, ServiceFilter};
use autospot_core::clients;
use autospot_core::models::{
    Appointment, AppointmentDetails, Client, NewClient, NewVehicle, ServiceCatalogEntry, User,
    Vehicle, VehicleBrand, VehicleModel,
};
use autospot_core::sequence::{Latest, Outcome, Ticket};
use autospot_core::status::{partition, Bucket, Stage, Timeline};
use autospot_core::vehicles;
use autospot_core::workshops::{self, Coordinates, RankedWorkshop};
use autospot_core::{AuthSnapshot, SignUpOutcome};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const FALLBACK_NAME: &str = "Usuario";
const FALLBACK_AVATAR_URL: &str = "https://ui-avatars.com/api/?background=2563EB&color=fff&size=200";
const PLACEHOLDER_COLOR: &str = "N/A";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDto {
    pub signed_in: bool,
    pub is_loading: bool,
    pub is_admin: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
}

impl From<&AuthSnapshot> for SessionDto {
    fn from(snapshot: &AuthSnapshot) -> Self {
        let user = snapshot.user();
        Self {
            signed_in: user.is_some(),
            is_loading: snapshot.is_loading,
            is_admin: snapshot.is_admin,
            user_id: user.map(|u| u.id.clone()),
            email: user.and_then(|u| u.email.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignUpDto {
    pub signed_in: bool,
    /// The account must be confirmed before the first sign-in.
    pub needs_confirmation: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppointmentItemDto {
    pub id: String,
    pub scheduled_at: String,
    pub status: String,
    pub stage: Stage,
    pub vehicle: Option<String>,
    pub license_plate: Option<String>,
    pub service: Option<String>,
    pub estimated_price: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCountsDto {
    pub upcoming: usize,
    pub completed: usize,
    pub cancelled: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppointmentsViewDto {
    pub tab: Bucket,
    pub tab_label: String,
    pub counts: BucketCountsDto,
    pub items: Vec<AppointmentItemDto>,
    /// A newer load was started while this one ran; the UI drops it.
    pub stale: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppointmentDetailsDto {
    pub id: String,
    pub reference: String,
    pub status: String,
    pub stage: Stage,
    pub scheduled_at: String,
    pub vehicle: Option<String>,
    pub license_plate: Option<String>,
    pub service: Option<String>,
    pub estimated_price: Option<f64>,
    pub notes: Option<String>,
    pub timeline: Timeline,
    pub share_message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleFormDto {
    pub vehicles: Vec<Vehicle>,
    pub services: Vec<ServiceCatalogEntry>,
    pub selected_vehicle_id: Option<String>,
    pub selected_service_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehiclesDto {
    pub vehicles: Vec<Vehicle>,
    pub stale: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkshopsDto {
    pub workshops: Vec<RankedWorkshop>,
    pub stale: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientInfoDto {
    pub registered: bool,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: String,
    pub address: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileDto {
    pub full_name: String,
    pub email: Option<String>,
    pub avatar_url: String,
}

// ── Session ──────────────────────────────────────────────────────────────────

pub fn session_info(state: &AppState) -> SessionDto {
    SessionDto::from(&state.auth.snapshot())
}

pub fn sign_in(state: &AppState, email: String, password: String) -> Result<SessionDto, String> {
    state.auth.sign_in_with_password(&email, &password)?;
    Ok(session_info(state))
}

pub fn sign_up(
    state: &AppState,
    email: String,
    password: String,
    full_name: String,
) -> Result<SignUpDto, String> {
    let outcome = state.auth.sign_up(&email, &password, &full_name)?;
    let signed_in = matches!(outcome, SignUpOutcome::SignedIn(_));
    Ok(SignUpDto {
        signed_in,
        needs_confirmation: !signed_in,
    })
}

pub fn sign_out(state: &AppState) -> Result<(), String> {
    let result = state.auth.sign_out();
    state.clear_screens();
    result.map_err(String::from)
}

pub fn profile(state: &AppState) -> Result<ProfileDto, String> {
    Ok(profile_dto(state.auth.require_user()?))
}

// ── Home ─────────────────────────────────────────────────────────────────────

pub fn list_services(state: &AppState) -> Result<Vec<ServiceCatalogEntry>, String> {
    Ok(catalog::services(&state.auth, ServiceFilter::All)?)
}

// ── Appointments ─────────────────────────────────────────────────────────────

/// Counts for every tab plus the items of `tab` (default: upcoming).
pub fn appointments_view(state: &AppState, tab: Option<String>) -> Result<AppointmentsViewDto, String> {
    let tab = match tab.as_deref() {
        None | Some("") => Bucket::default(),
        Some(raw) => Bucket::parse(raw).ok_or_else(|| format!("unknown tab: {raw}"))?,
    };

    let ticket = state.appointments.issue();
    let list = appointments::user_appointments(&state.auth)?;
    let (list, stale) = settle(&state.appointments, ticket, list);

    let buckets = partition(list);
    let counts = BucketCountsDto {
        upcoming: buckets.upcoming.len(),
        completed: buckets.completed.len(),
        cancelled: buckets.cancelled.len(),
    };
    Ok(AppointmentsViewDto {
        tab,
        tab_label: tab.label().to_string(),
        counts,
        items: buckets.into_bucket(tab).iter().map(appointment_item).collect(),
        stale,
    })
}

pub fn appointment_details(state: &AppState, id: String) -> Result<AppointmentDetailsDto, String> {
    let details = appointments::appointment_details(&state.auth, &id)?;
    Ok(details_dto(details))
}

pub fn schedule_form(state: &AppState) -> Result<ScheduleFormDto, String> {
    let vehicles = vehicles::user_vehicles(&state.auth)?;
    let services = catalog::services(&state.auth, ServiceFilter::ActiveOnly)?;
    Ok(ScheduleFormDto {
        selected_vehicle_id: vehicles.first().map(|v| v.id.clone()),
        selected_service_id: services.first().map(|s| s.id.clone()),
        vehicles,
        services,
    })
}

pub fn schedule_appointment(
    state: &AppState,
    vehicle_id: String,
    service_id: Option<String>,
    scheduled_at: String,
    notes: String,
) -> Result<AppointmentItemDto, String> {
    if vehicle_id.trim().is_empty() {
        return Err("register a vehicle before scheduling".into());
    }
    let scheduled_at = DateTime::parse_from_rfc3339(scheduled_at.trim())
        .map_err(|e| format!("invalid date {scheduled_at}: {e}"))?
        .with_timezone(&Utc);

    let created = appointments::schedule_appointment(
        &state.auth,
        &ScheduleRequest {
            vehicle_id,
            service_id,
            scheduled_at,
            notes,
        },
    )?;
    Ok(appointment_item(&created))
}

// ── Vehicles ─────────────────────────────────────────────────────────────────

pub fn my_vehicles(state: &AppState) -> Result<VehiclesDto, String> {
    let ticket = state.vehicles.issue();
    let list = vehicles::user_vehicles(&state.auth)?;
    let (vehicles, stale) = settle(&state.vehicles, ticket, list);
    Ok(VehiclesDto { vehicles, stale })
}

pub fn list_brands(state: &AppState) -> Result<Vec<VehicleBrand>, String> {
    Ok(catalog::brands(&state.auth)?)
}

pub fn list_models(state: &AppState, brand_id: String) -> Result<Vec<VehicleModel>, String> {
    if brand_id.is_empty() {
        return Ok(Vec::new());
    }
    Ok(catalog::models_by_brand(&state.auth, &brand_id)?)
}

/// Registers the selected brand and model for the signed-in user with the
/// current year, a generated plate and no color.
pub fn register_vehicle(state: &AppState, brand_id: String, model_id: String) -> Result<Vehicle, String> {
    if brand_id.is_empty() || model_id.is_empty() {
        return Err("select a brand and a model".into());
    }
    let brand = catalog::brand(&state.auth, &brand_id)?;
    let model = catalog::model(&state.auth, &model_id)?;
    if model.brand_id != brand.id {
        return Err(format!("{} is not a {} model", model.name, brand.name));
    }

    let now = Utc::now();
    let vehicle = vehicles::add_vehicle(
        &state.auth,
        &NewVehicle {
            make: brand.name,
            model: model.name,
            year: now.year(),
            license_plate: vehicles::placeholder_plate(now),
            color: PLACEHOLDER_COLOR.into(),
            photo_url: None,
        },
    )?;
    Ok(vehicle)
}

// ── Map ──────────────────────────────────────────────────────────────────────

pub fn nearby_workshops(state: &AppState, latitude: f64, longitude: f64) -> Result<WorkshopsDto, String> {
    let origin = Coordinates::new(latitude, longitude)?;
    let ticket = state.workshops.issue();
    let ranked = workshops::nearby_workshops(&state.auth, origin)?;
    let (workshops, stale) = settle(&state.workshops, ticket, ranked);
    Ok(WorkshopsDto { workshops, stale })
}

// ── Clients ──────────────────────────────────────────────────────────────────

pub fn client_info(state: &AppState) -> Result<ClientInfoDto, String> {
    let client = clients::current_client(&state.auth)?;
    Ok(client.map(client_info_dto).unwrap_or_default())
}

pub fn update_client_info(state: &AppState, phone: String, address: String) -> Result<ClientInfoDto, String> {
    let client = clients::update_contact(&state.auth, &phone, &address)?;
    info!(client = %client.id, "contact details updated");
    Ok(client_info_dto(client))
}

pub fn list_clients(state: &AppState) -> Result<Vec<Client>, String> {
    require_privileged(state)?;
    Ok(clients::list_clients(&state.auth)?)
}

pub fn create_client(
    state: &AppState,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    email: Option<String>,
) -> Result<Client, String> {
    require_privileged(state)?;
    Ok(clients::create_client(
        &state.auth,
        NewClient {
            first_name,
            last_name,
            email,
            phone,
            address: None,
        },
    )?)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn session_info_cmd(state: tauri::State<'_, AppState>) -> SessionDto {
    session_info(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn sign_in_cmd(
    state: tauri::State<'_, AppState>,
    email: String,
    password: String,
) -> Result<SessionDto, String> {
    sign_in(&state, email, password)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn sign_up_cmd(
    state: tauri::State<'_, AppState>,
    email: String,
    password: String,
    full_name: String,
) -> Result<SignUpDto, String> {
    sign_up(&state, email, password, full_name)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn sign_out_cmd(state: tauri::State<'_, AppState>) -> Result<(), String> {
    sign_out(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn profile_cmd(state: tauri::State<'_, AppState>) -> Result<ProfileDto, String> {
    profile(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn list_services_cmd(state: tauri::State<'_, AppState>) -> Result<Vec<ServiceCatalogEntry>, String> {
    list_services(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn appointments_view_cmd(
    state: tauri::State<'_, AppState>,
    tab: Option<String>,
) -> Result<AppointmentsViewDto, String> {
    appointments_view(&state, tab)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn appointment_details_cmd(
    state: tauri::State<'_, AppState>,
    id: String,
) -> Result<AppointmentDetailsDto, String> {
    appointment_details(&state, id)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn schedule_form_cmd(state: tauri::State<'_, AppState>) -> Result<ScheduleFormDto, String> {
    schedule_form(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn schedule_appointment_cmd(
    state: tauri::State<'_, AppState>,
    vehicle_id: String,
    service_id: Option<String>,
    scheduled_at: String,
    notes: String,
) -> Result<AppointmentItemDto, String> {
    schedule_appointment(&state, vehicle_id, service_id, scheduled_at, notes)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn my_vehicles_cmd(state: tauri::State<'_, AppState>) -> Result<VehiclesDto, String> {
    my_vehicles(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn list_brands_cmd(state: tauri::State<'_, AppState>) -> Result<Vec<VehicleBrand>, String> {
    list_brands(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn list_models_cmd(
    state: tauri::State<'_, AppState>,
    brand_id: String,
) -> Result<Vec<VehicleModel>, String> {
    list_models(&state, brand_id)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn register_vehicle_cmd(
    state: tauri::State<'_, AppState>,
    brand_id: String,
    model_id: String,
) -> Result<Vehicle, String> {
    register_vehicle(&state, brand_id, model_id)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn nearby_workshops_cmd(
    state: tauri::State<'_, AppState>,
    latitude: f64,
    longitude: f64,
) -> Result<WorkshopsDto, String> {
    nearby_workshops(&state, latitude, longitude)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn client_info_cmd(state: tauri::State<'_, AppState>) -> Result<ClientInfoDto, String> {
    client_info(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn update_client_info_cmd(
    state: tauri::State<'_, AppState>,
    phone: String,
    address: String,
) -> Result<ClientInfoDto, String> {
    update_client_info(&state, phone, address)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn list_clients_cmd(state: tauri::State<'_, AppState>) -> Result<Vec<Client>, String> {
    list_clients(&state)
}

#[cfg(feature = "tauri-app")]
#[tauri::command(rename_all = "camelCase")]
pub fn create_client_cmd(
    state: tauri::State<'_, AppState>,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    email: Option<String>,
) -> Result<Client, String> {
    create_client(&state, first_name, last_name, phone, email)
}

/// Records a finished load in its slot and returns what the screen should
/// show. A superseded load yields the slot's newest applied value (or its
/// own, if nothing was applied yet) flagged as stale.
fn settle<T: Clone>(slot: &Latest<T>, ticket: Ticket, value: T) -> (T, bool) {
    match slot.complete(ticket, value.clone()) {
        Outcome::Applied => (value, false),
        Outcome::Superseded => {
            debug!(?ticket, "discarding superseded load");
            (slot.current().unwrap_or(value), true)
        }
    }
}

fn require_privileged(state: &AppState) -> Result<(), String> {
    state.auth.require_user()?;
    if !state.auth.is_admin() {
        return Err("this section is only available to staff".into());
    }
    Ok(())
}

fn profile_dto(user: User) -> ProfileDto {
    let metadata = user.user_metadata;
    ProfileDto {
        full_name: non_blank(metadata.full_name).unwrap_or_else(|| FALLBACK_NAME.into()),
        email: user.email,
        avatar_url: non_blank(metadata.avatar_url).unwrap_or_else(|| FALLBACK_AVATAR_URL.into()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn vehicle_label(make: &str, model: &str) -> String {
    format!("{make} {model}")
}

fn appointment_item(appointment: &Appointment) -> AppointmentItemDto {
    AppointmentItemDto {
        id: appointment.id.clone(),
        scheduled_at: appointment.scheduled_at.to_rfc3339(),
        status: appointment.status.as_str().to_string(),
        stage: appointment.status.stage(),
        vehicle: appointment
            .vehicle
            .as_ref()
            .map(|v| vehicle_label(&v.make, &v.model)),
        license_plate: appointment.vehicle.as_ref().map(|v| v.license_plate.clone()),
        service: appointment.service.as_ref().map(|s| s.name.clone()),
        estimated_price: appointment.service.as_ref().and_then(|s| s.estimated_price),
    }
}

/// `#` and the first eight characters of the id, uppercased.
pub fn short_reference(id: &str) -> String {
    let head: String = id.chars().take(8).collect();
    format!("#{}", head.to_uppercase())
}

fn share_message(details: &AppointmentDetails) -> String {
    let mut message = String::from("Mi reservación en Autofix");
    if let Some(vehicle) = &details.vehicle {
        message.push_str(&format!(" para el {}", vehicle_label(&vehicle.make, &vehicle.model)));
    }
    message.push('.');
    if let Some(service) = &details.service {
        message.push_str(&format!(" Servicio: {}", service.name));
    }
    message
}

fn details_dto(details: AppointmentDetails) -> AppointmentDetailsDto {
    let share_message = share_message(&details);
    AppointmentDetailsDto {
        reference: short_reference(&details.id),
        status: details.status.as_str().to_string(),
        stage: details.status.stage(),
        timeline: Timeline::for_status(details.status),
        scheduled_at: details.scheduled_at.to_rfc3339(),
        vehicle: details
            .vehicle
            .as_ref()
            .map(|v| vehicle_label(&v.make, &v.model)),
        license_plate: details.vehicle.as_ref().map(|v| v.license_plate.clone()),
        service: details.service.as_ref().map(|s| s.name.clone()),
        estimated_price: details.service.as_ref().and_then(|s| s.estimated_price),
        notes: details.notes,
        id: details.id,
        share_message,
    }
}

fn client_info_dto(client: Client) -> ClientInfoDto {
    ClientInfoDto {
        registered: true,
        full_name: Some(client.full_name()),
        email: client.email,
        phone: client.phone.unwrap_or_default(),
        address: client.address.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed_demo_data;
    use autospot_core::models::UserMetadata;
    use autospot_core::session_store::NoopSessionStore;
    use autospot_core::{AuthContext, MemoryBackend};
    use serde_json::json;
    use std::sync::Arc;

    fn state_with(backend: Arc<MemoryBackend>) -> AppState {
        let auth = AuthContext::new(backend, Arc::new(NoopSessionStore));
        auth.initialize();
        AppState::new(auth)
    }

    fn signed_in_state() -> (Arc<MemoryBackend>, AppState) {
        let backend = Arc::new(MemoryBackend::new());
        seed_demo_data(&backend).expect("seed");
        let state = state_with(backend.clone());
        sign_up(
            &state,
            "a@b.com".into(),
            "secret123".into(),
            "Ana Lopez".into(),
        )
        .expect("sign up");
        (backend, state)
    }

    fn first_brand_and_model(state: &AppState, brand: &str, model: &str) -> (String, String) {
        let brand_id = list_brands(state)
            .expect("brands")
            .into_iter()
            .find(|b| b.name == brand)
            .expect("brand")
            .id;
        let model_id = list_models(state, brand_id.clone())
            .expect("models")
            .into_iter()
            .find(|m| m.name == model)
            .expect("model")
            .id;
        (brand_id, model_id)
    }

    #[test]
    fn session_info_tracks_sign_in_and_out() {
        let backend = Arc::new(MemoryBackend::new().with_email_confirmation());
        let state = state_with(backend);
        assert_eq!(session_info(&state), SessionDto::default());

        let signed_up = sign_up(
            &state,
            "a@b.com".into(),
            "secret123".into(),
            "Ana Lopez".into(),
        )
        .expect("sign up");
        assert!(signed_up.needs_confirmation);
        assert!(!session_info(&state).signed_in);

        let err = sign_in(&state, "a@b.com".into(), "nope".into()).expect_err("bad password");
        assert_eq!(err, "Invalid login credentials");

        let session = sign_in(&state, "a@b.com".into(), "secret123".into()).expect("sign in");
        assert!(session.signed_in);
        assert_eq!(session.email.as_deref(), Some("a@b.com"));

        sign_out(&state).expect("sign out");
        assert!(!session_info(&state).signed_in);
    }

    #[test]
    fn register_vehicle_resolves_names_from_the_catalog() {
        let (_backend, state) = signed_in_state();
        let (brand_id, model_id) = first_brand_and_model(&state, "Toyota", "Corolla");

        let vehicle = register_vehicle(&state, brand_id.clone(), model_id).expect("register");
        assert_eq!(vehicle.make, "Toyota");
        assert_eq!(vehicle.model, "Corolla");
        assert_eq!(vehicle.year, Utc::now().year());
        assert_eq!(vehicle.color, "N/A");
        assert!(vehicle.license_plate.starts_with("AUTO-"));

        let listed = my_vehicles(&state).expect("vehicles");
        assert!(!listed.stale);
        assert_eq!(listed.vehicles, vec![vehicle]);

        assert!(register_vehicle(&state, brand_id, String::new()).is_err());
        let (_, nissan_model) = first_brand_and_model(&state, "Nissan", "Versa");
        let toyota = first_brand_and_model(&state, "Toyota", "Corolla").0;
        assert!(register_vehicle(&state, toyota, nissan_model).is_err());
    }

    #[test]
    fn schedule_then_view_by_tab_and_details() {
        let (backend, state) = signed_in_state();
        let (brand_id, model_id) = first_brand_and_model(&state, "Toyota", "Corolla");
        register_vehicle(&state, brand_id, model_id).expect("register");

        let form = schedule_form(&state).expect("form");
        let vehicle_id = form.selected_vehicle_id.clone().expect("vehicle");
        let service_id = form.selected_service_id.clone();
        assert!(form.services.iter().all(|s| s.active));

        let booked = schedule_appointment(
            &state,
            vehicle_id.clone(),
            service_id,
            "2026-06-01T09:30:00-06:00".into(),
            "revisar frenos".into(),
        )
        .expect("schedule");
        assert_eq!(booked.status, "scheduled");
        assert_eq!(booked.scheduled_at, "2026-06-01T15:30:00+00:00");

        let view = appointments_view(&state, None).expect("view");
        assert_eq!(view.tab, Bucket::Upcoming);
        assert_eq!(view.tab_label, "programadas");
        assert_eq!(
            view.counts,
            BucketCountsDto {
                upcoming: 1,
                completed: 0,
                cancelled: 0
            }
        );
        assert_eq!(view.items[0].vehicle.as_deref(), Some("Toyota Corolla"));

        backend
            .seed(
                "appointments",
                vec![json!({
                    "client_id": clients::current_client(&state.auth).expect("lookup").expect("client").id,
                    "vehicle_id": vehicle_id,
                    "scheduled_at": "2025-01-10T10:00:00Z",
                    "status": "completed"
                })],
            )
            .expect("seed");
        let done = appointments_view(&state, Some("realizadas".into())).expect("view");
        assert_eq!(done.counts.upcoming, 1);
        assert_eq!(done.counts.completed, 1);
        assert_eq!(done.items.len(), 1);
        assert_eq!(done.items[0].stage, Stage::Delivered);
        assert!(appointments_view(&state, Some("pending".into())).is_err());

        let details = appointment_details(&state, booked.id.clone()).expect("details");
        assert_eq!(details.reference, short_reference(&booked.id));
        assert!(details.timeline.booked);
        assert!(!details.timeline.confirmed);
        assert!(details
            .share_message
            .starts_with("Mi reservación en Autofix para el Toyota Corolla."));
    }

    #[test]
    fn scheduling_needs_a_vehicle_and_a_valid_date() {
        let (_backend, state) = signed_in_state();
        assert!(schedule_appointment(&state, String::new(), None, "2026-06-01T09:00:00Z".into(), String::new()).is_err());
        assert!(schedule_appointment(&state, "v1".into(), None, "mañana".into(), String::new()).is_err());
    }

    #[test]
    fn short_reference_uppercases_first_eight() {
        assert_eq!(short_reference("3f2a9c1d-aaaa-bbbb"), "#3F2A9C1D");
        assert_eq!(short_reference("ab"), "#AB");
    }

    #[test]
    fn superseded_loads_are_flagged() {
        let slot = Latest::new();
        let older = slot.issue();
        let newer = slot.issue();
        assert_eq!(settle(&slot, newer, vec![2]), (vec![2], false));
        assert_eq!(settle(&slot, older, vec![1]), (vec![2], true));
        assert_eq!(slot.current(), Some(vec![2]));
    }

    #[test]
    fn load_started_before_sign_out_comes_back_stale() {
        let (_backend, state) = signed_in_state();
        let (brand_id, model_id) = first_brand_and_model(&state, "Nissan", "Versa");
        register_vehicle(&state, brand_id, model_id).expect("register");

        let pending = state.vehicles.issue();
        let loaded = vehicles::user_vehicles(&state.auth).expect("vehicles");
        assert_eq!(loaded.len(), 1);

        sign_out(&state).expect("sign out");
        let (_, stale) = settle(&state.vehicles, pending, loaded);
        assert!(stale);
        assert!(state.vehicles.current().is_none());
    }

    #[test]
    fn nearby_workshops_ranks_and_validates() {
        let (_backend, state) = signed_in_state();
        let near = nearby_workshops(&state, 19.4326, -99.1332).expect("nearby");
        assert!(!near.stale);
        assert!(near
            .workshops
            .windows(2)
            .all(|w| w[0].distance_km <= w[1].distance_km));
        assert!(nearby_workshops(&state, 123.0, 0.0).is_err());
    }

    #[test]
    fn client_info_round_trip() {
        let backend = Arc::new(MemoryBackend::new().with_email_confirmation());
        seed_demo_data(&backend).expect("seed");
        let state = state_with(backend);
        sign_up(&state, "a@b.com".into(), "secret123".into(), "Ana Lopez".into()).expect("sign up");
        sign_in(&state, "a@b.com".into(), "secret123".into()).expect("sign in");

        assert_eq!(client_info(&state).expect("info"), ClientInfoDto::default());
        assert_eq!(
            update_client_info(&state, "555".into(), "Centro".into()).expect_err("no row"),
            "client profile not found"
        );

        let (brand_id, model_id) = first_brand_and_model(&state, "Toyota", "Corolla");
        register_vehicle(&state, brand_id, model_id).expect("register");
        let updated = update_client_info(&state, "555-1234".into(), "Av. Juárez 5".into()).expect("update");
        assert!(updated.registered);
        assert_eq!(updated.full_name.as_deref(), Some("Ana Lopez"));
        assert_eq!(updated.phone, "555-1234");
        assert_eq!(client_info(&state).expect("info"), updated);
    }

    #[test]
    fn clients_section_is_staff_only() {
        let (backend, state) = signed_in_state();
        assert!(list_clients(&state).is_err());

        let user_id = state.auth.user().expect("user").id;
        backend.set_role(&user_id, "admin").expect("role");
        sign_out(&state).expect("sign out");
        sign_in(&state, "a@b.com".into(), "secret123".into()).expect("sign in");
        assert!(session_info(&state).is_admin);

        let created = create_client(&state, "Luis".into(), "Diaz".into(), Some("555".into()), None)
            .expect("create");
        let names: Vec<String> = list_clients(&state)
            .expect("list")
            .into_iter()
            .map(|c| c.full_name())
            .collect();
        assert!(names.contains(&created.full_name()));
        assert!(create_client(&state, String::new(), "Diaz".into(), None, None).is_err());
    }

    #[test]
    fn profile_reads_user_metadata() {
        let (_backend, state) = signed_in_state();
        let shown = profile(&state).expect("profile");
        assert_eq!(shown.full_name, "Ana Lopez");
        assert_eq!(shown.email.as_deref(), Some("a@b.com"));
        assert_eq!(shown.avatar_url, autospot_core::auth::DEFAULT_AVATAR_URL);

        sign_out(&state).expect("sign out");
        assert!(profile(&state).is_err());
    }

    #[test]
    fn profile_without_metadata_uses_fallbacks() {
        let shown = profile_dto(User {
            id: "u1".into(),
            email: Some("b@b.com".into()),
            user_metadata: UserMetadata {
                full_name: Some("  ".into()),
                avatar_url: None,
            },
        });
        assert_eq!(shown.full_name, "Usuario");
        assert!(shown.avatar_url.starts_with("https://ui-avatars.com/"));
    }
}
