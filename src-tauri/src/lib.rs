pub mod commands;
pub mod runtime;
pub mod state;

use crate::state::AppState;
use autospot_core::session_store::{open_store, NoopSessionStore};
use autospot_core::{AuthContext, BackendConfig, MemoryBackend, RestBackend};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "tauri-app")]
use tauri::Manager;

pub fn build_state() -> Result<AppState, String> {
    let config = BackendConfig::from_env()?;
    let store = open_store(config.session_db.as_deref())?;
    info!(url = %config.base_url(), persistent_session = config.session_db.is_some(), "backend configured");
    let backend = RestBackend::new(config)?;
    Ok(AppState::new(AuthContext::new(Arc::new(backend), store)))
}

pub fn run() -> Result<(), String> {
    let state = build_state()?;
    let _session = runtime::start(&state);

    let session = commands::session_info(&state);
    println!(
        "session:\n{}",
        serde_json::to_string_pretty(&session).map_err(|e| e.to_string())?
    );
    if session.signed_in {
        let view = commands::appointments_view(&state, None)?;
        println!(
            "appointments:\n{}",
            serde_json::to_string_pretty(&view).map_err(|e| e.to_string())?
        );
    }
    Ok(())
}

#[cfg(feature = "tauri-app")]
pub fn run_tauri() {
    tauri::Builder::default()
        .setup(|app| {
            let state = build_state().map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;
            let bridge = runtime::start_with_sink(&state, runtime::TauriSink::new(app.handle()));
            app.manage(bridge);
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::session_info_cmd,
            commands::sign_in_cmd,
            commands::sign_up_cmd,
            commands::sign_out_cmd,
            commands::profile_cmd,
            commands::list_services_cmd,
            commands::appointments_view_cmd,
            commands::appointment_details_cmd,
            commands::schedule_form_cmd,
            commands::schedule_appointment_cmd,
            commands::my_vehicles_cmd,
            commands::list_brands_cmd,
            commands::list_models_cmd,
            commands::register_vehicle_cmd,
            commands::nearby_workshops_cmd,
            commands::client_info_cmd,
            commands::update_client_info_cmd,
            commands::list_clients_cmd,
            commands::create_client_cmd
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

/// Runs the main flows against the in-process backend and prints what each
/// screen would show.
pub fn run_demo() -> Result<(), String> {
    let backend = Arc::new(MemoryBackend::new());
    seed_demo_data(&backend)?;
    let state = AppState::new(AuthContext::new(backend, Arc::new(NoopSessionStore)));
    let _session = runtime::start(&state);

    commands::sign_up(
        &state,
        "demo@autospot.mx".into(),
        "demo1234".into(),
        "Ana Lopez".into(),
    )?;

    let brand = commands::list_brands(&state)?
        .into_iter()
        .next()
        .ok_or("no brands seeded")?;
    let model = commands::list_models(&state, brand.id.clone())?
        .into_iter()
        .next()
        .ok_or("no models seeded")?;
    let vehicle = commands::register_vehicle(&state, brand.id, model.id)?;

    let form = commands::schedule_form(&state)?;
    let booked = commands::schedule_appointment(
        &state,
        vehicle.id,
        form.selected_service_id,
        (chrono::Utc::now() + chrono::Duration::days(2)).to_rfc3339(),
        "Ruido al frenar".into(),
    )?;

    let view = commands::appointments_view(&state, None)?;
    println!(
        "appointments:\n{}",
        serde_json::to_string_pretty(&view).map_err(|e| e.to_string())?
    );

    let details = commands::appointment_details(&state, booked.id)?;
    println!(
        "details:\n{}",
        serde_json::to_string_pretty(&details).map_err(|e| e.to_string())?
    );

    let nearby = commands::nearby_workshops(&state, 19.4326, -99.1332)?;
    println!(
        "workshops:\n{}",
        serde_json::to_string_pretty(&nearby).map_err(|e| e.to_string())?
    );

    Ok(())
}

pub fn seed_demo_data(backend: &MemoryBackend) -> Result<(), String> {
    backend.seed(
        "vehicle_brands",
        vec![
            json!({"id": "brand-toyota", "name": "Toyota"}),
            json!({"id": "brand-nissan", "name": "Nissan"}),
            json!({"id": "brand-vw", "name": "Volkswagen"}),
        ],
    )?;
    backend.seed(
        "vehicle_models",
        vec![
            json!({"id": "model-corolla", "brand_id": "brand-toyota", "name": "Corolla"}),
            json!({"id": "model-hilux", "brand_id": "brand-toyota", "name": "Hilux"}),
            json!({"id": "model-versa", "brand_id": "brand-nissan", "name": "Versa"}),
            json!({"id": "model-jetta", "brand_id": "brand-vw", "name": "Jetta"}),
        ],
    )?;
    backend.seed(
        "service_catalog",
        vec![
            json!({"id": "svc-oil", "name": "Cambio de aceite", "description": "Aceite sintético y filtro", "estimated_price": 950.0, "active": true}),
            json!({"id": "svc-brakes", "name": "Frenos", "description": "Balatas delanteras", "estimated_price": 1800.0, "active": true}),
            json!({"id": "svc-paint", "name": "Hojalatería y pintura", "estimated_price": 6500.0, "active": false}),
        ],
    )?;
    backend.seed(
        "workshops_with_coords",
        vec![
            json!({"id": "ws-centro", "name": "Taller Centro", "address": "Av. 5 de Mayo 10, CDMX", "latitude": 19.4342, "longitude": -99.1386, "rating": 4.7, "total_reviews": 128}),
            json!({"id": "ws-coyoacan", "name": "Servicio Coyoacán", "address": "Av. Universidad 1500, CDMX", "latitude": 19.36, "longitude": -99.18, "rating": 4.4, "total_reviews": 57}),
            json!({"id": "ws-cuernavaca", "name": "Autofix Cuernavaca", "latitude": 18.9242, "longitude": -99.2216}),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_flow_runs_end_to_end() {
        run_demo().expect("demo");
    }

    #[test]
    fn seeded_catalog_is_readable() {
        let backend = Arc::new(MemoryBackend::new());
        seed_demo_data(&backend).expect("seed");
        let state = AppState::new(AuthContext::new(backend, Arc::new(NoopSessionStore)));

        let brands: Vec<String> = commands::list_brands(&state)
            .expect("brands")
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(brands, vec!["Nissan", "Toyota", "Volkswagen"]);
        assert_eq!(commands::list_services(&state).expect("services").len(), 3);
    }
}
