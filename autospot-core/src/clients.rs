use crate::auth::AuthContext;
use crate::error::{Error, Result};
use crate::models::{Client, ClientContactUpdate, NewClient, User};
use crate::query::{Direction, Query};
use chrono::Utc;
use tracing::info;

const DEFAULT_FIRST_NAME: &str = "Usuario";
const DEFAULT_LAST_NAME: &str = "App";

/// First and second whitespace-separated tokens of a display name, with
/// defaults for whatever is missing. Tokens past the second are ignored.
pub fn split_display_name(full_name: Option<&str>) -> (String, String) {
    let mut tokens = full_name.unwrap_or_default().split_whitespace();
    let first = tokens.next().unwrap_or(DEFAULT_FIRST_NAME).to_string();
    let last = tokens.next().unwrap_or(DEFAULT_LAST_NAME).to_string();
    (first, last)
}

/// The client row whose email matches. Two or more matches are an error.
pub fn find_by_email(ctx: &AuthContext, email: &str) -> Result<Option<Client>> {
    let query = Query::from("clients").eq("email", email).limit(2);
    let mut rows: Vec<Client> = ctx.select(&query)?;
    if rows.len() > 1 {
        return Err(Error::AmbiguousClient {
            email: email.to_string(),
        });
    }
    Ok(rows.pop())
}

fn user_email(user: &User) -> Option<&str> {
    user.email.as_deref().filter(|e| !e.is_empty())
}

/// The signed-in user's client row; `None` when signed out or when no row
/// carries the user's email.
pub fn current_client(ctx: &AuthContext) -> Result<Option<Client>> {
    let Some(user) = ctx.user() else {
        return Ok(None);
    };
    let Some(email) = user_email(&user) else {
        return Ok(None);
    };
    find_by_email(ctx, email)
}

/// Like [`current_client`] but fails when there is no row.
pub fn require_client(ctx: &AuthContext) -> Result<Client> {
    ctx.require_user()?;
    current_client(ctx)?.ok_or(Error::ClientNotFound)
}

/// Resolves the signed-in user's client row, creating it from the display
/// name when it does not exist yet.
pub fn ensure_client(ctx: &AuthContext) -> Result<Client> {
    let user = ctx.require_user()?;
    let email = user_email(&user).ok_or(Error::NotAuthenticated)?;

    if let Some(client) = find_by_email(ctx, email)? {
        return Ok(client);
    }

    let (first_name, last_name) = split_display_name(user.user_metadata.full_name.as_deref());
    let client: Client = ctx.insert_one(
        "clients",
        &NewClient {
            first_name,
            last_name,
            email: Some(email.to_string()),
            ..NewClient::default()
        },
    )?;
    info!(client = %client.id, "created client record");
    Ok(client)
}

/// Updates phone and address on the row matching the user's email.
pub fn update_contact(ctx: &AuthContext, phone: &str, address: &str) -> Result<Client> {
    let user = ctx.require_user()?;
    let email = user_email(&user).ok_or(Error::NotAuthenticated)?;

    let patch = ClientContactUpdate {
        phone: phone.trim().to_string(),
        address: address.trim().to_string(),
        updated_at: Utc::now(),
    };
    let mut rows: Vec<Client> = ctx.update(&Query::from("clients").eq("email", email), &patch)?;
    if rows.is_empty() {
        return Err(Error::ClientNotFound);
    }
    Ok(rows.swap_remove(0))
}

/// Every client, newest first.
pub fn list_clients(ctx: &AuthContext) -> Result<Vec<Client>> {
    ctx.select(&Query::from("clients").order("created_at", Direction::Descending))
}

pub fn create_client(ctx: &AuthContext, client: NewClient) -> Result<Client> {
    if client.first_name.trim().is_empty() || client.last_name.trim().is_empty() {
        return Err(Error::validation("first and last name are required"));
    }
    let client = NewClient {
        first_name: client.first_name.trim().to_string(),
        last_name: client.last_name.trim().to_string(),
        email: non_empty(client.email),
        phone: non_empty(client.phone),
        address: non_empty(client.address),
    };
    ctx.insert_one("clients", &client)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
