//! Room browsing (public) and room CRUD (admin).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_base_price, validate_max_guests, validate_room_name, validate_room_type,
    validate_tax_rate,
};
use crate::db::{CreateRoomRequest, Room, RoomResponse, UpdateRoomRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RoomFilters {
    pub room_type: Option<String>,
    pub guests: Option<i64>,
}

/// List bookable rooms, cheapest first
///
/// GET /api/rooms
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<RoomFilters>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let rooms: Vec<Room> = sqlx::query_as(
        "SELECT * FROM rooms WHERE is_active = 1 AND is_available = 1 \
         ORDER BY base_price ASC, id ASC",
    )
    .fetch_all(&state.db)
    .await?;

    let rooms = rooms
        .into_iter()
        .filter(|room| {
            filters
                .room_type
                .as_deref()
                .map_or(true, |t| room.room_type.eq_ignore_ascii_case(t))
        })
        .filter(|room| filters.guests.map_or(true, |g| room.max_guests >= g))
        .map(RoomResponse::from)
        .collect();

    Ok(Json(rooms))
}

/// List every room, including inactive and blocked ones
///
/// GET /api/admin/rooms
pub async fn admin_list_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let rooms: Vec<Room> = sqlx::query_as("SELECT * FROM rooms ORDER BY name ASC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rooms.into_iter().map(RoomResponse::from).collect()))
}

fn validate_create_request(req: &CreateRoomRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_room_name(&req.name) {
        errors.add("name", &e);
    }
    if let Err(e) = validate_room_type(&req.room_type) {
        errors.add("room_type", &e);
    }
    if let Err(e) = validate_base_price(req.base_price) {
        errors.add("base_price", &e);
    }
    if let Err(e) = validate_max_guests(req.max_guests) {
        errors.add("max_guests", &e);
    }
    if let Err(e) = validate_tax_rate(&req.tax_rate) {
        errors.add("tax_rate", &e);
    }

    errors.finish()
}

/// Create a room
///
/// POST /api/admin/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    validate_create_request(&req)?;

    let now = chrono::Utc::now().to_rfc3339();
    let room = Room {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        room_type: req.room_type.clone(),
        description: req.description.clone(),
        base_price: req.base_price,
        max_guests: req.max_guests,
        tax_rate: req.tax_rate,
        is_active: 1,
        is_available: 1,
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO rooms (id, name, room_type, description, base_price, max_guests, tax_rate, \
         is_active, is_available, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&room.id)
    .bind(&room.name)
    .bind(&room.room_type)
    .bind(&room.description)
    .bind(room.base_price)
    .bind(room.max_guests)
    .bind(room.tax_rate)
    .bind(room.is_active)
    .bind(room.is_available)
    .bind(&room.created_at)
    .bind(&room.updated_at)
    .execute(&state.db)
    .await?;

    tracing::info!(room_id = %room.id, "Room created: {} ({})", room.name, room.room_type);

    Ok((StatusCode::CREATED, Json(RoomResponse::from(room))))
}

/// Get a single room
///
/// GET /api/admin/rooms/:id
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RoomResponse>, ApiError> {
    let room: Option<Room> = sqlx::query_as("SELECT * FROM rooms WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    match room {
        Some(room) => Ok(Json(RoomResponse::from(room))),
        None => Err(ApiError::not_found("Room not found")),
    }
}

/// Update a room's details or flags
///
/// PUT /api/admin/rooms/:id
pub async fn update_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoomRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    let room: Option<Room> = sqlx::query_as("SELECT * FROM rooms WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let mut room = room.ok_or_else(|| ApiError::not_found("Room not found"))?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        if let Err(e) = validate_room_name(name) {
            errors.add("name", &e);
        }
    }
    if let Some(room_type) = &req.room_type {
        if let Err(e) = validate_room_type(room_type) {
            errors.add("room_type", &e);
        }
    }
    if let Some(base_price) = req.base_price {
        if let Err(e) = validate_base_price(base_price) {
            errors.add("base_price", &e);
        }
    }
    if let Some(max_guests) = req.max_guests {
        if let Err(e) = validate_max_guests(max_guests) {
            errors.add("max_guests", &e);
        }
    }
    if let Err(e) = validate_tax_rate(&req.tax_rate) {
        errors.add("tax_rate", &e);
    }
    errors.finish()?;

    if let Some(name) = req.name {
        room.name = name.trim().to_string();
    }
    if let Some(room_type) = req.room_type {
        room.room_type = room_type;
    }
    if req.description.is_some() {
        room.description = req.description;
    }
    if let Some(base_price) = req.base_price {
        room.base_price = base_price;
    }
    if let Some(max_guests) = req.max_guests {
        room.max_guests = max_guests;
    }
    if req.tax_rate.is_some() {
        room.tax_rate = req.tax_rate;
    }
    if let Some(is_active) = req.is_active {
        room.is_active = is_active as i64;
    }
    if let Some(is_available) = req.is_available {
        room.is_available = is_available as i64;
    }
    room.updated_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE rooms SET name = ?, room_type = ?, description = ?, base_price = ?, \
         max_guests = ?, tax_rate = ?, is_active = ?, is_available = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&room.name)
    .bind(&room.room_type)
    .bind(&room.description)
    .bind(room.base_price)
    .bind(room.max_guests)
    .bind(room.tax_rate)
    .bind(room.is_active)
    .bind(room.is_available)
    .bind(&room.updated_at)
    .bind(&room.id)
    .execute(&state.db)
    .await?;

    Ok(Json(RoomResponse::from(room)))
}

/// Delete a room. Refused while reservations in an inventory-blocking
/// status still reference it; deactivate instead to stop new bookings.
///
/// DELETE /api/admin/rooms/:id
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let active: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM reservations WHERE room_id = ? \
         AND status IN ('pending', 'awaiting_verification', 'confirmed')",
    )
    .bind(&id)
    .fetch_one(&state.db)
    .await?;

    if active.0 > 0 {
        return Err(ApiError::conflict(
            "Room has active reservations; mark it unavailable instead",
        ));
    }

    let result = sqlx::query("DELETE FROM rooms WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Room not found"));
    }

    tracing::info!(room_id = %id, "Room deleted");
    Ok(StatusCode::NO_CONTENT)
}
