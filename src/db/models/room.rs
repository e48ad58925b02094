//! Room models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: String,
    /// Display label, e.g. the door number ("101")
    pub name: String,
    pub room_type: String,
    pub description: Option<String>,
    /// Price per night
    pub base_price: f64,
    pub max_guests: i64,
    /// Tax rate override in percent; NULL falls back to the platform default
    pub tax_rate: Option<f64>,
    pub is_active: i64,
    pub is_available: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Response DTO for Room with SQLite integer flags mapped to booleans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomResponse {
    pub id: String,
    pub name: String,
    pub room_type: String,
    pub description: Option<String>,
    pub base_price: f64,
    pub max_guests: i64,
    pub tax_rate: Option<f64>,
    pub is_active: bool,
    pub is_available: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            id: room.id,
            name: room.name,
            room_type: room.room_type,
            description: room.description,
            base_price: room.base_price,
            max_guests: room.max_guests,
            tax_rate: room.tax_rate,
            is_active: room.is_active != 0,
            is_available: room.is_available != 0,
            created_at: room.created_at,
            updated_at: room.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub room_type: String,
    pub description: Option<String>,
    pub base_price: f64,
    #[serde(default = "default_max_guests")]
    pub max_guests: i64,
    pub tax_rate: Option<f64>,
}

fn default_max_guests() -> i64 {
    2
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoomRequest {
    pub name: Option<String>,
    pub room_type: Option<String>,
    pub description: Option<String>,
    pub base_price: Option<f64>,
    pub max_guests: Option<i64>,
    pub tax_rate: Option<f64>,
    pub is_active: Option<bool>,
    pub is_available: Option<bool>,
}
