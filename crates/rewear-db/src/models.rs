use chrono::{DateTime, NaiveDateTime, Utc};
use rewear_types::models::{
    Category, Condition, ItemImage, ItemStatus, Notification, Role, Size, Swap, SwapPreference,
    SwapType, parse_variant,
};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use uuid::Uuid;

// -- Inputs --

pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub role: Role,
}

#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub preferences: Option<rewear_types::models::Preferences>,
    pub location: Option<rewear_types::models::Location>,
}

pub struct NewItem {
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub size: Size,
    pub condition: Condition,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub tags: Vec<String>,
    pub points_required: i64,
    pub swap_preference: SwapPreference,
    pub images: Vec<ItemImage>,
}

/// Filters for item listings. Unset fields do not constrain the result.
#[derive(Debug, Default, Clone)]
pub struct ItemFilter {
    pub owner_id: Option<Uuid>,
    pub status: Option<ItemStatus>,
    pub approved: Option<bool>,
    pub category: Option<Category>,
    pub size: Option<Size>,
    pub condition: Option<Condition>,
    pub min_points: Option<i64>,
    pub max_points: Option<i64>,
    pub search: Option<String>,
    /// Matches items carrying any of these tags.
    pub tags: Vec<String>,
}

impl ItemFilter {
    /// What the public browse page shows.
    pub fn browsable() -> Self {
        Self {
            status: Some(ItemStatus::Available),
            approved: Some(true),
            ..Default::default()
        }
    }
}

pub struct NewSwap {
    pub initiator_id: Uuid,
    pub recipient_id: Uuid,
    pub requested_item_id: Uuid,
    pub offered_item_id: Option<Uuid>,
    pub points_offered: Option<i64>,
    pub swap_type: SwapType,
    pub message: Option<String>,
}

/// A swap after a state change, plus every notification the change stored.
#[derive(Debug)]
pub struct SwapOutcome {
    pub swap: Swap,
    pub notifications: Vec<Notification>,
}

// -- Column decoding --

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn get_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn get_opt_uuid(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Ok(t.with_timezone(&Utc)),
        // SQLite's own datetime('now') format
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|t| t.and_utc()),
    }
}

pub(crate) fn get_time(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_time(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn get_opt_time(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_time(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn get_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(idx)?;
    parse_variant(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn get_opt_enum<T>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_variant(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn get_json<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}
