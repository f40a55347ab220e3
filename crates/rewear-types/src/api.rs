use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Badge, Category, Condition, Item, ItemImage, ItemStatus, Location, Preferences, PublicUser,
    Role, Size, Swap, SwapPreference, SwapStatus, SwapType, User, UserStats,
};

// -- JWT Claims --

/// JWT claims issued at signup/login and checked by the auth middleware and
/// the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_users: i64,
    pub total_items: i64,
    pub total_swaps: i64,
    pub total_eco_impact: f64,
    pub average_eco_impact: f64,
}

// -- Pagination --

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total_items: i64) -> Self {
        let limit = limit.max(1) as i64;
        let total_pages = ((total_items + limit - 1) / limit) as u32;
        Self {
            current_page: page,
            total_pages,
            total_items,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

// -- Items --

#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<Category>,
    pub size: Option<Size>,
    pub condition: Option<Condition>,
    pub min_points: Option<i64>,
    pub max_points: Option<i64>,
    pub search: Option<String>,
    /// Comma separated; an item matches when it carries any of them.
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemStatusQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<ItemStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateItemRequest {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub size: Size,
    pub condition: Condition,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub points_required: i64,
    pub swap_preference: Option<SwapPreference>,
    pub images: Vec<ItemImage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub size: Option<Size>,
    pub condition: Option<Condition>,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub tags: Option<Vec<String>>,
    pub points_required: Option<i64>,
    pub swap_preference: Option<SwapPreference>,
    pub images: Option<Vec<ItemImage>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes: i64,
}

// -- Swaps --

#[derive(Debug, Deserialize)]
pub struct SwapListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<SwapStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSwapRequest {
    pub requested_item_id: Uuid,
    pub offered_item_id: Option<Uuid>,
    pub points_offered: Option<i64>,
    pub swap_type: SwapType,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondSwapRequest {
    pub response_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelSwapRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendChatMessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateSwapRequest {
    pub rating: u8,
    pub comment: Option<String>,
}

// -- Users --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub preferences: Option<Preferences>,
    pub location: Option<Location>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddPointsRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PointsResponse {
    pub amount: i64,
    pub balance: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublicProfileResponse {
    pub user: PublicUser,
    pub public_items: Vec<Item>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserStatsResponse {
    pub stats: UserStats,
    pub total_items: i64,
    pub available_items: i64,
    pub pending_items: i64,
    pub swap_count: i64,
    pub pending_swaps: i64,
    pub points: i64,
    pub badges: Vec<Badge>,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub unread_only: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedCountResponse {
    pub updated: usize,
}

// -- Admin --

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RejectItemRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_items: i64,
    pub pending_items: i64,
    pub total_swaps: i64,
    pub completed_swaps: i64,
    pub total_eco_impact: f64,
    pub average_eco_impact: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentActivity {
    pub users: Vec<AdminUserSummary>,
    pub items: Vec<Item>,
    pub swaps: Vec<Swap>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub recent: RecentActivity,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserAnalytics {
    pub total: i64,
    pub verified: i64,
    /// Active within the last 7 days.
    pub active: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ItemAnalytics {
    pub total: i64,
    pub available: i64,
    pub pending: i64,
    pub swapped: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SwapAnalytics {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    pub direct: i64,
    pub points: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EcoImpactAnalytics {
    pub total: f64,
    pub average: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCount {
    pub year: i32,
    pub month: u32,
    pub count: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Trends {
    pub monthly_users: Vec<MonthlyCount>,
    pub monthly_items: Vec<MonthlyCount>,
    pub monthly_swaps: Vec<MonthlyCount>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    pub users: UserAnalytics,
    pub items: ItemAnalytics,
    pub swaps: SwapAnalytics,
    pub eco_impact: EcoImpactAnalytics,
    pub trends: Trends,
}

/// Rounds to two decimals for eco-impact figures.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_math() {
        let p = Pagination::new(1, 12, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let last = Pagination::new(3, 12, 25);
        assert!(!last.has_next);
        assert!(last.has_prev);

        let empty = Pagination::new(1, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(7.499), 7.5);
        assert_eq!(round2(2.0 / 3.0), 0.67);
    }
}
