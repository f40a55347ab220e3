use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr, VariantArray};
use uuid::Uuid;

/// Raised when a stored or submitted string is not a known enum value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
    #[source]
    pub source: strum::ParseError,
}

/// Parses one of the string-valued enums below, naming the enum on failure.
pub fn parse_variant<T>(value: &str) -> Result<T, UnknownVariant>
where
    T: FromStr<Err = strum::ParseError>,
{
    value.parse().map_err(|source| UnknownVariant {
        kind: std::any::type_name::<T>().rsplit("::").next().unwrap_or("enum"),
        value: value.to_string(),
        source,
    })
}

/// Wire and storage text of a string-valued enum. Serde, strum and the
/// database all agree on it.
pub trait EnumText: Copy + Into<&'static str> {
    fn as_str(self) -> &'static str {
        self.into()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
pub enum Category {
    Tops,
    Bottoms,
    Dresses,
    Outerwear,
    Shoes,
    Accessories,
    Sportswear,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
pub enum Size {
    #[serde(rename = "XS")]
    #[strum(serialize = "XS")]
    Xs,
    S,
    M,
    L,
    #[serde(rename = "XL")]
    #[strum(serialize = "XL")]
    Xl,
    #[serde(rename = "XXL")]
    #[strum(serialize = "XXL")]
    Xxl,
    #[serde(rename = "One Size")]
    #[strum(serialize = "One Size")]
    OneSize,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
pub enum Condition {
    New,
    #[serde(rename = "Like New")]
    #[strum(serialize = "Like New")]
    LikeNew,
    Good,
    Fair,
    Poor,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
pub enum ItemStatus {
    Available,
    Pending,
    Swapped,
    Removed,
}

/// How a single swap is settled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
pub enum SwapType {
    #[serde(rename = "Direct Swap")]
    #[strum(serialize = "Direct Swap")]
    DirectSwap,
    #[serde(rename = "Points Redemption")]
    #[strum(serialize = "Points Redemption")]
    PointsRedemption,
}

/// Which kinds of swap an item owner is willing to take.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
pub enum SwapPreference {
    #[serde(rename = "Direct Swap")]
    #[strum(serialize = "Direct Swap")]
    DirectSwap,
    #[serde(rename = "Points Redemption")]
    #[strum(serialize = "Points Redemption")]
    PointsRedemption,
    Both,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
pub enum Badge {
    #[serde(rename = "Eco Hero")]
    #[strum(serialize = "Eco Hero")]
    EcoHero,
    #[serde(rename = "Frequent Swapper")]
    #[strum(serialize = "Frequent Swapper")]
    FrequentSwapper,
    #[serde(rename = "First Swap")]
    #[strum(serialize = "First Swap")]
    FirstSwap,
    #[serde(rename = "Top Contributor")]
    #[strum(serialize = "Top Contributor")]
    TopContributor,
    #[serde(rename = "Community Leader")]
    #[strum(serialize = "Community Leader")]
    CommunityLeader,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    SwapRequest,
    SwapAccepted,
    SwapRejected,
    SwapCompleted,
    ItemApproved,
    ItemRejected,
    NewMessage,
    PointsEarned,
    BadgeEarned,
    SystemAnnouncement,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, EnumString, IntoStaticStr, VariantArray,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl EnumText for Category {}
impl EnumText for Size {}
impl EnumText for Condition {}
impl EnumText for ItemStatus {}
impl EnumText for SwapType {}
impl EnumText for SwapPreference {}
impl EnumText for SwapStatus {}
impl EnumText for Role {}
impl EnumText for Badge {}
impl EnumText for NotificationKind {}
impl EnumText for Priority {}

impl SwapPreference {
    pub fn allows(&self, swap_type: SwapType) -> bool {
        match self {
            SwapPreference::Both => true,
            SwapPreference::DirectSwap => swap_type == SwapType::DirectSwap,
            SwapPreference::PointsRedemption => swap_type == SwapType::PointsRedemption,
        }
    }
}

impl SwapStatus {
    /// Rejected, Completed and Cancelled swaps never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapStatus::Rejected | SwapStatus::Completed | SwapStatus::Cancelled
        )
    }

    /// Pending → {Accepted, Rejected, Cancelled}; Accepted → {Completed, Cancelled}.
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        matches!(
            (self, next),
            (SwapStatus::Pending, SwapStatus::Accepted)
                | (SwapStatus::Pending, SwapStatus::Rejected)
                | (SwapStatus::Pending, SwapStatus::Cancelled)
                | (SwapStatus::Accepted, SwapStatus::Completed)
                | (SwapStatus::Accepted, SwapStatus::Cancelled)
        )
    }
}

impl NotificationKind {
    pub fn priority(&self) -> Priority {
        match self {
            NotificationKind::SwapRequest | NotificationKind::SwapAccepted => Priority::High,
            NotificationKind::ItemApproved
            | NotificationKind::ItemRejected
            | NotificationKind::NewMessage => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

// -- Ledger constants --

/// Points every new account starts with.
pub const STARTING_POINTS: i64 = 10;

/// CO2 kg credited to each participant when a swap is accepted.
pub const ECO_IMPACT_PER_PARTICIPANT: f64 = 2.5;

/// CO2 kg recorded on a swap once it completes.
pub const ECO_IMPACT_PER_SWAP: f64 = 5.0;

/// Default CO2 estimate attached to a new listing.
pub const ITEM_ECO_IMPACT: f64 = 2.5;

impl Badge {
    /// Every badge the given stats qualify for.
    pub fn earned(stats: &UserStats) -> Vec<Badge> {
        let mut badges = Vec::new();
        if stats.total_swaps >= 1 {
            badges.push(Badge::FirstSwap);
        }
        if stats.total_swaps >= 10 {
            badges.push(Badge::FrequentSwapper);
        }
        if stats.eco_impact >= 25.0 {
            badges.push(Badge::EcoHero);
        }
        if stats.items_listed >= 20 {
            badges.push(Badge::TopContributor);
        }
        if stats.total_swaps >= 50 {
            badges.push(Badge::CommunityLeader);
        }
        badges
    }
}

// -- Users --

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_swaps: i64,
    pub items_listed: i64,
    pub items_received: i64,
    pub eco_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email: bool,
    pub push: bool,
    pub swap_requests: bool,
    pub new_items: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            swap_requests: true,
            new_items: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub notifications: NotificationPreferences,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub sizes: Vec<Size>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub points: i64,
    pub role: Role,
    pub is_verified: bool,
    pub badges: Vec<Badge>,
    pub stats: UserStats,
    pub preferences: Preferences,
    pub location: Location,
    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// The slice of a user embedded in items, swaps and listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
    pub stats: UserStats,
    pub badges: Vec<Badge>,
    pub member_since: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            avatar: user.avatar,
            stats: user.stats,
            badges: user.badges,
            member_since: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
    pub eco_impact: f64,
    pub total_swaps: i64,
    pub badges: Vec<Badge>,
}

// -- Items --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemImage {
    pub url: String,
    pub public_id: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Leaves exactly one primary image: the first flagged one, or the first
/// image when none is flagged.
pub fn normalize_primary_image(images: &mut [ItemImage]) {
    let primary = images.iter().position(|img| img.is_primary).unwrap_or(0);
    for (idx, img) in images.iter_mut().enumerate() {
        img.is_primary = idx == primary;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub images: Vec<ItemImage>,
    pub category: Category,
    pub size: Size,
    pub condition: Condition,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub tags: Vec<String>,
    pub owner: UserSummary,
    pub points_required: i64,
    pub status: ItemStatus,
    pub is_approved: bool,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub views: i64,
    pub likes: i64,
    pub swap_preference: SwapPreference,
    pub eco_impact: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn primary_image(&self) -> Option<&str> {
        self.images
            .iter()
            .find(|img| img.is_primary)
            .or_else(|| self.images.first())
            .map(|img| img.url.as_str())
    }

    /// Approved and not yet taken.
    pub fn is_swappable(&self) -> bool {
        self.status == ItemStatus::Available && self.is_approved
    }

    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id,
            title: self.title.clone(),
            primary_image: self.primary_image().map(str::to_string),
            points_required: self.points_required,
            owner_id: self.owner.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: Uuid,
    pub title: String,
    pub primary_image: Option<String>,
    pub points_required: i64,
    pub owner_id: Uuid,
}

// -- Swaps --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub swap_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRating {
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwapRatings {
    pub initiator: Option<SwapRating>,
    pub recipient: Option<SwapRating>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swap {
    pub id: Uuid,
    pub initiator: UserSummary,
    pub recipient: UserSummary,
    pub requested_item: ItemSummary,
    pub offered_item: Option<ItemSummary>,
    pub points_offered: Option<i64>,
    pub swap_type: SwapType,
    pub status: SwapStatus,
    pub message: Option<String>,
    pub response_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub eco_impact: f64,
    pub ratings: SwapRatings,
    pub chat_messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Swap {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.initiator.id == user_id || self.recipient.id == user_id
    }

    /// The other side of the swap, from `user_id`'s point of view.
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if self.initiator.id == user_id {
            self.recipient.id
        } else {
            self.initiator.id
        }
    }
}

// -- Notifications --

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: NotificationData,
    pub is_read: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}
