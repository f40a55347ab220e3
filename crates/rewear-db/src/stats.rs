use anyhow::Result;
use chrono::{Duration, SecondsFormat, Utc};
use rewear_types::api::{
    AnalyticsResponse, DashboardStats, EcoImpactAnalytics, ItemAnalytics, MonthlyCount, PlatformStats,
    SwapAnalytics, Trends, UserAnalytics, UserStatsResponse, round2,
};
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::Database;
use crate::users::query_user;

/// Window for active-user counts.
const ACTIVE_WINDOW_DAYS: i64 = 7;
/// Window for the monthly trend series.
const TREND_WINDOW_DAYS: i64 = 180;

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |r| r.get(0))?)
}

fn cutoff(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Rows created per calendar month since `since`, oldest month first.
fn monthly(conn: &Connection, table: &str, since: &str) -> Result<Vec<MonthlyCount>> {
    let sql = format!(
        "SELECT CAST(strftime('%Y', created_at) AS INTEGER) AS y, \
         CAST(strftime('%m', created_at) AS INTEGER) AS m, COUNT(*) \
         FROM {} WHERE created_at >= ?1 GROUP BY y, m ORDER BY y, m",
        table
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([since], |row| {
            Ok(MonthlyCount {
                year: row.get(0)?,
                month: row.get(1)?,
                count: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database {
    /// Public headline numbers for the landing page.
    pub fn platform_stats(&self) -> Result<PlatformStats> {
        self.with_conn(|conn| {
            let total_users = count(conn, "SELECT COUNT(*) FROM users")?;
            let total_items = count(
                conn,
                "SELECT COUNT(*) FROM items WHERE status = 'Available' AND is_approved = 1",
            )?;
            let total_swaps = count(conn, "SELECT COUNT(*) FROM swaps WHERE status = 'Completed'")?;
            let total_eco_impact: f64 =
                conn.query_row("SELECT IFNULL(SUM(eco_impact), 0) FROM users", [], |r| r.get(0))?;

            let average = if total_users > 0 {
                total_eco_impact / total_users as f64
            } else {
                0.0
            };

            Ok(PlatformStats {
                total_users,
                total_items,
                total_swaps,
                total_eco_impact: round2(total_eco_impact),
                average_eco_impact: round2(average),
            })
        })
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        self.with_conn(|conn| {
            let (total_eco_impact, average_eco_impact): (f64, f64) = conn.query_row(
                "SELECT IFNULL(SUM(eco_impact), 0), IFNULL(AVG(eco_impact), 0) FROM users",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;

            Ok(DashboardStats {
                total_users: count(conn, "SELECT COUNT(*) FROM users")?,
                total_items: count(conn, "SELECT COUNT(*) FROM items")?,
                pending_items: count(
                    conn,
                    "SELECT COUNT(*) FROM items WHERE status = 'Pending' AND is_approved = 0",
                )?,
                total_swaps: count(conn, "SELECT COUNT(*) FROM swaps")?,
                completed_swaps: count(conn, "SELECT COUNT(*) FROM swaps WHERE status = 'Completed'")?,
                total_eco_impact: round2(total_eco_impact),
                average_eco_impact: round2(average_eco_impact),
            })
        })
    }

    pub fn analytics(&self) -> Result<AnalyticsResponse> {
        self.with_conn(|conn| {
            let users = UserAnalytics {
                total: count(conn, "SELECT COUNT(*) FROM users")?,
                verified: count(conn, "SELECT COUNT(*) FROM users WHERE is_verified = 1")?,
                active: conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE last_active >= ?1",
                    [cutoff(ACTIVE_WINDOW_DAYS)],
                    |r| r.get(0),
                )?,
            };

            let items = ItemAnalytics {
                total: count(conn, "SELECT COUNT(*) FROM items")?,
                available: count(conn, "SELECT COUNT(*) FROM items WHERE status = 'Available'")?,
                pending: count(conn, "SELECT COUNT(*) FROM items WHERE status = 'Pending'")?,
                swapped: count(conn, "SELECT COUNT(*) FROM items WHERE status = 'Swapped'")?,
            };

            let swaps = SwapAnalytics {
                total: count(conn, "SELECT COUNT(*) FROM swaps")?,
                pending: count(conn, "SELECT COUNT(*) FROM swaps WHERE status = 'Pending'")?,
                completed: count(conn, "SELECT COUNT(*) FROM swaps WHERE status = 'Completed'")?,
                direct: count(conn, "SELECT COUNT(*) FROM swaps WHERE swap_type = 'Direct Swap'")?,
                points: count(conn, "SELECT COUNT(*) FROM swaps WHERE swap_type = 'Points Redemption'")?,
            };

            let eco_impact = conn.query_row(
                "SELECT IFNULL(SUM(eco_impact), 0), IFNULL(AVG(eco_impact), 0), IFNULL(MAX(eco_impact), 0) \
                 FROM users",
                [],
                |r| {
                    Ok(EcoImpactAnalytics {
                        total: round2(r.get(0)?),
                        average: round2(r.get(1)?),
                        max: round2(r.get(2)?),
                    })
                },
            )?;

            let since = cutoff(TREND_WINDOW_DAYS);
            let trends = Trends {
                monthly_users: monthly(conn, "users", &since)?,
                monthly_items: monthly(conn, "items", &since)?,
                monthly_swaps: monthly(conn, "swaps", &since)?,
            };

            Ok(AnalyticsResponse {
                users,
                items,
                swaps,
                eco_impact,
                trends,
            })
        })
    }

    /// The user's stored stats plus live listing and swap counts.
    pub fn user_stats(&self, user_id: Uuid) -> Result<Option<UserStatsResponse>> {
        self.with_conn(|conn| {
            let Some(user) = query_user(conn, user_id)? else {
                return Ok(None);
            };
            let id = user_id.to_string();

            let (total_items, available_items, pending_items): (i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*), \
                 IFNULL(SUM(status = 'Available' AND is_approved = 1), 0), \
                 IFNULL(SUM(status = 'Pending'), 0) \
                 FROM items WHERE owner_id = ?1",
                [&id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )?;

            let (swap_count, pending_swaps): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), IFNULL(SUM(status = 'Pending'), 0) FROM swaps \
                 WHERE initiator_id = ?1 OR recipient_id = ?1",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;

            Ok(Some(UserStatsResponse {
                stats: user.stats,
                total_items,
                available_items,
                pending_items,
                swap_count,
                pending_swaps,
                points: user.points,
                badges: user.badges,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use chrono::Datelike;
    use rewear_types::models::Role;

    #[test]
    fn empty_platform() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.platform_stats().unwrap();
        assert_eq!(stats.total_users, 0);
        assert_eq!(stats.average_eco_impact, 0.0);
        assert!(db.analytics().unwrap().trends.monthly_users.is_empty());
    }

    #[test]
    fn counts_follow_listings() {
        let db = Database::open_in_memory().unwrap();
        let ada = testutil::user(&db, "Ada");
        let admin = testutil::user_with_role(&db, "Root", Role::Admin);
        testutil::live_item(&db, ada.id, admin.id, "jacket", 5);
        db.create_item(&testutil::new_item(ada.id, "scarf", 5)).unwrap();

        let platform = db.platform_stats().unwrap();
        assert_eq!(platform.total_users, 2);
        assert_eq!(platform.total_items, 1);

        let dashboard = db.dashboard_stats().unwrap();
        assert_eq!(dashboard.total_items, 2);
        assert_eq!(dashboard.pending_items, 1);

        let stats = db.user_stats(ada.id).unwrap().unwrap();
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.available_items, 1);
        assert_eq!(stats.pending_items, 1);
        assert_eq!(stats.swap_count, 0);
        assert_eq!(stats.points, 10);
        assert!(db.user_stats(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn analytics_groups_by_month() {
        let db = Database::open_in_memory().unwrap();
        testutil::user(&db, "Ada");
        testutil::user(&db, "Grace");

        let analytics = db.analytics().unwrap();
        assert_eq!(analytics.users.total, 2);
        assert_eq!(analytics.users.active, 2);

        let now = Utc::now();
        assert_eq!(
            analytics.trends.monthly_users,
            vec![MonthlyCount {
                year: now.year(),
                month: now.month(),
                count: 2,
            }]
        );
    }
}
