use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::db::Store;

/// Clears the active flag of every user whose last login is at least
/// `inactive_days` before `now`. Users that never logged in are kept.
///
/// Returns the number of users deactivated by this run.
pub async fn deactivate_inactive_users(
    store: &Store,
    now: DateTime<Utc>,
    inactive_days: i64,
) -> Result<u64> {
    let cutoff = now - Duration::days(inactive_days);
    let deactivated = store.deactivate_users_last_seen_before(cutoff).await?;

    metrics::counter!("users_deactivated_total").increment(deactivated);
    info!(
        deactivated,
        cutoff = %cutoff,
        inactive_days,
        "Stale users deactivated"
    );

    Ok(deactivated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::db::NewUser;

    async fn store_with_logins(days_ago: &[i64]) -> (Store, Vec<i32>) {
        let path = std::env::temp_dir().join(format!("lms-maint-{}.db", uuid::Uuid::new_v4()));
        let store = Store::new(&format!("sqlite:{}", path.display()))
            .await
            .unwrap();
        let security = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        };

        let now = Utc::now();
        let mut ids = Vec::new();
        for (i, days) in days_ago.iter().enumerate() {
            let user = store
                .create_user(
                    NewUser {
                        email: format!("user{i}@example.com"),
                        password: "password123".to_string(),
                        first_name: "U".to_string(),
                        last_name: "Ser".to_string(),
                        phone: None,
                        city: None,
                    },
                    &security,
                )
                .await
                .unwrap();
            store
                .record_login(user.id, now - Duration::days(*days))
                .await
                .unwrap();
            ids.push(user.id);
        }
        (store, ids)
    }

    #[tokio::test]
    async fn test_deactivates_only_stale_users() {
        let (store, ids) = store_with_logins(&[31, 29]).await;

        let count = deactivate_inactive_users(&store, Utc::now(), 30)
            .await
            .unwrap();
        assert_eq!(count, 1);

        assert!(!store.get_user(ids[0]).await.unwrap().unwrap().is_active);
        assert!(store.get_user(ids[1]).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let (store, _) = store_with_logins(&[40, 45]).await;
        let now = Utc::now();

        assert_eq!(deactivate_inactive_users(&store, now, 30).await.unwrap(), 2);
        assert_eq!(deactivate_inactive_users(&store, now, 30).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_threshold_is_configurable() {
        let (store, _) = store_with_logins(&[8]).await;

        assert_eq!(
            deactivate_inactive_users(&store, Utc::now(), 30).await.unwrap(),
            0
        );
        assert_eq!(
            deactivate_inactive_users(&store, Utc::now(), 7).await.unwrap(),
            1
        );
    }
}
