use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that compacts the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}

/// Background task that sweeps expired bookings on a fixed period, on top of
/// the lazy sweep before every booking listing.
pub async fn run_sweeper(engine: Arc<Engine>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let today = chrono::Local::now().date_naive();
        let report = engine.sweep_expired(today).await;
        debug!(?report, "periodic sweep done");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BookingRequest, EngineSettings};
    use crate::model::*;
    use crate::notify::NotifyHub;
    use chrono::Days;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("roomslot_test_reaper");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn sweeper_collects_past_bookings() {
        let path = test_wal_path("sweeper_collect.wal");
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(path, notify, EngineSettings::default()).unwrap());

        engine
            .create_room("Lab1", RoomKind::Lab, 35, None)
            .await
            .unwrap();
        engine
            .add_faculty("Ms. Leena Sahu (LS)", Role::Teacher)
            .await
            .unwrap();
        let teacher = engine
            .register_user("Ms. Leena Sahu (LS)", "leena@dept.edu")
            .await
            .unwrap();

        let tomorrow = chrono::Local::now().date_naive() + Days::new(1);
        let booking = engine
            .request_booking(
                teacher.teacher_ref(),
                BookingRequest {
                    room: "Lab1".into(),
                    date: tomorrow,
                    day: Day::of(tomorrow),
                    time_slot: "10:00-10:30".into(),
                    purpose: "Makeup Lecture".into(),
                },
            )
            .await
            .unwrap();

        assert!(engine.collect_expired_bookings(tomorrow).await.is_empty());
        let later = tomorrow + Days::new(1);
        let expired = engine.collect_expired_bookings(later).await;
        assert_eq!(expired, vec![(booking.id, "Lab1".to_string())]);

        engine.sweep_expired(later).await;
        assert!(engine.collect_expired_bookings(later).await.is_empty());
    }

    #[tokio::test]
    async fn compactor_resets_append_counter() {
        let path = test_wal_path("compactor_threshold.wal");
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(path, notify, EngineSettings::default()).unwrap());
        for name in ["64", "65", "66"] {
            engine
                .create_room(name, RoomKind::Classroom, 70, None)
                .await
                .unwrap();
        }
        assert_eq!(engine.wal_appends_since_compact().await, 3);

        let task = tokio::spawn(run_compactor(engine.clone(), 2));
        // The first interval tick fires immediately.
        for _ in 0..50 {
            if engine.wal_appends_since_compact().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert_eq!(engine.wal_appends_since_compact().await, 0);
        assert_eq!(engine.list_rooms().await.len(), 3);
    }
}
