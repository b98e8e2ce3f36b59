use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::engine::{Engine, EngineSettings};
use crate::limits::*;
use crate::model::Faculty;
use crate::notify::{self, NotifyHub};
use crate::reaper;

#[derive(Debug, Clone)]
pub struct TenantOptions {
    pub compact_threshold: u64,
    /// Periodic sweep on top of the lazy one. `None` disables it.
    pub sweep_interval: Option<Duration>,
    pub engine: EngineSettings,
    /// Directory entries added to every new department.
    pub faculty_seed: Vec<Faculty>,
}

impl Default for TenantOptions {
    fn default() -> Self {
        Self {
            compact_threshold: 1000,
            sweep_interval: None,
            engine: EngineSettings::default(),
            faculty_seed: Vec::new(),
        }
    }
}

struct Tenant {
    engine: Arc<Engine>,
    hub: Arc<NotifyHub>,
}

/// Per-department engines. The pgwire `database` startup parameter names the
/// department; each gets its own engine, WAL, notice hub and background tasks.
pub struct TenantManager {
    tenants: DashMap<String, Tenant>,
    create_lock: Mutex<()>,
    data_dir: PathBuf,
    options: TenantOptions,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, options: TenantOptions) -> Self {
        Self {
            tenants: DashMap::new(),
            create_lock: Mutex::new(()),
            data_dir,
            options,
        }
    }

    /// Get or lazily create the engine for a department.
    pub async fn get_or_create(&self, department: &str) -> io::Result<Arc<Engine>> {
        if let Some(t) = self.tenants.get(department) {
            return Ok(t.engine.clone());
        }
        if department.len() > MAX_TENANT_NAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "department name too long",
            ));
        }

        // Sanitize to prevent path traversal.
        let safe_name: String = department
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty department name",
            ));
        }

        // Two connections racing on a new department must not open the WAL twice.
        let _creating = self.create_lock.lock().await;
        if let Some(t) = self.tenants.get(department) {
            return Ok(t.engine.clone());
        }
        if self.tenants.len() >= MAX_TENANTS {
            return Err(io::Error::other("too many departments"));
        }

        let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
        let hub = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(
            wal_path,
            hub.clone(),
            self.options.engine.clone(),
        )?);

        let seeded = engine
            .seed_faculty(&self.options.faculty_seed)
            .await
            .map_err(|e| io::Error::other(e.to_string()))?;

        tokio::spawn(notify::run_relay(department.to_string(), hub.subscribe_all()));
        tokio::spawn(reaper::run_compactor(
            engine.clone(),
            self.options.compact_threshold,
        ));
        if let Some(period) = self.options.sweep_interval {
            tokio::spawn(reaper::run_sweeper(engine.clone(), period));
        }

        self.tenants.insert(
            department.to_string(),
            Tenant {
                engine: engine.clone(),
                hub,
            },
        );
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.tenants.len() as f64);
        info!(department, seeded, "department loaded");
        Ok(engine)
    }

    /// The notice hub of a loaded department.
    pub fn hub(&self, department: &str) -> Option<Arc<NotifyHub>> {
        self.tenants.get(department).map(|t| t.hub.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::fs;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("roomslot_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn seeded() -> TenantOptions {
        TenantOptions {
            faculty_seed: vec![
                Faculty {
                    name: "Ms. Neha Katre (NK)".into(),
                    role: Role::Admin,
                },
                Faculty {
                    name: "Dr. Vinaya Sawant (VS)".into(),
                    role: Role::Hod,
                },
            ],
            ..TenantOptions::default()
        }
    }

    #[tokio::test]
    async fn department_isolation() {
        let tm = TenantManager::new(test_data_dir("isolation"), TenantOptions::default());
        let it = tm.get_or_create("it").await.unwrap();
        let comps = tm.get_or_create("comps").await.unwrap();

        it.create_room("Lab1", RoomKind::Lab, 35, None).await.unwrap();
        // Same room name is free in another department.
        comps.create_room("Lab1", RoomKind::Lab, 30, None).await.unwrap();

        assert_eq!(it.room_info("Lab1").await.unwrap().capacity, 35);
        assert_eq!(comps.room_info("Lab1").await.unwrap().capacity, 30);
    }

    #[tokio::test]
    async fn lazy_creation_and_reuse() {
        let dir = test_data_dir("lazy");
        let tm = TenantManager::new(dir.clone(), TenantOptions::default());
        assert!(fs::read_dir(&dir).unwrap().next().is_none());

        let a = tm.get_or_create("it_dept").await.unwrap();
        assert!(dir.join("it_dept.wal").exists());
        let b = tm.get_or_create("it_dept").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(tm.hub("it_dept").is_some());
        assert!(tm.hub("other").is_none());
    }

    #[tokio::test]
    async fn name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = TenantManager::new(dir.clone(), TenantOptions::default());
        tm.get_or_create("../evil").await.unwrap();
        assert!(dir.join("evil.wal").exists());
        assert!(tm.get_or_create("../..").await.is_err());
    }

    #[tokio::test]
    async fn name_too_long() {
        let tm = TenantManager::new(test_data_dir("too_long"), TenantOptions::default());
        let err = tm
            .get_or_create(&"x".repeat(MAX_TENANT_NAME_LEN + 1))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("department name too long"));
    }

    #[tokio::test]
    async fn seed_applied_once() {
        let dir = test_data_dir("seed");
        {
            let tm = TenantManager::new(dir.clone(), seeded());
            let engine = tm.get_or_create("it").await.unwrap();
            assert_eq!(engine.list_faculty().len(), 2);
            // Re-role survives restart; seeding does not overwrite it.
            engine
                .add_faculty("Ms. Neha Katre (NK)", Role::Teacher)
                .await
                .unwrap();
        }
        let tm = TenantManager::new(dir, seeded());
        let engine = tm.get_or_create("it").await.unwrap();
        assert_eq!(engine.list_faculty().len(), 2);
        assert_eq!(
            engine.find_faculty("Ms. Neha Katre (NK)").unwrap().role,
            Role::Teacher
        );
    }
}
