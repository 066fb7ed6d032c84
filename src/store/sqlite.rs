//! Single-file SQLite persistence for the `Store` port: queryable columns
//! for the fields callers actually filter on, a JSON blob column for the
//! rest of the struct, and upserts via `ON CONFLICT ... DO UPDATE` rather
//! than delete-then-insert.
//!
//! `rusqlite` is opened with `bundled` so the crate doesn't depend on a
//! system libsqlite3 — a local single-file database the orchestrator
//! ships with, not an external service.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::allocation::{PortAllocation, PortProtocol, VlanAllocation};
use crate::model::ids::InstanceId;
use crate::model::instance::Instance;
use crate::model::schedule::{RoutingId, RoutingSchedule};
use crate::ports::error::PortError;
use crate::ports::store::{DependencyEdge, Store};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS instances (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dependencies (
    dependent TEXT NOT NULL,
    dependency TEXT NOT NULL,
    PRIMARY KEY (dependent, dependency)
);

CREATE TABLE IF NOT EXISTS port_allocations (
    instance_id TEXT NOT NULL,
    port INTEGER NOT NULL,
    protocol TEXT NOT NULL,
    PRIMARY KEY (instance_id, port)
);

CREATE TABLE IF NOT EXISTS vlan_allocations (
    instance_id TEXT NOT NULL,
    vlan_id INTEGER NOT NULL,
    PRIMARY KEY (instance_id, vlan_id)
);

CREATE TABLE IF NOT EXISTS routing_schedules (
    id TEXT PRIMARY KEY,
    instance_id TEXT NOT NULL,
    enabled INTEGER NOT NULL,
    json TEXT NOT NULL
);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PortError> {
        let conn = Connection::open(path).map_err(|e| PortError::context("opening sqlite store", e))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, PortError> {
        let conn =
            Connection::open_in_memory().map_err(|e| PortError::context("opening in-memory sqlite store", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, PortError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| PortError::context("creating sqlite schema", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sqlite connection mutex poisoned")
    }

    /// Seeds a port allocation handed out by the router-management layer
    /// (router provisioning is out of scope) — not part of the `Store`
    /// trait since the orchestrator only ever reads these rows.
    pub fn put_port_allocation(&self, allocation: &PortAllocation) -> Result<(), PortError> {
        let protocol = match allocation.protocol {
            PortProtocol::Tcp => "tcp",
            PortProtocol::Udp => "udp",
        };
        self.lock()
            .execute(
                "INSERT INTO port_allocations (instance_id, port, protocol) VALUES (?1, ?2, ?3)
                 ON CONFLICT(instance_id, port) DO UPDATE SET protocol = excluded.protocol",
                params![allocation.instance_id.as_str(), allocation.port, protocol],
            )
            .map_err(|e| PortError::context("writing port allocation", e))?;
        Ok(())
    }

    /// Seeds a VLAN allocation; see [`SqliteStore::put_port_allocation`].
    pub fn put_vlan_allocation(&self, allocation: &VlanAllocation) -> Result<(), PortError> {
        self.lock()
            .execute(
                "INSERT INTO vlan_allocations (instance_id, vlan_id) VALUES (?1, ?2)
                 ON CONFLICT(instance_id, vlan_id) DO NOTHING",
                params![allocation.instance_id.as_str(), allocation.vlan_id],
            )
            .map_err(|e| PortError::context("writing vlan allocation", e))?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_instance(&self, id: &InstanceId) -> Result<Option<Instance>, PortError> {
        let json: Option<String> = self
            .lock()
            .query_row(
                "SELECT json FROM instances WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| PortError::context("loading instance", e))?;
        json.map(|j| serde_json::from_str(&j).map_err(|e| PortError::context("deserializing instance", e)))
            .transpose()
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, PortError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT json FROM instances")
            .map_err(|e| PortError::context("listing instances", e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| PortError::context("listing instances", e))?;
        let mut result = Vec::new();
        for row in rows {
            let json = row.map_err(|e| PortError::context("reading instance row", e))?;
            result.push(serde_json::from_str(&json).map_err(|e| PortError::context("deserializing instance", e))?);
        }
        Ok(result)
    }

    async fn put_instance(&self, instance: &Instance) -> Result<(), PortError> {
        let json = serde_json::to_string(instance).map_err(|e| PortError::context("serializing instance", e))?;
        self.lock()
            .execute(
                "INSERT INTO instances (id, status, json) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET status = excluded.status, json = excluded.json",
                params![instance.id.as_str(), instance.status.to_string(), json],
            )
            .map_err(|e| PortError::context("writing instance", e))?;
        Ok(())
    }

    async fn list_dependencies(&self) -> Result<Vec<DependencyEdge>, PortError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT dependent, dependency FROM dependencies")
            .map_err(|e| PortError::context("listing dependencies", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| PortError::context("listing dependencies", e))?;
        let mut edges = Vec::new();
        for row in rows {
            let (dependent, dependency) = row.map_err(|e| PortError::context("reading dependency row", e))?;
            edges.push(DependencyEdge {
                dependent: InstanceId::new(&dependent)
                    .map_err(|_| PortError::Message(format!("corrupt dependent id in store: {dependent}")))?,
                dependency: InstanceId::new(&dependency)
                    .map_err(|_| PortError::Message(format!("corrupt dependency id in store: {dependency}")))?,
            });
        }
        Ok(edges)
    }

    async fn put_dependency(&self, edge: &DependencyEdge) -> Result<(), PortError> {
        self.lock()
            .execute(
                "INSERT INTO dependencies (dependent, dependency) VALUES (?1, ?2)
                 ON CONFLICT(dependent, dependency) DO NOTHING",
                params![edge.dependent.as_str(), edge.dependency.as_str()],
            )
            .map_err(|e| PortError::context("writing dependency", e))?;
        Ok(())
    }

    async fn delete_dependency(&self, edge: &DependencyEdge) -> Result<(), PortError> {
        self.lock()
            .execute(
                "DELETE FROM dependencies WHERE dependent = ?1 AND dependency = ?2",
                params![edge.dependent.as_str(), edge.dependency.as_str()],
            )
            .map_err(|e| PortError::context("deleting dependency", e))?;
        Ok(())
    }

    async fn list_port_allocations(&self, instance_id: &InstanceId) -> Result<Vec<PortAllocation>, PortError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT port, protocol FROM port_allocations WHERE instance_id = ?1")
            .map_err(|e| PortError::context("listing port allocations", e))?;
        let rows = stmt
            .query_map(params![instance_id.as_str()], |row| {
                Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| PortError::context("listing port allocations", e))?;
        let mut result = Vec::new();
        for row in rows {
            let (port, protocol) = row.map_err(|e| PortError::context("reading port allocation row", e))?;
            let protocol = match protocol.as_str() {
                "udp" => PortProtocol::Udp,
                _ => PortProtocol::Tcp,
            };
            result.push(PortAllocation {
                instance_id: instance_id.clone(),
                port,
                protocol,
            });
        }
        Ok(result)
    }

    async fn list_vlan_allocations(&self, instance_id: &InstanceId) -> Result<Vec<VlanAllocation>, PortError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT vlan_id FROM vlan_allocations WHERE instance_id = ?1")
            .map_err(|e| PortError::context("listing vlan allocations", e))?;
        let rows = stmt
            .query_map(params![instance_id.as_str()], |row| row.get::<_, u16>(0))
            .map_err(|e| PortError::context("listing vlan allocations", e))?;
        let mut result = Vec::new();
        for row in rows {
            let vlan_id = row.map_err(|e| PortError::context("reading vlan allocation row", e))?;
            result.push(VlanAllocation {
                instance_id: instance_id.clone(),
                vlan_id,
            });
        }
        Ok(result)
    }

    async fn get_schedule(&self, id: &RoutingId) -> Result<Option<RoutingSchedule>, PortError> {
        let json: Option<String> = self
            .lock()
            .query_row(
                "SELECT json FROM routing_schedules WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| PortError::context("loading schedule", e))?;
        json.map(|j| serde_json::from_str(&j).map_err(|e| PortError::context("deserializing schedule", e)))
            .transpose()
    }

    async fn list_schedules(&self) -> Result<Vec<RoutingSchedule>, PortError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT json FROM routing_schedules")
            .map_err(|e| PortError::context("listing schedules", e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| PortError::context("listing schedules", e))?;
        let mut result = Vec::new();
        for row in rows {
            let json = row.map_err(|e| PortError::context("reading schedule row", e))?;
            result.push(serde_json::from_str(&json).map_err(|e| PortError::context("deserializing schedule", e))?);
        }
        Ok(result)
    }

    async fn put_schedule(&self, schedule: &RoutingSchedule) -> Result<(), PortError> {
        let json = serde_json::to_string(schedule).map_err(|e| PortError::context("serializing schedule", e))?;
        self.lock()
            .execute(
                "INSERT INTO routing_schedules (id, instance_id, enabled, json) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET instance_id = excluded.instance_id, enabled = excluded.enabled, json = excluded.json",
                params![
                    schedule.id.as_str(),
                    schedule.instance_id.as_str(),
                    schedule.enabled,
                    json
                ],
            )
            .map_err(|e| PortError::context("writing schedule", e))?;
        Ok(())
    }

    async fn delete_instance_cascade(&self, id: &InstanceId) -> Result<(), PortError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| PortError::context("starting cascade delete transaction", e))?;
        tx.execute("DELETE FROM instances WHERE id = ?1", params![id.as_str()])
            .map_err(|e| PortError::context("deleting instance row", e))?;
        tx.execute(
            "DELETE FROM dependencies WHERE dependent = ?1 OR dependency = ?1",
            params![id.as_str()],
        )
        .map_err(|e| PortError::context("deleting dependency rows", e))?;
        tx.execute(
            "DELETE FROM port_allocations WHERE instance_id = ?1",
            params![id.as_str()],
        )
        .map_err(|e| PortError::context("deleting port allocation rows", e))?;
        tx.execute(
            "DELETE FROM vlan_allocations WHERE instance_id = ?1",
            params![id.as_str()],
        )
        .map_err(|e| PortError::context("deleting vlan allocation rows", e))?;
        tx.commit()
            .map_err(|e| PortError::context("committing cascade delete transaction", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::instance::{HealthSummary, InstanceStatus, VerificationInfo};
    use crate::model::ids::FeatureId;
    use std::collections::HashMap;

    fn sample_instance(id: &str) -> Instance {
        Instance {
            id: InstanceId::new(id).unwrap(),
            feature_id: FeatureId::new("tor").unwrap(),
            name: id.to_string(),
            binary_path: "/data/services/tor/bin/tor".to_string(),
            binary_version: "0.4.8.9".to_string(),
            config: HashMap::new(),
            allocated_ports: vec![9050],
            allocated_vlan: Some(42),
            bind_ip: "10.10.0.5".parse().unwrap(),
            memory_limit_bytes: 256 * 1024 * 1024,
            router_id: "router-1".to_string(),
            status: InstanceStatus::Stopped,
            auto_start: true,
            auto_restart: true,
            verification: VerificationInfo::default(),
            health: HealthSummary::default(),
            unavailable_reason: None,
        }
    }

    #[tokio::test]
    async fn put_then_get_instance_roundtrips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let instance = sample_instance("tor-1");
        store.put_instance(&instance).await.unwrap();

        let loaded = store.get_instance(&instance.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, instance.id);
        assert_eq!(loaded.status, InstanceStatus::Stopped);
    }

    #[tokio::test]
    async fn missing_instance_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = InstanceId::new("ghost").unwrap();
        assert!(store.get_instance(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dependency_roundtrip_and_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let edge = DependencyEdge {
            dependent: InstanceId::new("b").unwrap(),
            dependency: InstanceId::new("a").unwrap(),
        };
        store.put_dependency(&edge).await.unwrap();
        assert_eq!(store.list_dependencies().await.unwrap(), vec![edge.clone()]);

        store.delete_dependency(&edge).await.unwrap();
        assert!(store.list_dependencies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cascade_delete_removes_instance_and_related_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let instance = sample_instance("tor-1");
        store.put_instance(&instance).await.unwrap();
        store
            .put_port_allocation(&PortAllocation {
                instance_id: instance.id.clone(),
                port: 9050,
                protocol: PortProtocol::Tcp,
            })
            .unwrap();
        store
            .put_dependency(&DependencyEdge {
                dependent: instance.id.clone(),
                dependency: InstanceId::new("a").unwrap(),
            })
            .await
            .unwrap();

        store.delete_instance_cascade(&instance.id).await.unwrap();

        assert!(store.get_instance(&instance.id).await.unwrap().is_none());
        assert!(store.list_port_allocations(&instance.id).await.unwrap().is_empty());
        assert!(store.list_dependencies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn schedule_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let schedule = RoutingSchedule {
            id: RoutingId::new("office-hours").unwrap(),
            instance_id: InstanceId::new("tor-1").unwrap(),
            windows: vec![],
            enabled: true,
            active: false,
            last_activated: None,
            last_deactivated: None,
        };
        store.put_schedule(&schedule).await.unwrap();
        let loaded = store.get_schedule(&schedule.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, schedule.id);
    }
}
