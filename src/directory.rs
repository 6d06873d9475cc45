//! Lookup directories for the people and records tasks point at.
//!
//! Tasks only hold ids for users, clients, entities, service types and task
//! categories. The `Directory` trait resolves those ids to display names for
//! search and to existence checks for payload validation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    pub id: u64,
    pub name: String,
}

/// A legal entity (company, trust, individual) belonging to one client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub id: u64,
    pub client_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceType {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskCategory {
    pub id: u64,
    pub name: String,
}

/// Read access to the tenant's lookup collections.
pub trait Directory {
    fn user_name(&self, id: u64) -> Option<&str>;
    fn client_name(&self, id: u64) -> Option<&str>;
    fn entity(&self, id: u64) -> Option<&Entity>;
    fn service_type_name(&self, id: u64) -> Option<&str>;
    fn task_category_name(&self, id: u64) -> Option<&str>;
}

/// In-memory directory persisted alongside the tenant's tasks.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Directories {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub service_types: Vec<ServiceType>,
    #[serde(default)]
    pub task_categories: Vec<TaskCategory>,
}

impl Directories {
    pub fn add_user(&mut self, name: &str) -> u64 {
        let id = self.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        self.users.push(User { id, name: name.trim().to_string() });
        id
    }

    pub fn add_client(&mut self, name: &str) -> u64 {
        let id = self.clients.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        self.clients.push(Client { id, name: name.trim().to_string() });
        id
    }

    /// Add an entity under an existing client. Returns `None` if the client
    /// is unknown.
    pub fn add_entity(&mut self, client_id: u64, name: &str) -> Option<u64> {
        self.client_name(client_id)?;
        let id = self.entities.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        self.entities.push(Entity { id, client_id, name: name.trim().to_string() });
        Some(id)
    }

    pub fn add_service_type(&mut self, name: &str) -> u64 {
        let id = self.service_types.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        self.service_types.push(ServiceType { id, name: name.trim().to_string() });
        id
    }

    pub fn add_task_category(&mut self, name: &str) -> u64 {
        let id = self.task_categories.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        self.task_categories.push(TaskCategory { id, name: name.trim().to_string() });
        id
    }
}

impl Directory for Directories {
    fn user_name(&self, id: u64) -> Option<&str> {
        self.users.iter().find(|u| u.id == id).map(|u| u.name.as_str())
    }

    fn client_name(&self, id: u64) -> Option<&str> {
        self.clients.iter().find(|c| c.id == id).map(|c| c.name.as_str())
    }

    fn entity(&self, id: u64) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    fn service_type_name(&self, id: u64) -> Option<&str> {
        self.service_types.iter().find(|s| s.id == id).map(|s| s.name.as_str())
    }

    fn task_category_name(&self, id: u64) -> Option<&str> {
        self.task_categories.iter().find(|c| c.id == id).map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_assigned_per_collection() {
        let mut dir = Directories::default();
        assert_eq!(dir.add_user("Ana"), 1);
        assert_eq!(dir.add_user("Ben"), 2);
        assert_eq!(dir.add_client("Acme Holdings"), 1);
        assert_eq!(dir.user_name(2), Some("Ben"));
        assert_eq!(dir.client_name(1), Some("Acme Holdings"));
        assert_eq!(dir.client_name(9), None);
    }

    #[test]
    fn test_entity_requires_existing_client() {
        let mut dir = Directories::default();
        assert_eq!(dir.add_entity(1, "Acme Pty Ltd"), None);
        let client = dir.add_client("Acme");
        let entity = dir.add_entity(client, "Acme Pty Ltd").unwrap();
        assert_eq!(dir.entity(entity).map(|e| e.client_id), Some(client));
    }
}
