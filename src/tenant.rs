//! Tenant discovery and per-tenant database files.
//!
//! Every tenant (accounting firm) keeps its data in its own JSON file inside the
//! data directory, named `<tenant_name>_firm.json`. Nothing is shared between
//! tenant files, which is what keeps tenants segregated.

use std::fs;
use std::path::{Path, PathBuf};

use crate::db::Database;
use crate::error::{FirmError, Result};

const FILE_SUFFIX: &str = "_firm";

/// A tenant with its name and database file path.
#[derive(Debug, Clone)]
pub struct Tenant {
    pub name: String,
    pub display_name: String,
    pub file_path: PathBuf,
}

impl Tenant {
    pub fn new(display_name: &str, data_dir: &Path) -> Self {
        let name = sanitize_tenant_name(display_name);
        let file_path = data_dir.join(format!("{}{}.json", name, FILE_SUFFIX));
        Tenant {
            name,
            display_name: display_name.trim().to_string(),
            file_path,
        }
    }

    /// Recognise a tenant from an existing database file.
    pub fn from_file(file_path: PathBuf) -> Option<Self> {
        if file_path.extension()?.to_str()? != "json" {
            return None;
        }
        let stem = file_path.file_stem()?.to_str()?;
        let name = stem.strip_suffix(FILE_SUFFIX)?;
        if name.is_empty() {
            return None;
        }
        Some(Tenant {
            name: name.to_string(),
            display_name: name.replace('_', " "),
            file_path,
        })
    }

    pub fn create_if_not_exists(&self) -> Result<()> {
        if !self.file_path.exists() {
            Database::default().save(&self.file_path)?;
        }
        Ok(())
    }
}

/// Lowercase, with runs of anything non-alphanumeric collapsed to one underscore.
pub fn sanitize_tenant_name(display_name: &str) -> String {
    display_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// All tenants in the data directory, sorted by display name.
pub fn discover_tenants(data_dir: &Path) -> Result<Vec<Tenant>> {
    let mut tenants = Vec::new();
    if !data_dir.exists() {
        return Ok(tenants);
    }
    for entry in fs::read_dir(data_dir)? {
        let path = entry?.path();
        if path.is_file() {
            if let Some(tenant) = Tenant::from_file(path) {
                tenants.push(tenant);
            }
        }
    }
    tenants.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    Ok(tenants)
}

/// The tenant whose sanitized name matches `name`, if any.
pub fn find_tenant(data_dir: &Path, name: &str) -> Result<Option<Tenant>> {
    let wanted = sanitize_tenant_name(name);
    Ok(discover_tenants(data_dir)?.into_iter().find(|t| t.name == wanted))
}

/// Create a tenant with an empty database file.
pub fn create_tenant(display_name: &str, data_dir: &Path) -> Result<Tenant> {
    if sanitize_tenant_name(display_name).is_empty() {
        return Err(FirmError::validation("tenant name cannot be empty"));
    }
    let tenant = Tenant::new(display_name, data_dir);
    if tenant.file_path.exists() {
        return Err(FirmError::validation(format!("tenant '{}' already exists", display_name)));
    }
    fs::create_dir_all(data_dir)?;
    tenant.create_if_not_exists()?;
    Ok(tenant)
}

/// The tenant whose file was modified last.
pub fn most_recent_tenant(data_dir: &Path) -> Result<Option<Tenant>> {
    let mut most_recent: Option<(Tenant, std::time::SystemTime)> = None;
    for tenant in discover_tenants(data_dir)? {
        let modified = fs::metadata(&tenant.file_path)?.modified()?;
        match most_recent {
            Some((_, current)) if current >= modified => {}
            _ => most_recent = Some((tenant, modified)),
        }
    }
    Ok(most_recent.map(|(tenant, _)| tenant))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_tenant_name() {
        assert_eq!(sanitize_tenant_name("North Shore Accounting"), "north_shore_accounting");
        assert_eq!(sanitize_tenant_name("Smith & Co."), "smith_co");
        assert_eq!(sanitize_tenant_name("  Many   Spaces  "), "many_spaces");
        assert_eq!(sanitize_tenant_name("!!"), "");
    }

    #[test]
    fn test_create_and_discover() {
        let dir = tempfile::tempdir().unwrap();
        create_tenant("Beta Books", dir.path()).unwrap();
        create_tenant("Alpha Ledger", dir.path()).unwrap();
        fs::write(dir.path().join("config.json"), "{}").unwrap();

        let names: Vec<String> = discover_tenants(dir.path()).unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["alpha_ledger", "beta_books"]);

        assert!(create_tenant("beta books", dir.path()).is_err());
        assert!(create_tenant("  ", dir.path()).is_err());
        assert_eq!(find_tenant(dir.path(), "Alpha Ledger").unwrap().map(|t| t.name), Some("alpha_ledger".into()));
        assert!(find_tenant(dir.path(), "gamma").unwrap().is_none());
    }

    #[test]
    fn test_new_tenant_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = create_tenant("Gamma", dir.path()).unwrap();
        let db = Database::load(&tenant.file_path).unwrap();
        assert!(db.tasks.is_empty());
        assert!(most_recent_tenant(dir.path()).unwrap().is_some());
    }
}
