//! Employee header data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::Session;
use crate::transport::Request;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Employee {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub position: Option<String>,
    pub department: Option<String>,
    pub office: Option<String>,
    pub team: Option<String>,
    pub access_rights: BTreeMap<String, bool>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

impl Session {
    /// # Errors
    ///
    /// [`CoreError::NotLoggedIn`](crate::CoreError::NotLoggedIn) before
    /// login, transport/envelope errors otherwise.
    pub fn employee(&self, id: u64) -> Result<Employee> {
        self.require_login()?;
        self.fetch(Request::get(self.endpoints.employee_path(id)))
    }

    /// The logged-in employee.
    ///
    /// # Errors
    ///
    /// Same as [`employee`](Self::employee).
    pub fn me(&self) -> Result<Employee> {
        let id = self.require_login()?;
        self.employee(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_partial_header() {
        let employee: Employee = serde_json::from_str(
            r#"{"id": 5, "first_name": "Ada", "last_name": "Lovelace", "office": null, "access_rights": {"attendance": true}}"#,
        )
        .unwrap();
        assert_eq!(employee.full_name(), "Ada Lovelace");
        assert_eq!(employee.office, None);
        assert_eq!(employee.team, None);
        assert_eq!(employee.access_rights.get("attendance"), Some(&true));
    }
}
