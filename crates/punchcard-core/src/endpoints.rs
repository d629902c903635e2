//! Remote endpoint layout.
//!
//! Every path the client talks to lives here so a deployment that moved a
//! page can be handled from the `[endpoints]` config table.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const EMPLOYEE_ID: &str = "{employee_id}";
const DAY_ID: &str = "{day_id}";

/// Paths relative to the base address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Endpoints {
    /// Credential form target.
    pub login: String,
    /// Account-unlock page (email token).
    pub unlock: String,
    /// Two-factor challenge page.
    pub two_factor: String,
    /// Page the flow lands on after a successful login.
    pub landing: String,
    /// JSON endpoint describing the logged-in user.
    pub identity: String,
    /// Timesheet read, with an `{employee_id}` placeholder.
    pub calendar: String,
    /// Day write/delete, with a `{day_id}` placeholder.
    pub day: String,
    pub projects: String,
    /// Employee header, with an `{employee_id}` placeholder.
    pub employee: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/login/index".to_string(),
            unlock: "/login/token-auth".to_string(),
            two_factor: "/login/google-2fa-token".to_string(),
            landing: "/".to_string(),
            identity: "/api/v1/navigation/context".to_string(),
            calendar: format!("/svc/attendance-bff/v1/timesheet/{EMPLOYEE_ID}"),
            day: format!("/svc/attendance-api/v1/days/{DAY_ID}"),
            projects: "/api/v1/projects".to_string(),
            employee: format!("/employee-header-bff/{EMPLOYEE_ID}"),
        }
    }
}

impl Endpoints {
    pub fn calendar_path(&self, employee_id: u64) -> String {
        self.calendar.replace(EMPLOYEE_ID, &employee_id.to_string())
    }

    pub fn day_path(&self, day_id: Uuid) -> String {
        self.day.replace(DAY_ID, &day_id.to_string())
    }

    pub fn employee_path(&self, employee_id: u64) -> String {
        self.employee.replace(EMPLOYEE_ID, &employee_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_filled() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.calendar_path(42),
            "/svc/attendance-bff/v1/timesheet/42"
        );
        assert_eq!(endpoints.employee_path(7), "/employee-header-bff/7");

        let id = Uuid::nil();
        assert_eq!(
            endpoints.day_path(id),
            "/svc/attendance-api/v1/days/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let endpoints: Endpoints = toml::from_str(r#"login = "/auth/sign-in""#).unwrap();
        assert_eq!(endpoints.login, "/auth/sign-in");
        assert_eq!(endpoints.unlock, Endpoints::default().unlock);
    }
}
