use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The slice of the employee record the leave domain reads: tenure for
/// eligibility checks and department for statistics filters.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1000,
        "organization_id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "department_id": 10,
        "hire_date": "2024-01-01",
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = 1000)]
    pub id: u64,

    #[schema(example = 1)]
    pub organization_id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = 10, nullable = true)]
    pub department_id: Option<u64>,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub hire_date: NaiveDate,

    #[schema(example = "active")]
    pub status: String,
}

impl Employee {
    /// Whole months of service completed on `today`.
    pub fn service_months(&self, today: NaiveDate) -> u32 {
        if today <= self.hire_date {
            return 0;
        }
        let mut months = (today.year() - self.hire_date.year()) * 12
            + today.month() as i32
            - self.hire_date.month() as i32;
        if today.day() < self.hire_date.day() {
            months -= 1;
        }
        months.max(0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hired(on: NaiveDate) -> Employee {
        Employee {
            id: 1,
            organization_id: 1,
            employee_code: "EMP-1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            department_id: None,
            hire_date: on,
            status: "active".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn service_months_counts_completed_months_only() {
        let employee = hired(date(2025, 1, 15));
        assert_eq!(employee.service_months(date(2025, 1, 20)), 0);
        assert_eq!(employee.service_months(date(2025, 2, 14)), 0);
        assert_eq!(employee.service_months(date(2025, 2, 15)), 1);
        assert_eq!(employee.service_months(date(2026, 1, 15)), 12);
    }

    #[test]
    fn service_months_is_zero_before_hire() {
        let employee = hired(date(2026, 3, 1));
        assert_eq!(employee.service_months(date(2025, 12, 31)), 0);
    }
}
