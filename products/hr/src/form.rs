use platform_db::EmployeeDraft;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Employee;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("All fields are required!")]
    MissingField { field: &'static str },
    #[error("Salary must be a valid number!")]
    InvalidSalary { value: String },
}

/// Raw text fields as submitted by the employee form.
///
/// Absent keys deserialize as empty strings so they fail validation instead
/// of failing extraction.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmployeeForm {
    pub name: String,
    pub position: String,
    pub department: String,
    pub salary: String,
}

impl EmployeeForm {
    /// Checks every field is non-empty, then parses the salary.
    ///
    /// Whitespace counts as content; only the salary is trimmed, for parsing.
    pub fn validate(&self) -> Result<EmployeeDraft, ValidationError> {
        let fields = [
            ("name", &self.name),
            ("position", &self.position),
            ("department", &self.department),
            ("salary", &self.salary),
        ];
        if let Some((field, _)) = fields.into_iter().find(|(_, value)| value.is_empty()) {
            return Err(ValidationError::MissingField { field });
        }

        let salary = parse_salary(&self.salary)?;
        Ok(EmployeeDraft {
            name: self.name.clone(),
            position: self.position.clone(),
            department: self.department.clone(),
            salary,
        })
    }
}

impl From<&Employee> for EmployeeForm {
    fn from(employee: &Employee) -> Self {
        Self {
            name: employee.name.clone(),
            position: employee.position.clone(),
            department: employee.department.clone(),
            salary: employee.salary.to_string(),
        }
    }
}

fn parse_salary(raw: &str) -> Result<f64, ValidationError> {
    let invalid = || ValidationError::InvalidSalary {
        value: raw.to_string(),
    };
    // SQLite stores NaN as NULL, which the NOT NULL column rejects.
    match raw.trim().parse::<f64>() {
        Ok(value) if !value.is_nan() => Ok(value),
        _ => Err(invalid()),
    }
}
