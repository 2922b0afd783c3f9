//! Employee record operations: list, lookup, create, update, delete.
//!
//! Handlers in the server translate requests into calls on [`HrModule`] and
//! map the resulting [`HrError`] variants onto redirects or re-rendered forms.

mod form;

pub use entity::employees::Model as Employee;
pub use form::{EmployeeForm, ValidationError};

/// Shown whenever a request names an id with no matching row.
pub const EMPLOYEE_NOT_FOUND: &str = "Employee not found!";

use platform_db::DbPool;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum HrError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{}", EMPLOYEE_NOT_FOUND)]
    NotFound { id: i64 },
    #[error("An error occurred: {0}")]
    Storage(#[from] DbErr),
}

pub type HrResult<T> = Result<T, HrError>;

#[derive(Clone, Debug)]
pub struct HrModule {
    pool: DbPool,
}

impl HrModule {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[instrument(name = "hr.employees", skip_all)]
    pub async fn employees(&self) -> HrResult<Vec<Employee>> {
        Ok(platform_db::list_employees(&self.pool).await?)
    }

    #[instrument(name = "hr.employee", skip(self))]
    pub async fn employee(&self, id: i64) -> HrResult<Employee> {
        platform_db::find_employee(&self.pool, id)
            .await?
            .ok_or(HrError::NotFound { id })
    }

    #[instrument(name = "hr.add_employee", skip_all)]
    pub async fn add_employee(&self, form: &EmployeeForm) -> HrResult<Employee> {
        let draft = form.validate().inspect_err(|err| {
            warn!(error = %err, "rejected new employee");
        })?;
        let employee = platform_db::insert_employee(&self.pool, draft).await?;
        info!(id = employee.id, "employee added");
        Ok(employee)
    }

    /// Lookup precedes validation, so a missing row wins over a bad form.
    #[instrument(name = "hr.update_employee", skip(self, form))]
    pub async fn update_employee(&self, id: i64, form: &EmployeeForm) -> HrResult<Employee> {
        self.employee(id).await?;
        let draft = form.validate().inspect_err(|err| {
            warn!(error = %err, "rejected employee update");
        })?;
        let employee = platform_db::update_employee(&self.pool, id, draft)
            .await?
            .ok_or(HrError::NotFound { id })?;
        info!(id, "employee updated");
        Ok(employee)
    }

    #[instrument(name = "hr.delete_employee", skip(self))]
    pub async fn delete_employee(&self, id: i64) -> HrResult<()> {
        self.employee(id).await?;
        if !platform_db::delete_employee(&self.pool, id).await? {
            return Err(HrError::NotFound { id });
        }
        info!(id, "employee deleted");
        Ok(())
    }
}
