//! Row-level statements against the `employees` table.

use entity::employees;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use tracing::debug;

use crate::DbPool;

/// The four business fields of an employee, already validated.
#[derive(Clone, Debug, PartialEq)]
pub struct EmployeeDraft {
    pub name: String,
    pub position: String,
    pub department: String,
    pub salary: f64,
}

impl EmployeeDraft {
    /// `id` stays unset so the storage layer assigns or keeps it.
    fn into_active_model(self) -> employees::ActiveModel {
        employees::ActiveModel {
            id: NotSet,
            name: Set(self.name),
            position: Set(self.position),
            department: Set(self.department),
            salary: Set(self.salary),
        }
    }
}

impl From<employees::Model> for EmployeeDraft {
    fn from(model: employees::Model) -> Self {
        Self {
            name: model.name,
            position: model.position,
            department: model.department,
            salary: model.salary,
        }
    }
}

/// All rows in the order the storage engine returns them.
pub async fn list_employees(pool: &DbPool) -> Result<Vec<employees::Model>, DbErr> {
    employees::Entity::find().all(pool).await
}

pub async fn count_employees(pool: &DbPool) -> Result<u64, DbErr> {
    employees::Entity::find().count(pool).await
}

pub async fn find_employee(pool: &DbPool, id: i64) -> Result<Option<employees::Model>, DbErr> {
    employees::Entity::find_by_id(id).one(pool).await
}

pub async fn insert_employee(
    pool: &DbPool,
    draft: EmployeeDraft,
) -> Result<employees::Model, DbErr> {
    let model = draft.into_active_model().insert(pool).await?;
    debug!(id = model.id, "employee row inserted");
    Ok(model)
}

/// Overwrites the business fields of row `id`. `None` when no such row exists.
pub async fn update_employee(
    pool: &DbPool,
    id: i64,
    draft: EmployeeDraft,
) -> Result<Option<employees::Model>, DbErr> {
    let result = employees::Entity::update_many()
        .set(draft.into_active_model())
        .filter(employees::Column::Id.eq(id))
        .exec(pool)
        .await?;
    if result.rows_affected == 0 {
        return Ok(None);
    }
    debug!(id, "employee row updated");
    find_employee(pool, id).await
}

/// Returns whether a row was removed.
pub async fn delete_employee(pool: &DbPool, id: i64) -> Result<bool, DbErr> {
    let result = employees::Entity::delete_by_id(id).exec(pool).await?;
    debug!(id, rows = result.rows_affected, "employee delete executed");
    Ok(result.rows_affected > 0)
}
