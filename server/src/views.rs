use handlebars::{Handlebars, RenderError, TemplateError};
use products_hr::{Employee, EmployeeForm};
use serde_json::{Value, json};

use crate::flash::Flash;

const PARTIALS: &[(&str, &str)] = &[
    ("header", include_str!("../templates/header.hbs")),
    ("footer", include_str!("../templates/footer.hbs")),
    ("employee_fields", include_str!("../templates/employee_fields.hbs")),
];

const PAGES: &[(&str, &str)] = &[
    ("index", include_str!("../templates/index.hbs")),
    ("add_employee", include_str!("../templates/add_employee.hbs")),
    ("edit_employee", include_str!("../templates/edit_employee.hbs")),
];

/// Compiled page templates.
pub struct Views {
    registry: Handlebars<'static>,
}

impl Views {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        for (name, source) in PARTIALS {
            registry.register_partial(name, *source)?;
        }
        for (name, source) in PAGES {
            registry.register_template_string(name, *source)?;
        }
        Ok(Self { registry })
    }

    pub fn index(&self, employees: &[Employee], flashes: &[Flash]) -> Result<String, RenderError> {
        let rows: Vec<_> = employees.iter().map(employee_row).collect();
        self.registry.render(
            "index",
            &json!({
                "title": "Employees",
                "flashes": flashes,
                "employees": rows,
            }),
        )
    }

    pub fn add_form(&self, form: &EmployeeForm, flashes: &[Flash]) -> Result<String, RenderError> {
        self.registry.render(
            "add_employee",
            &json!({
                "title": "Add Employee",
                "flashes": flashes,
                "form": form,
            }),
        )
    }

    pub fn edit_form(
        &self,
        id: i64,
        form: &EmployeeForm,
        flashes: &[Flash],
    ) -> Result<String, RenderError> {
        self.registry.render(
            "edit_employee",
            &json!({
                "title": "Edit Employee",
                "flashes": flashes,
                "id": id,
                "form": form,
            }),
        )
    }
}

/// Salary goes out as text: JSON has no representation for infinite values.
fn employee_row(employee: &Employee) -> Value {
    json!({
        "id": employee.id,
        "name": employee.name,
        "position": employee.position,
        "department": employee.department,
        "salary": employee.salary.to_string(),
    })
}
