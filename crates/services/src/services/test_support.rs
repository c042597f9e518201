use db::{
    DBService,
    models::{
        customer::{CreateCustomer, Customer},
        line_item::LineItemInput,
        project::{CreateProject, Project, ProjectStatus},
    },
};

use super::project::ProjectService;

pub(crate) async fn seed_customer(db: &DBService, name: &str) -> Customer {
    Customer::create(
        &db.pool,
        &CreateCustomer {
            name: name.to_string(),
            email: Some(format!("{}@example.test", name.to_lowercase())),
            phone: None,
            address: Some("12 Elm St".to_string()),
            notes: None,
        },
    )
    .await
    .unwrap()
}

pub(crate) fn new_project(customer_id: i64, name: &str) -> CreateProject {
    CreateProject {
        customer_id,
        name: name.to_string(),
        description: None,
        site_address: Some("40 Harbor Rd".to_string()),
        status: Some(ProjectStatus::Active),
        priority: None,
        start_date: None,
        due_date: None,
        budget_cents: Some(1_000_000),
    }
}

pub(crate) async fn seed_project(db: &DBService, customer_id: i64, name: &str) -> Project {
    ProjectService::create(db, &new_project(customer_id, name))
        .await
        .unwrap()
}

pub(crate) fn item(description: &str, quantity: f64, unit_price_cents: i64) -> LineItemInput {
    LineItemInput {
        description: description.to_string(),
        quantity,
        unit_price_cents,
    }
}
