use db::{
    DBService,
    models::{
        customer::{CreateCustomer, Customer, UpdateCustomer},
        project::Project,
    },
};
use thiserror::Error;
use tracing::info;

use super::validation::{self, ValidationError};

#[derive(Debug, Error)]
pub enum CustomerError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("customer has {0} project(s); delete or reassign them first")]
    HasProjects(i64),
}

pub struct CustomerService;

impl CustomerService {
    fn normalize(data: &CreateCustomer) -> Result<CreateCustomer, ValidationError> {
        Ok(CreateCustomer {
            name: validation::required_text("name", &data.name)?,
            email: validation::email(data.email.clone())?,
            phone: validation::optional_text(data.phone.clone()),
            address: validation::optional_text(data.address.clone()),
            notes: validation::optional_text(data.notes.clone()),
        })
    }

    pub async fn create(db: &DBService, data: &CreateCustomer) -> Result<Customer, CustomerError> {
        let data = Self::normalize(data)?;
        let customer = Customer::create(&db.pool, &data).await?;
        info!(customer_id = customer.id, "Created customer");
        Ok(customer)
    }

    /// Fields left as `None` keep their value; an empty string clears an
    /// optional field.
    pub async fn update(
        db: &DBService,
        existing: &Customer,
        data: &UpdateCustomer,
    ) -> Result<Customer, CustomerError> {
        let merged = CreateCustomer {
            name: data.name.clone().unwrap_or_else(|| existing.name.clone()),
            email: data.email.clone().or_else(|| existing.email.clone()),
            phone: data.phone.clone().or_else(|| existing.phone.clone()),
            address: data.address.clone().or_else(|| existing.address.clone()),
            notes: data.notes.clone().or_else(|| existing.notes.clone()),
        };
        let merged = Self::normalize(&merged)?;
        Ok(Customer::update(&db.pool, existing.id, &merged).await?)
    }

    pub async fn delete(db: &DBService, customer: &Customer) -> Result<(), CustomerError> {
        let projects = Project::count_for_customer(&db.pool, customer.id).await?;
        if projects > 0 {
            return Err(CustomerError::HasProjects(projects));
        }
        Customer::delete(&db.pool, customer.id).await?;
        info!(customer_id = customer.id, "Deleted customer");
        Ok(())
    }
}
