use db::{
    DBService,
    models::{
        contract::Contract,
        customer::Customer,
        payment::Payment,
        project::{CreateProject, Project, ProjectFields, UpdateProject},
    },
};
use sqlx::AnyConnection;
use thiserror::Error;
use tracing::{debug, info};
use utils::dates::format_date;

use super::{
    priority,
    validation::{self, ValidationError},
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("customer {0} does not exist")]
    CustomerNotFound(i64),
    #[error("project has recorded payments or signed contracts and cannot be deleted")]
    HasFinancialHistory,
}

pub struct ProjectService;

impl ProjectService {
    async fn validate(db: &DBService, fields: ProjectFields) -> Result<ProjectFields, ProjectError> {
        if Customer::find_by_id(&db.pool, fields.customer_id).await?.is_none() {
            return Err(ProjectError::CustomerNotFound(fields.customer_id));
        }
        let (start_date, due_date) = validation::optional_date_pair(
            "start_date",
            fields.start_date.as_deref(),
            "due_date",
            fields.due_date.as_deref(),
        )?;
        Ok(ProjectFields {
            name: validation::required_text("name", &fields.name)?,
            description: validation::optional_text(fields.description),
            site_address: validation::optional_text(fields.site_address),
            start_date: start_date.map(format_date),
            due_date: due_date.map(format_date),
            budget_cents: validation::non_negative_cents("budget_cents", fields.budget_cents)?,
            ..fields
        })
    }

    /// Write the dense ordering that results from moving `id` to `target`.
    async fn apply_priority(conn: &mut AnyConnection, id: i64, target: i64) -> Result<(), sqlx::Error> {
        let before = Project::priorities(&mut *conn).await?;
        let after = priority::reorder(&before, id, target);
        for (project_id, new_priority) in priority::changes(&before, &after) {
            debug!(project_id, new_priority, "Shifting project priority");
            Project::set_priority(&mut *conn, project_id, new_priority).await?;
        }
        Ok(())
    }

    pub async fn create(db: &DBService, data: &CreateProject) -> Result<Project, ProjectError> {
        let fields = Self::validate(
            db,
            ProjectFields {
                customer_id: data.customer_id,
                name: data.name.clone(),
                description: data.description.clone(),
                site_address: data.site_address.clone(),
                status: data.status.unwrap_or_default(),
                start_date: data.start_date.clone(),
                due_date: data.due_date.clone(),
                budget_cents: data.budget_cents.unwrap_or(0),
            },
        )
        .await?;

        // priorities are read then rewritten, so writers take turns
        let mut tx = db.pool.begin().await?;
        db.lock_for_write(&mut *tx, "projects").await?;
        let last = Project::priorities(&mut *tx).await?.len() as i64 + 1;
        let project = Project::create(&mut *tx, &fields, last).await?;
        if let Some(target) = data.priority {
            Self::apply_priority(&mut *tx, project.id, target).await?;
        }
        let project = Project::find_by_id(&mut *tx, project.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;

        info!(project_id = project.id, priority = project.priority, "Created project");
        Ok(project)
    }

    pub async fn update(db: &DBService, existing: &Project, data: &UpdateProject) -> Result<Project, ProjectError> {
        let current = ProjectFields::from(existing);
        let fields = Self::validate(
            db,
            ProjectFields {
                customer_id: data.customer_id.unwrap_or(current.customer_id),
                name: data.name.clone().unwrap_or(current.name),
                description: data.description.clone().or(current.description),
                site_address: data.site_address.clone().or(current.site_address),
                status: data.status.unwrap_or(current.status),
                start_date: data.start_date.clone().or(current.start_date),
                due_date: data.due_date.clone().or(current.due_date),
                budget_cents: data.budget_cents.unwrap_or(current.budget_cents),
            },
        )
        .await?;

        let mut tx = db.pool.begin().await?;
        db.lock_for_write(&mut *tx, "projects").await?;
        Project::update(&mut *tx, existing.id, &fields).await?;
        if let Some(target) = data.priority.filter(|&p| p != existing.priority) {
            Self::apply_priority(&mut *tx, existing.id, target).await?;
        }
        let project = Project::find_by_id(&mut *tx, existing.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        Ok(project)
    }

    pub async fn delete(db: &DBService, project: &Project) -> Result<(), ProjectError> {
        let payments = Payment::count_for_project(&db.pool, project.id).await?;
        let signed = Contract::count_signed_for_project(&db.pool, project.id).await?;
        if payments > 0 || signed > 0 {
            return Err(ProjectError::HasFinancialHistory);
        }

        let mut tx = db.pool.begin().await?;
        db.lock_for_write(&mut *tx, "projects").await?;
        Project::delete(&mut *tx, project.id).await?;
        let remaining = Project::priorities(&mut *tx).await?;
        for (project_id, new_priority) in priority::changes(&remaining, &priority::compact(&remaining)) {
            Project::set_priority(&mut *tx, project_id, new_priority).await?;
        }
        tx.commit().await?;

        info!(project_id = project.id, "Deleted project");
        Ok(())
    }
}
