use serde::{Deserialize, Serialize};
use sqlx::{Any, AnyConnection, Executor, FromRow};
use ts_rs::TS;
use utils::money::line_amount;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LineItem {
    pub id: i64,
    pub estimate_id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub position: i64,
    pub description: String,
    pub quantity: f64,
    pub unit_price_cents: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: f64,
    pub unit_price_cents: i64,
}

impl LineItemInput {
    pub fn amount_cents(&self) -> i64 {
        line_amount(self.quantity, self.unit_price_cents)
    }
}

impl From<&LineItem> for LineItemInput {
    fn from(item: &LineItem) -> Self {
        Self {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
        }
    }
}

/// The document a line item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentRef {
    Estimate(i64),
    Invoice(i64),
}

impl DocumentRef {
    fn column(&self) -> &'static str {
        match self {
            DocumentRef::Estimate(_) => "estimate_id",
            DocumentRef::Invoice(_) => "invoice_id",
        }
    }

    fn id(&self) -> i64 {
        match self {
            DocumentRef::Estimate(id) | DocumentRef::Invoice(id) => *id,
        }
    }
}

impl LineItem {
    pub async fn find_for_document<'e, E>(executor: E, document: DocumentRef) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Any>,
    {
        let sql = format!(
            "SELECT * FROM line_items WHERE {} = $1 ORDER BY position ASC, id ASC",
            document.column()
        );
        sqlx::query_as::<_, LineItem>(&sql)
            .bind(document.id())
            .fetch_all(executor)
            .await
    }

    /// Replace every item of `document` with `items`, numbered from 1 in order.
    pub async fn replace_for_document(
        conn: &mut AnyConnection,
        document: DocumentRef,
        items: &[LineItemInput],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let delete_sql = format!("DELETE FROM line_items WHERE {} = $1", document.column());
        sqlx::query(&delete_sql)
            .bind(document.id())
            .execute(&mut *conn)
            .await?;

        let (estimate_id, invoice_id) = match document {
            DocumentRef::Estimate(id) => (Some(id), None),
            DocumentRef::Invoice(id) => (None, Some(id)),
        };

        let mut created = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let row = sqlx::query_as::<_, LineItem>(
                r#"INSERT INTO line_items (estimate_id, invoice_id, position, description, quantity, unit_price_cents, amount_cents)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   RETURNING *"#,
            )
            .bind(estimate_id)
            .bind(invoice_id)
            .bind(index as i64 + 1)
            .bind(item.description.trim().to_string())
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.amount_cents())
            .fetch_one(&mut *conn)
            .await?;
            created.push(row);
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            estimate::{Estimate, EstimateFields, EstimateStatus},
            project::{
                Project,
                tests::{fields, seed_customer},
            },
            Totals,
        },
    };

    fn input(description: &str, quantity: f64, unit_price_cents: i64) -> LineItemInput {
        LineItemInput {
            description: description.to_string(),
            quantity,
            unit_price_cents,
        }
    }

    #[tokio::test]
    async fn replace_renumbers_and_computes_amounts() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = Project::create(&db.pool, &fields(customer.id, "Deck"), 1).await.unwrap();
        let estimate = Estimate::create(
            &db.pool,
            "EST-0001",
            &EstimateFields {
                project_id: project.id,
                title: "Deck".to_string(),
                status: EstimateStatus::Draft,
                issue_date: "2025-04-01".to_string(),
                valid_until: None,
                tax_rate: 0.0,
                notes: None,
                totals: Totals::default(),
            },
        )
        .await
        .unwrap();
        let document = DocumentRef::Estimate(estimate.id);

        let mut conn = db.pool.acquire().await.unwrap();
        LineItem::replace_for_document(&mut conn, document, &[input("Old", 1.0, 100)])
            .await
            .unwrap();
        let items = LineItem::replace_for_document(
            &mut conn,
            document,
            &[input("  Framing ", 2.5, 1_999), input("Permits", 1.0, 35_000)],
        )
        .await
        .unwrap();
        drop(conn);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].position, 1);
        assert_eq!(items[0].description, "Framing");
        assert_eq!(items[0].amount_cents, 4_998);

        let stored = LineItem::find_for_document(&db.pool, document).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].description, "Permits");
        assert!(stored.iter().all(|i| i.invoice_id.is_none()));
    }
}
