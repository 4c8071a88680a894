//! Financial ledger service
//!
//! The transactions table is append-only. Payments against invoices and
//! bills are written by the reconciliation service; this service records
//! ad-hoc income and expense and builds the aggregate views.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{decode, positive_decimal};
use crate::services::audit::AuditService;
use crate::services::sales_order::{load_invoice_balances, load_sales_order};
use shared::{
    ActivityAction, ActivityRecord, Actor, DocumentBalance, EntityType, LedgerSummary,
    OrderBalance, Transaction, TransactionType,
};

/// Ledger service
#[derive(Clone)]
pub struct LedgerService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    transaction_type: String,
    amount: Decimal,
    transaction_date: NaiveDate,
    description: Option<String>,
    invoice_id: Option<Uuid>,
    bill_id: Option<Uuid>,
    sales_order_id: Option<Uuid>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            transaction_type: decode(
                &row.transaction_type,
                "transaction_type",
                TransactionType::from_str,
            )?,
            amount: row.amount,
            transaction_date: row.transaction_date,
            description: row.description,
            invoice_id: row.invoice_id,
            bill_id: row.bill_id,
            sales_order_id: row.sales_order_id,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

const TRANSACTION_COLUMNS: &str = r#"
    id, transaction_type, amount, transaction_date, description, invoice_id, bill_id,
    sales_order_id, created_by, created_at
"#;

/// A ledger entry about to be appended
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub transaction_date: NaiveDate,
    pub description: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub bill_id: Option<Uuid>,
    pub sales_order_id: Option<Uuid>,
}

/// Input for ad-hoc income or expense
#[derive(Debug, Deserialize, Validate)]
pub struct RecordTransactionInput {
    pub transaction_type: TransactionType,
    #[validate(custom = "positive_decimal")]
    pub amount: Decimal,
    pub transaction_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub sales_order_id: Option<Uuid>,
}

/// Ledger listing filter
#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub sales_order_id: Option<Uuid>,
}

impl TransactionFilter {
    /// Validated `(start, end)` bounds, either side open
    fn bounds(&self) -> AppResult<(Option<NaiveDate>, Option<NaiveDate>)> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(AppError::validation(
                    "start",
                    "Start date must not be after end date",
                ));
            }
        }
        Ok((self.start, self.end))
    }
}

impl LedgerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record income or expense not tied to an invoice or bill
    pub async fn record_transaction(
        &self,
        actor: Actor,
        input: RecordTransactionInput,
    ) -> AppResult<Transaction> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        if let Some(sales_order_id) = input.sales_order_id {
            load_sales_order(&mut *tx, sales_order_id, false).await?;
        }

        let transaction = insert_transaction(
            &mut *tx,
            actor,
            NewTransaction {
                transaction_type: input.transaction_type,
                amount: input.amount,
                transaction_date: input
                    .transaction_date
                    .unwrap_or_else(|| Utc::now().date_naive()),
                description: input.description,
                invoice_id: None,
                bill_id: None,
                sales_order_id: input.sales_order_id,
            },
        )
        .await?;

        tx.commit().await?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::Created,
                EntityType::Transaction,
                transaction.id,
                format!(
                    "{} of {} recorded",
                    transaction.transaction_type.as_str(),
                    transaction.amount
                ),
            ))
            .await;

        Ok(transaction)
    }

    pub async fn list(&self, filter: TransactionFilter) -> AppResult<Vec<Transaction>> {
        let bounds = filter.bounds()?;
        let mut conn = self.db.acquire().await?;
        load_transactions(&mut *conn, bounds, filter.sales_order_id).await
    }

    /// Cash and accrual totals, optionally restricted to a date range
    pub async fn summary(&self, filter: TransactionFilter) -> AppResult<LedgerSummary> {
        let bounds = filter.bounds()?;
        let mut conn = self.db.acquire().await?;

        let transactions = load_transactions(&mut *conn, bounds, None).await?;
        let invoices = load_document_balances(&mut *conn, "invoices", bounds).await?;
        let bills = load_document_balances(&mut *conn, "bills", bounds).await?;

        Ok(LedgerSummary::build(&transactions, &invoices, &bills))
    }

    /// Invoiced, collected and outstanding amounts of one sales order
    pub async fn order_balance(&self, sales_order_id: Uuid) -> AppResult<OrderBalance> {
        let mut conn = self.db.acquire().await?;
        let order = load_sales_order(&mut *conn, sales_order_id, false).await?;
        let invoices = load_invoice_balances(&mut *conn, sales_order_id, false).await?;
        let direct = load_transactions(&mut *conn, (None, None), Some(sales_order_id)).await?;

        Ok(OrderBalance::build(
            sales_order_id,
            order.total_amount.unwrap_or(Decimal::ZERO),
            &invoices,
            &direct,
        ))
    }
}

/// Append a ledger entry inside the caller's transaction
pub async fn insert_transaction(
    conn: &mut PgConnection,
    actor: Actor,
    entry: NewTransaction,
) -> AppResult<Transaction> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        INSERT INTO transactions (
            transaction_type, amount, transaction_date, description,
            invoice_id, bill_id, sales_order_id, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(entry.transaction_type.as_str())
    .bind(entry.amount)
    .bind(entry.transaction_date)
    .bind(&entry.description)
    .bind(entry.invoice_id)
    .bind(entry.bill_id)
    .bind(entry.sales_order_id)
    .bind(actor.user_id)
    .fetch_one(&mut *conn)
    .await?;

    Transaction::try_from(row)
}

/// Number of ledger entries attached to a document column
pub async fn count_transactions(
    conn: &mut PgConnection,
    column: DocumentColumn,
    id: Uuid,
) -> AppResult<i64> {
    let (count,) = sqlx::query_as::<_, (i64,)>(&format!(
        "SELECT COUNT(*) FROM transactions WHERE {} = $1",
        column.as_str()
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Document foreign keys on the ledger
#[derive(Debug, Clone, Copy)]
pub enum DocumentColumn {
    Invoice,
    Bill,
}

impl DocumentColumn {
    fn as_str(&self) -> &'static str {
        match self {
            DocumentColumn::Invoice => "invoice_id",
            DocumentColumn::Bill => "bill_id",
        }
    }
}

async fn load_transactions(
    conn: &mut PgConnection,
    (start, end): (Option<NaiveDate>, Option<NaiveDate>),
    sales_order_id: Option<Uuid>,
) -> AppResult<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        SELECT {}
        FROM transactions
        WHERE ($1::DATE IS NULL OR transaction_date >= $1)
          AND ($2::DATE IS NULL OR transaction_date <= $2)
          AND ($3::UUID IS NULL OR sales_order_id = $3)
        ORDER BY transaction_date, created_at
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(start)
    .bind(end)
    .bind(sales_order_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(Transaction::try_from).collect()
}

async fn load_document_balances(
    conn: &mut PgConnection,
    table: &'static str,
    (start, end): (Option<NaiveDate>, Option<NaiveDate>),
) -> AppResult<Vec<DocumentBalance>> {
    let rows = sqlx::query_as::<_, (Decimal, Decimal)>(&format!(
        r#"
        SELECT total_amount, pending_amount
        FROM {}
        WHERE ($1::DATE IS NULL OR created_at::DATE >= $1)
          AND ($2::DATE IS NULL OR created_at::DATE <= $2)
        "#,
        table
    ))
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(total, pending)| DocumentBalance::new(total, pending))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rejects_inverted_range() {
        let filter = TransactionFilter {
            start: NaiveDate::from_ymd_opt(2024, 6, 30),
            end: NaiveDate::from_ymd_opt(2024, 6, 1),
            sales_order_id: None,
        };
        assert!(filter.bounds().is_err());
    }

    #[test]
    fn test_filter_open_ended_range() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1);
        let filter = TransactionFilter {
            start,
            end: None,
            sales_order_id: None,
        };
        assert_eq!(filter.bounds().unwrap(), (start, None));
    }
}
