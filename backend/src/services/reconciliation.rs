//! Invoice and bill reconciliation service
//!
//! A payment locks its document, applies the shared payment rules and
//! appends the ledger entry in the same transaction, so the balance and the
//! ledger never disagree.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{decode, positive_decimal};
use crate::services::audit::AuditService;
use crate::services::ledger::{count_transactions, insert_transaction, DocumentColumn, NewTransaction};
use crate::services::purchase_order::load_purchase_order;
use crate::services::sales_order::load_sales_order;
use shared::{
    validate_document_number, ActivityAction, ActivityRecord, Actor, Bill, BillStatus,
    DomainError, EntityType, GateFailure, Invoice, InvoiceStatus, PurchaseOrderStatus,
    SalesOrderStatus, Transaction,
};

/// Invoice and bill service
#[derive(Clone)]
pub struct ReconciliationService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    sales_order_id: Uuid,
    invoice_number: String,
    total_amount: Decimal,
    pending_amount: Decimal,
    status: String,
    due_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: row.id,
            sales_order_id: row.sales_order_id,
            invoice_number: row.invoice_number,
            total_amount: row.total_amount,
            pending_amount: row.pending_amount,
            status: decode(&row.status, "status", InvoiceStatus::from_str)?,
            due_date: row.due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    id: Uuid,
    purchase_order_id: Uuid,
    vendor_id: Uuid,
    invoice_number: String,
    total_amount: Decimal,
    pending_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BillRow> for Bill {
    type Error = AppError;

    fn try_from(row: BillRow) -> Result<Self, Self::Error> {
        Ok(Bill {
            id: row.id,
            purchase_order_id: row.purchase_order_id,
            vendor_id: row.vendor_id,
            invoice_number: row.invoice_number,
            total_amount: row.total_amount,
            pending_amount: row.pending_amount,
            status: decode(&row.status, "status", BillStatus::from_str)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const INVOICE_COLUMNS: &str = r#"
    id, sales_order_id, invoice_number, total_amount, pending_amount, status, due_date,
    created_at, updated_at
"#;

const BILL_COLUMNS: &str = r#"
    id, purchase_order_id, vendor_id, invoice_number, total_amount, pending_amount, status,
    created_at, updated_at
"#;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceInput {
    pub invoice_number: String,
    #[validate(custom = "positive_decimal")]
    pub total_amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBillInput {
    /// Vendor's own invoice number
    pub invoice_number: String,
    #[validate(custom = "positive_decimal")]
    pub total_amount: Decimal,
}

/// Input for recording a payment against an invoice or bill
#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentInput {
    #[validate(custom = "positive_decimal")]
    pub amount: Decimal,
    /// Defaults to today
    pub transaction_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// Document after a payment together with its ledger entry
#[derive(Debug, Serialize)]
pub struct PaymentReceipt<D> {
    pub document: D,
    pub transaction: Transaction,
}

impl ReconciliationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Invoices
    // ========================================================================

    /// Issue an invoice against a sales order
    pub async fn create_invoice(
        &self,
        actor: Actor,
        sales_order_id: Uuid,
        input: CreateInvoiceInput,
    ) -> AppResult<Invoice> {
        input.validate()?;
        validate_document_number(&input.invoice_number)
            .map_err(|msg| AppError::validation("invoice_number", msg))?;

        let mut tx = self.db.begin().await?;
        let order = load_sales_order(&mut *tx, sales_order_id, false).await?;
        if order.status == SalesOrderStatus::Cancelled {
            return Err(AppError::validation(
                "sales_order_id",
                "Cannot invoice a cancelled sales order",
            ));
        }

        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            INSERT INTO invoices (
                sales_order_id, invoice_number, total_amount, pending_amount, status,
                due_date, created_by
            )
            VALUES ($1, $2, $3, $3, 'UNPAID', $4, $5)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(sales_order_id)
        .bind(input.invoice_number.trim())
        .bind(input.total_amount)
        .bind(input.due_date)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;
        let invoice = Invoice::try_from(row)?;

        tx.commit().await?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::Created,
                EntityType::Invoice,
                invoice.id,
                format!("Invoice {} for {}", invoice.invoice_number, invoice.total_amount),
            ))
            .await;

        Ok(invoice)
    }

    /// Record a receivable payment
    pub async fn record_invoice_payment(
        &self,
        actor: Actor,
        invoice_id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<PaymentReceipt<Invoice>> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let invoice = load_invoice(&mut *tx, invoice_id, true).await?;
        invoice.check_invariants()?;
        let outcome = invoice.apply_payment(input.amount)?;

        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            UPDATE invoices SET pending_amount = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(outcome.new_pending)
        .bind(outcome.status.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let updated = Invoice::try_from(row)?;

        let transaction = insert_transaction(
            &mut *tx,
            actor,
            NewTransaction {
                transaction_type: outcome.transaction_type,
                amount: outcome.amount,
                transaction_date: input
                    .transaction_date
                    .unwrap_or_else(|| Utc::now().date_naive()),
                description: input.description,
                invoice_id: Some(invoice_id),
                bill_id: None,
                sales_order_id: Some(invoice.sales_order_id),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            %invoice_id,
            amount = %outcome.amount,
            pending = %outcome.new_pending,
            "Invoice payment recorded"
        );

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::PaymentRecorded,
                EntityType::Invoice,
                invoice_id,
                format!(
                    "Received {} on invoice {}; {} pending ({})",
                    outcome.amount,
                    updated.invoice_number,
                    updated.pending_amount,
                    updated.status.as_str()
                ),
            ))
            .await;

        Ok(PaymentReceipt {
            document: updated,
            transaction,
        })
    }

    /// Delete an invoice with no payments
    pub async fn delete_invoice(&self, actor: Actor, invoice_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let invoice = load_invoice(&mut *tx, invoice_id, true).await?;

        let count = count_transactions(&mut *tx, DocumentColumn::Invoice, invoice_id).await?;
        if count > 0 {
            return Err(DomainError::from(GateFailure::HasFinancialTransactions { count }).into());
        }

        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::Deleted,
                EntityType::Invoice,
                invoice_id,
                format!("Invoice {} deleted", invoice.invoice_number),
            ))
            .await;

        Ok(())
    }

    pub async fn get_invoice(&self, invoice_id: Uuid) -> AppResult<Invoice> {
        let mut conn = self.db.acquire().await?;
        load_invoice(&mut *conn, invoice_id, false).await
    }

    pub async fn list_invoices(&self, sales_order_id: Uuid) -> AppResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE sales_order_id = $1 ORDER BY created_at",
            INVOICE_COLUMNS
        ))
        .bind(sales_order_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Invoice::try_from).collect()
    }

    // ========================================================================
    // Bills
    // ========================================================================

    /// Record a vendor bill against a purchase order
    pub async fn create_bill(
        &self,
        actor: Actor,
        purchase_order_id: Uuid,
        input: CreateBillInput,
    ) -> AppResult<Bill> {
        input.validate()?;
        validate_document_number(&input.invoice_number)
            .map_err(|msg| AppError::validation("invoice_number", msg))?;

        let mut tx = self.db.begin().await?;
        let order = load_purchase_order(&mut *tx, purchase_order_id, false).await?;
        if order.status == PurchaseOrderStatus::Cancelled {
            return Err(AppError::validation(
                "purchase_order_id",
                "Cannot bill a cancelled purchase order",
            ));
        }

        let row = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            INSERT INTO bills (
                purchase_order_id, vendor_id, invoice_number, total_amount, pending_amount,
                status, created_by
            )
            VALUES ($1, $2, $3, $4, $4, 'DRAFT', $5)
            RETURNING {}
            "#,
            BILL_COLUMNS
        ))
        .bind(purchase_order_id)
        .bind(order.vendor_id)
        .bind(input.invoice_number.trim())
        .bind(input.total_amount)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;
        let bill = Bill::try_from(row)?;

        tx.commit().await?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::Created,
                EntityType::Bill,
                bill.id,
                format!("Bill {} for {}", bill.invoice_number, bill.total_amount),
            ))
            .await;

        Ok(bill)
    }

    /// Approve a draft bill for payment
    pub async fn approve_bill(&self, actor: Actor, bill_id: Uuid) -> AppResult<Bill> {
        let mut tx = self.db.begin().await?;
        let bill = load_bill(&mut *tx, bill_id, true).await?;

        if bill.status != BillStatus::Draft {
            return Err(DomainError::from(GateFailure::InvalidTransition {
                entity: "Bill".to_string(),
                from: bill.status.as_str().to_string(),
                to: BillStatus::Approved.as_str().to_string(),
            })
            .into());
        }

        let row = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            UPDATE bills SET status = 'APPROVED', updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BILL_COLUMNS
        ))
        .bind(bill_id)
        .fetch_one(&mut *tx)
        .await?;
        let updated = Bill::try_from(row)?;

        tx.commit().await?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::status_change(
                &actor,
                EntityType::Bill,
                bill_id,
                bill.status.as_str(),
                updated.status.as_str(),
                None,
            ))
            .await;

        Ok(updated)
    }

    /// Record a payable payment
    pub async fn record_bill_payment(
        &self,
        actor: Actor,
        bill_id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<PaymentReceipt<Bill>> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let bill = load_bill(&mut *tx, bill_id, true).await?;
        bill.check_invariants()?;
        let outcome = bill.apply_payment(input.amount)?;

        let row = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            UPDATE bills SET pending_amount = $2, status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BILL_COLUMNS
        ))
        .bind(bill_id)
        .bind(outcome.new_pending)
        .bind(outcome.status.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let updated = Bill::try_from(row)?;

        let transaction = insert_transaction(
            &mut *tx,
            actor,
            NewTransaction {
                transaction_type: outcome.transaction_type,
                amount: outcome.amount,
                transaction_date: input
                    .transaction_date
                    .unwrap_or_else(|| Utc::now().date_naive()),
                description: input.description,
                invoice_id: None,
                bill_id: Some(bill_id),
                sales_order_id: None,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            %bill_id,
            amount = %outcome.amount,
            pending = %outcome.new_pending,
            "Bill payment recorded"
        );

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::PaymentRecorded,
                EntityType::Bill,
                bill_id,
                format!(
                    "Paid {} on bill {}; {} pending ({})",
                    outcome.amount,
                    updated.invoice_number,
                    updated.pending_amount,
                    updated.status.as_str()
                ),
            ))
            .await;

        Ok(PaymentReceipt {
            document: updated,
            transaction,
        })
    }

    /// Delete a bill with no payments
    pub async fn delete_bill(&self, actor: Actor, bill_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let bill = load_bill(&mut *tx, bill_id, true).await?;

        let count = count_transactions(&mut *tx, DocumentColumn::Bill, bill_id).await?;
        if count > 0 {
            return Err(DomainError::from(GateFailure::HasFinancialTransactions { count }).into());
        }

        sqlx::query("DELETE FROM bills WHERE id = $1")
            .bind(bill_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        AuditService::new(self.db.clone())
            .record(ActivityRecord::new(
                &actor,
                ActivityAction::Deleted,
                EntityType::Bill,
                bill_id,
                format!("Bill {} deleted", bill.invoice_number),
            ))
            .await;

        Ok(())
    }

    pub async fn get_bill(&self, bill_id: Uuid) -> AppResult<Bill> {
        let mut conn = self.db.acquire().await?;
        load_bill(&mut *conn, bill_id, false).await
    }

    pub async fn list_bills(&self, purchase_order_id: Uuid) -> AppResult<Vec<Bill>> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM bills WHERE purchase_order_id = $1 ORDER BY created_at",
            BILL_COLUMNS
        ))
        .bind(purchase_order_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Bill::try_from).collect()
    }
}

async fn load_invoice(conn: &mut PgConnection, invoice_id: Uuid, for_update: bool) -> AppResult<Invoice> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, InvoiceRow>(&format!(
        "SELECT {} FROM invoices WHERE id = $1 {}",
        INVOICE_COLUMNS, lock
    ))
    .bind(invoice_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Invoice"))?;

    Invoice::try_from(row)
}

async fn load_bill(conn: &mut PgConnection, bill_id: Uuid, for_update: bool) -> AppResult<Bill> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, BillRow>(&format!(
        "SELECT {} FROM bills WHERE id = $1 {}",
        BILL_COLUMNS, lock
    ))
    .bind(bill_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("Bill"))?;

    Bill::try_from(row)
}
