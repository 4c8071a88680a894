//! Invoices, bills, ledger transactions and payment reconciliation

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult, GateFailure};

/// Receivable raised against a sales order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub sales_order_id: Uuid,
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub pending_amount: Decimal,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Unpaid,
    Partial,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "UNPAID",
            InvoiceStatus::Partial => "PARTIAL",
            InvoiceStatus::Paid => "PAID",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "UNPAID" => Some(InvoiceStatus::Unpaid),
            "PARTIAL" => Some(InvoiceStatus::Partial),
            "PAID" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }

    /// The only status consistent with a balance
    pub fn for_balance(total: Decimal, pending: Decimal) -> Self {
        if pending <= Decimal::ZERO {
            InvoiceStatus::Paid
        } else if pending < total {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Unpaid
        }
    }
}

/// Payable raised by a vendor against a purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub vendor_id: Uuid,
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub pending_amount: Decimal,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    Draft,
    Approved,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Draft => "DRAFT",
            BillStatus::Approved => "APPROVED",
            BillStatus::Paid => "PAID",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(BillStatus::Draft),
            "APPROVED" => Some(BillStatus::Approved),
            "PAID" => Some(BillStatus::Paid),
            _ => None,
        }
    }
}

/// Ledger entry direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money in (receivables)
    Credit,
    /// Money out (payables)
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "CREDIT",
            TransactionType::Debit => "DEBIT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREDIT" => Some(TransactionType::Credit),
            "DEBIT" => Some(TransactionType::Debit),
            _ => None,
        }
    }
}

/// Append-only ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub transaction_date: NaiveDate,
    pub description: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub bill_id: Option<Uuid>,
    pub sales_order_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Outcome of applying a payment to a document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentOutcome<S> {
    pub amount: Decimal,
    pub new_pending: Decimal,
    pub status: S,
    pub transaction_type: TransactionType,
}

fn settle(field: &str, pending: Decimal, amount: Decimal) -> DomainResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation(field, "Payment amount must be positive"));
    }
    if amount > pending {
        return Err(GateFailure::AmountExceedsPending { amount, pending }.into());
    }
    let new_pending = pending - amount;
    if new_pending < Decimal::ZERO {
        return Err(DomainError::InvariantViolation(format!(
            "pending amount went negative: {} - {} = {}",
            pending, amount, new_pending
        )));
    }
    Ok(new_pending)
}

fn check_balance(kind: &str, total: Decimal, pending: Decimal) -> DomainResult<()> {
    if pending < Decimal::ZERO || pending > total {
        return Err(DomainError::InvariantViolation(format!(
            "{} pending amount {} outside 0..={}",
            kind, pending, total
        )));
    }
    Ok(())
}

impl Invoice {
    /// Apply a receivable payment, producing the new balance and status
    pub fn apply_payment(&self, amount: Decimal) -> DomainResult<PaymentOutcome<InvoiceStatus>> {
        let new_pending = settle("amount", self.pending_amount, amount)?;
        Ok(PaymentOutcome {
            amount,
            new_pending,
            status: InvoiceStatus::for_balance(self.total_amount, new_pending),
            transaction_type: TransactionType::Credit,
        })
    }

    pub fn paid_amount(&self) -> Decimal {
        self.total_amount - self.pending_amount
    }

    /// PAID iff pending is zero, PARTIAL iff strictly between zero and total
    pub fn check_invariants(&self) -> DomainResult<()> {
        check_balance("Invoice", self.total_amount, self.pending_amount)?;
        let expected = InvoiceStatus::for_balance(self.total_amount, self.pending_amount);
        if expected != self.status {
            return Err(DomainError::InvariantViolation(format!(
                "invoice {} is {} but balance implies {}",
                self.id,
                self.status.as_str(),
                expected.as_str()
            )));
        }
        Ok(())
    }
}

impl Bill {
    /// Apply a payable payment. A partial payment on a draft bill approves it.
    pub fn apply_payment(&self, amount: Decimal) -> DomainResult<PaymentOutcome<BillStatus>> {
        let new_pending = settle("amount", self.pending_amount, amount)?;
        let status = if new_pending <= Decimal::ZERO {
            BillStatus::Paid
        } else {
            BillStatus::Approved
        };
        Ok(PaymentOutcome {
            amount,
            new_pending,
            status,
            transaction_type: TransactionType::Debit,
        })
    }

    pub fn paid_amount(&self) -> Decimal {
        self.total_amount - self.pending_amount
    }

    pub fn check_invariants(&self) -> DomainResult<()> {
        check_balance("Bill", self.total_amount, self.pending_amount)?;
        let paid = self.status == BillStatus::Paid;
        if paid != self.pending_amount.is_zero() {
            return Err(DomainError::InvariantViolation(format!(
                "bill {} is {} with pending amount {}",
                self.id,
                self.status.as_str(),
                self.pending_amount
            )));
        }
        Ok(())
    }
}

/// Total and pending amounts of a receivable or payable
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DocumentBalance {
    pub total_amount: Decimal,
    pub pending_amount: Decimal,
}

impl DocumentBalance {
    pub fn new(total_amount: Decimal, pending_amount: Decimal) -> Self {
        Self {
            total_amount,
            pending_amount,
        }
    }

    pub fn paid(&self) -> Decimal {
        self.total_amount - self.pending_amount
    }
}

/// Aggregate view of the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LedgerSummary {
    /// Cash collected (sum of credits)
    pub cash_revenue: Decimal,
    /// Cash paid out (sum of debits)
    pub cash_expense: Decimal,
    pub cash_profit: Decimal,
    /// Revenue recognised at invoicing time
    pub accrual_revenue: Decimal,
    /// Expense recognised at billing time
    pub accrual_expense: Decimal,
    pub accrual_profit: Decimal,
    pub outstanding_receivables: Decimal,
    pub outstanding_payables: Decimal,
    pub transaction_count: usize,
}

impl LedgerSummary {
    pub fn build(
        transactions: &[Transaction],
        invoices: &[DocumentBalance],
        bills: &[DocumentBalance],
    ) -> Self {
        let sum_of = |kind: TransactionType| -> Decimal {
            transactions
                .iter()
                .filter(|t| t.transaction_type == kind)
                .map(|t| t.amount)
                .sum()
        };
        let cash_revenue = sum_of(TransactionType::Credit);
        let cash_expense = sum_of(TransactionType::Debit);
        let accrual_revenue: Decimal = invoices.iter().map(|d| d.total_amount).sum();
        let accrual_expense: Decimal = bills.iter().map(|d| d.total_amount).sum();

        Self {
            cash_revenue,
            cash_expense,
            cash_profit: cash_revenue - cash_expense,
            accrual_revenue,
            accrual_expense,
            accrual_profit: accrual_revenue - accrual_expense,
            outstanding_receivables: invoices.iter().map(|d| d.pending_amount).sum(),
            outstanding_payables: bills.iter().map(|d| d.pending_amount).sum(),
            transaction_count: transactions.len(),
        }
    }
}

/// Financial position of one sales order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBalance {
    pub sales_order_id: Uuid,
    pub order_total: Decimal,
    pub invoiced: Decimal,
    pub collected: Decimal,
    /// Direct credits against the order outside any invoice
    pub direct_income: Decimal,
    /// Direct debits against the order outside any bill
    pub direct_expense: Decimal,
    pub pending: Decimal,
}

impl OrderBalance {
    pub fn build(
        sales_order_id: Uuid,
        order_total: Decimal,
        invoices: &[DocumentBalance],
        direct: &[Transaction],
    ) -> Self {
        let invoiced: Decimal = invoices.iter().map(|d| d.total_amount).sum();
        let collected: Decimal = invoices.iter().map(DocumentBalance::paid).sum();
        let direct_sum = |kind: TransactionType| -> Decimal {
            direct
                .iter()
                .filter(|t| t.transaction_type == kind && t.invoice_id.is_none() && t.bill_id.is_none())
                .map(|t| t.amount)
                .sum()
        };
        let direct_income = direct_sum(TransactionType::Credit);

        Self {
            sales_order_id,
            order_total,
            invoiced,
            collected,
            direct_income,
            direct_expense: direct_sum(TransactionType::Debit),
            pending: order_total - collected - direct_income,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn invoice(total: &str, pending: &str) -> Invoice {
        let total = dec(total);
        let pending = dec(pending);
        Invoice {
            id: Uuid::new_v4(),
            sales_order_id: Uuid::new_v4(),
            invoice_number: "INV-0001".to_string(),
            total_amount: total,
            pending_amount: pending,
            status: InvoiceStatus::for_balance(total, pending),
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn bill(total: &str, status: BillStatus) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            purchase_order_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            invoice_number: "V-77".to_string(),
            total_amount: dec(total),
            pending_amount: dec(total),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_invoice_partial_then_paid() {
        let mut inv = invoice("100000", "100000");
        assert_eq!(inv.status, InvoiceStatus::Unpaid);

        let first = inv.apply_payment(dec("40000")).unwrap();
        assert_eq!(first.new_pending, dec("60000"));
        assert_eq!(first.status, InvoiceStatus::Partial);
        assert_eq!(first.transaction_type, TransactionType::Credit);
        inv.pending_amount = first.new_pending;
        inv.status = first.status;
        inv.check_invariants().unwrap();

        let second = inv.apply_payment(dec("60000")).unwrap();
        assert_eq!(second.new_pending, Decimal::ZERO);
        assert_eq!(second.status, InvoiceStatus::Paid);
        inv.pending_amount = second.new_pending;
        inv.status = second.status;

        let err = inv.apply_payment(dec("1")).unwrap_err();
        assert_eq!(err.code(), "AMOUNT_EXCEEDS_PENDING");
    }

    #[test]
    fn test_zero_payment_rejected() {
        let inv = invoice("100", "100");
        let err = inv.apply_payment(Decimal::ZERO).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_draft_bill_partial_payment_approves() {
        let b = bill("5000", BillStatus::Draft);
        let outcome = b.apply_payment(dec("1000")).unwrap();
        assert_eq!(outcome.status, BillStatus::Approved);
        assert_eq!(outcome.transaction_type, TransactionType::Debit);
    }

    #[test]
    fn test_bill_full_payment() {
        let b = bill("5000", BillStatus::Approved);
        let outcome = b.apply_payment(dec("5000")).unwrap();
        assert_eq!(outcome.status, BillStatus::Paid);
        assert!(outcome.new_pending.is_zero());
    }

    #[test]
    fn test_invoice_invariant_detects_mismatch() {
        let mut inv = invoice("100", "40");
        inv.status = InvoiceStatus::Paid;
        assert!(matches!(
            inv.check_invariants(),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_ledger_summary() {
        let tx = |kind, amount: &str| Transaction {
            id: Uuid::new_v4(),
            transaction_type: kind,
            amount: dec(amount),
            transaction_date: Utc::now().date_naive(),
            description: None,
            invoice_id: None,
            bill_id: None,
            sales_order_id: None,
            created_by: Uuid::nil(),
            created_at: Utc::now(),
        };
        let transactions = vec![
            tx(TransactionType::Credit, "400"),
            tx(TransactionType::Credit, "100"),
            tx(TransactionType::Debit, "150"),
        ];
        let invoices = vec![DocumentBalance::new(dec("1000"), dec("500"))];
        let bills = vec![DocumentBalance::new(dec("300"), dec("150"))];

        let summary = LedgerSummary::build(&transactions, &invoices, &bills);
        assert_eq!(summary.cash_revenue, dec("500"));
        assert_eq!(summary.cash_expense, dec("150"));
        assert_eq!(summary.cash_profit, dec("350"));
        assert_eq!(summary.accrual_revenue, dec("1000"));
        assert_eq!(summary.accrual_profit, dec("700"));
        assert_eq!(summary.outstanding_receivables, dec("500"));
        assert_eq!(summary.outstanding_payables, dec("150"));
        assert_eq!(summary.transaction_count, 3);
    }
}
