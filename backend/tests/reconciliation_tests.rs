//! Invoice, bill and ledger reconciliation tests
//!
//! - Payment application keeps `0 <= pending <= total`
//! - Status always agrees with the balance
//! - Ledger summary and order balance aggregation

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    Bill, BillStatus, DocumentBalance, DomainError, GateFailure, Invoice, InvoiceStatus,
    LedgerSummary, OrderBalance, Transaction, TransactionType,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn invoice(total: Decimal) -> Invoice {
    let now = Utc::now();
    Invoice {
        id: Uuid::new_v4(),
        sales_order_id: Uuid::new_v4(),
        invoice_number: "INV-2024-001".to_string(),
        total_amount: total,
        pending_amount: total,
        status: InvoiceStatus::Unpaid,
        due_date: None,
        created_at: now,
        updated_at: now,
    }
}

fn bill(total: Decimal) -> Bill {
    let now = Utc::now();
    Bill {
        id: Uuid::new_v4(),
        purchase_order_id: Uuid::new_v4(),
        vendor_id: Uuid::new_v4(),
        invoice_number: "VB-77".to_string(),
        total_amount: total,
        pending_amount: total,
        status: BillStatus::Draft,
        created_at: now,
        updated_at: now,
    }
}

fn transaction(kind: TransactionType, amount: &str) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        transaction_type: kind,
        amount: dec(amount),
        transaction_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        description: None,
        invoice_id: None,
        bill_id: None,
        sales_order_id: None,
        created_by: Uuid::new_v4(),
        created_at: Utc::now(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_zero_payment_is_validation_error() {
        let err = invoice(dec("100")).apply_payment(Decimal::ZERO).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_overpayment_rejected_with_pending() {
        let err = invoice(dec("100")).apply_payment(dec("100.01")).unwrap_err();
        assert_eq!(
            err,
            DomainError::PreconditionNotMet(GateFailure::AmountExceedsPending {
                amount: dec("100.01"),
                pending: dec("100"),
            })
        );
    }

    #[test]
    fn test_partial_bill_payment_approves_draft() {
        let outcome = bill(dec("5000")).apply_payment(dec("1000")).unwrap();
        assert_eq!(outcome.status, BillStatus::Approved);
        assert_eq!(outcome.new_pending, dec("4000"));
        assert_eq!(outcome.transaction_type, TransactionType::Debit);
    }

    #[test]
    fn test_full_bill_payment_marks_paid() {
        let outcome = bill(dec("5000")).apply_payment(dec("5000")).unwrap();
        assert_eq!(outcome.status, BillStatus::Paid);
        assert!(outcome.new_pending.is_zero());
    }

    #[test]
    fn test_invoice_payment_is_credit() {
        let outcome = invoice(dec("10")).apply_payment(dec("4")).unwrap();
        assert_eq!(outcome.transaction_type, TransactionType::Credit);
    }

    #[test]
    fn test_inconsistent_invoice_status_detected() {
        let mut inv = invoice(dec("100"));
        inv.pending_amount = dec("40");
        // status still UNPAID
        assert!(matches!(
            inv.check_invariants(),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_bill_pending_above_total_detected() {
        let mut b = bill(dec("100"));
        b.pending_amount = dec("120");
        assert!(b.check_invariants().is_err());
    }

    #[test]
    fn test_ledger_summary_cash_and_accrual() {
        let transactions = vec![
            transaction(TransactionType::Credit, "40000"),
            transaction(TransactionType::Credit, "10000"),
            transaction(TransactionType::Debit, "30000"),
        ];
        let invoices = vec![DocumentBalance::new(dec("100000"), dec("60000"))];
        let bills = vec![DocumentBalance::new(dec("70000"), dec("40000"))];

        let summary = LedgerSummary::build(&transactions, &invoices, &bills);

        assert_eq!(summary.cash_revenue, dec("50000"));
        assert_eq!(summary.cash_expense, dec("30000"));
        assert_eq!(summary.cash_profit, dec("20000"));
        assert_eq!(summary.accrual_revenue, dec("100000"));
        assert_eq!(summary.accrual_expense, dec("70000"));
        assert_eq!(summary.accrual_profit, dec("30000"));
        assert_eq!(summary.outstanding_receivables, dec("60000"));
        assert_eq!(summary.outstanding_payables, dec("40000"));
        assert_eq!(summary.transaction_count, 3);
    }

    #[test]
    fn test_empty_ledger_summary() {
        assert_eq!(LedgerSummary::build(&[], &[], &[]), LedgerSummary::default());
    }

    #[test]
    fn test_order_balance_excludes_document_payments_from_direct() {
        let order_id = Uuid::new_v4();
        let invoices = vec![DocumentBalance::new(dec("100000"), dec("25000"))];

        let mut via_invoice = transaction(TransactionType::Credit, "75000");
        via_invoice.invoice_id = Some(Uuid::new_v4());
        via_invoice.sales_order_id = Some(order_id);
        let mut advance = transaction(TransactionType::Credit, "5000");
        advance.sales_order_id = Some(order_id);
        let mut freight = transaction(TransactionType::Debit, "1200");
        freight.sales_order_id = Some(order_id);

        let balance =
            OrderBalance::build(order_id, dec("100000"), &invoices, &[via_invoice, advance, freight]);

        assert_eq!(balance.invoiced, dec("100000"));
        assert_eq!(balance.collected, dec("75000"));
        assert_eq!(balance.direct_income, dec("5000"));
        assert_eq!(balance.direct_expense, dec("1200"));
        assert_eq!(balance.pending, dec("20000"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

/// Amounts in cents up to ten million
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Payment sizes as fractions of the remaining balance, in basis points
fn payment_fractions_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..=10_000u32, 1..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any accepted payment sequence keeps the invoice balance in range and
    /// its status consistent; collected plus pending always equals total
    #[test]
    fn test_invoice_balance_stays_consistent(
        total in amount_strategy(),
        fractions in payment_fractions_strategy()
    ) {
        let mut inv = invoice(total);
        let mut collected = Decimal::ZERO;

        for bp in fractions {
            let amount = (inv.pending_amount * Decimal::from(bp) / Decimal::from(10_000u32)).round_dp(2);
            match inv.apply_payment(amount) {
                Ok(outcome) => {
                    collected += amount;
                    inv.pending_amount = outcome.new_pending;
                    inv.status = outcome.status;
                }
                Err(_) => {
                    // Rejected payments leave the invoice untouched
                    prop_assert!(amount <= Decimal::ZERO || amount > inv.pending_amount);
                }
            }
            prop_assert!(inv.check_invariants().is_ok());
            prop_assert_eq!(collected + inv.pending_amount, total);
        }
    }

    /// Paying more than pending is always rejected and never changes the balance
    #[test]
    fn test_overpayment_always_rejected(
        total in amount_strategy(),
        excess in amount_strategy()
    ) {
        let b = bill(total);
        let result = b.apply_payment(total + excess);
        let is_exceeds_pending = matches!(
            result,
            Err(DomainError::PreconditionNotMet(GateFailure::AmountExceedsPending { .. }))
        );
        prop_assert!(is_exceeds_pending);
        prop_assert_eq!(b.pending_amount, total);
    }

    /// Bill status is PAID exactly when nothing is pending
    #[test]
    fn test_bill_paid_iff_settled(
        total in amount_strategy(),
        bp in 1u32..=10_000u32
    ) {
        let b = bill(total);
        let amount = (total * Decimal::from(bp) / Decimal::from(10_000u32)).round_dp(2);
        prop_assume!(amount > Decimal::ZERO);
        let outcome = b.apply_payment(amount).unwrap();
        prop_assert_eq!(outcome.status == BillStatus::Paid, outcome.new_pending.is_zero());
    }
}
