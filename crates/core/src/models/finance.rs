use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use super::entity::{EntityId, IntoMutationBody, OptimisticEntity};
use super::mutation::{FileAttachment, MutationBody};

// ── Receivables ─────────────────────────────────────────────────────

/// One installment a customer owes on a reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivableInstallment {
    pub id: EntityId,
    pub reservation_code: String,
    pub customer: String,
    pub due_date: NaiveDate,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub paid_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReceivableInstallment {
    pub reservation_code: String,
    pub customer: String,
    pub due_date: NaiveDate,
    pub amount: f64,
    pub currency: String,
    pub paid: bool,
    pub paid_on: Option<NaiveDate>,
    /// Proof of payment, sent as multipart when present.
    #[serde(skip)]
    pub attachment: Option<FileAttachment>,
}

impl IntoMutationBody for NewReceivableInstallment {
    fn to_body(&self) -> Result<MutationBody, CoreError> {
        MutationBody::from_draft(self, self.attachment.as_ref())
    }
}

impl From<&ReceivableInstallment> for NewReceivableInstallment {
    fn from(r: &ReceivableInstallment) -> Self {
        Self {
            reservation_code: r.reservation_code.clone(),
            customer: r.customer.clone(),
            due_date: r.due_date,
            amount: r.amount,
            currency: r.currency.clone(),
            paid: r.paid,
            paid_on: r.paid_on,
            attachment: None,
        }
    }
}

impl OptimisticEntity for ReceivableInstallment {
    type Draft = NewReceivableInstallment;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn placeholder(draft: &Self::Draft, id: EntityId) -> Self {
        Self {
            id,
            reservation_code: draft.reservation_code.clone(),
            customer: draft.customer.clone(),
            due_date: draft.due_date,
            amount: draft.amount,
            currency: draft.currency.to_uppercase(),
            paid: draft.paid,
            paid_on: draft.paid_on,
        }
    }
}

// ── Expenses ────────────────────────────────────────────────────────

/// A supplier expense (hotel, transfer, airline...) owed or paid by the agency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: EntityId,
    pub date: NaiveDate,
    pub category: String,
    pub supplier: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub paid: bool,
    /// File name or URL of the stored receipt.
    #[serde(default)]
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub category: String,
    pub supplier: String,
    pub description: String,
    pub amount: f64,
    pub currency: String,
    pub due_date: Option<NaiveDate>,
    pub paid: bool,
    #[serde(skip)]
    pub receipt: Option<FileAttachment>,
}

impl IntoMutationBody for NewExpense {
    fn to_body(&self) -> Result<MutationBody, CoreError> {
        MutationBody::from_draft(self, self.receipt.as_ref())
    }
}

impl OptimisticEntity for Expense {
    type Draft = NewExpense;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn placeholder(draft: &Self::Draft, id: EntityId) -> Self {
        Self {
            id,
            date: draft.date,
            category: draft.category.clone(),
            supplier: draft.supplier.clone(),
            description: draft.description.clone(),
            amount: draft.amount,
            currency: draft.currency.to_uppercase(),
            due_date: draft.due_date,
            paid: draft.paid,
            receipt: draft.receipt.as_ref().map(|f| f.file_name.clone()),
        }
    }
}

// ── Bank statement ──────────────────────────────────────────────────

/// A bank movement. Positive amounts are inflows, negative amounts outflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransfer {
    pub id: EntityId,
    pub date: NaiveDate,
    pub account: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub voucher: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBankTransfer {
    pub date: NaiveDate,
    pub account: String,
    pub description: String,
    pub amount: f64,
    pub currency: String,
    #[serde(skip)]
    pub voucher: Option<FileAttachment>,
}

impl IntoMutationBody for NewBankTransfer {
    fn to_body(&self) -> Result<MutationBody, CoreError> {
        MutationBody::from_draft(self, self.voucher.as_ref())
    }
}

impl OptimisticEntity for BankTransfer {
    type Draft = NewBankTransfer;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn placeholder(draft: &Self::Draft, id: EntityId) -> Self {
        Self {
            id,
            date: draft.date,
            account: draft.account.clone(),
            description: draft.description.clone(),
            amount: draft.amount,
            currency: draft.currency.to_uppercase(),
            voucher: draft.voucher.as_ref().map(|f| f.file_name.clone()),
        }
    }
}
