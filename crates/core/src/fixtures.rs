//! Record builders shared by unit tests.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use ledgerline_shared::types::{AccountId, ClientId, ClosureId, MovementId, UploadId};

use crate::ledger::{Account, Movement};

pub fn account(code: &str, name: &str) -> Account {
    Account {
        id: AccountId::new(),
        client_id: ClientId::new(),
        code: code.to_string(),
        name: name.to_string(),
        english_name: None,
        classification: BTreeMap::new(),
        created_by_upload: None,
    }
}

pub fn movement(
    account: &Account,
    document_type: Option<&str>,
    debit: Decimal,
    credit: Decimal,
    row_number: u32,
) -> Movement {
    Movement {
        id: MovementId::new(),
        client_id: account.client_id,
        closure_id: ClosureId::new(),
        upload_id: UploadId::new(),
        account_id: account.id,
        account_code: account.code.clone(),
        date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default(),
        document_type: document_type.map(str::to_string),
        document_type_ref: None,
        document_number: None,
        debit,
        credit,
        description: None,
        cost_center: None,
        auxiliary: None,
        internal_number: None,
        row_number,
        incomplete: false,
    }
}
