use std::{error::Error, ffi::OsStr, fs::File, io::Read};

use ::serde::{Deserialize, Serialize, Serializer};
use rust_decimal::Decimal;

use crate::ledger::{parse_amount, TransactionRequest};
use crate::types::{Customer, CustomerId, TransactionType};

#[derive(Debug, Deserialize)]
pub enum TxTypeEntity {
    #[serde(alias = "debt")]
    Debt,
    #[serde(alias = "repayment", alias = "payment")]
    Repayment,
}

#[derive(Debug, Deserialize)]
pub struct TxRowEntity {
    pub customer: String,
    #[serde(alias = "type")]
    pub tx_type: TxTypeEntity,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl TxRowEntity {
    fn into_domain(self) -> Result<TransactionRequest, Box<dyn Error>> {
        let tx_type = match self.tx_type {
            TxTypeEntity::Debt => TransactionType::Debt,
            TxTypeEntity::Repayment => TransactionType::Repayment,
        };
        Ok(TransactionRequest {
            customer_id: CustomerId::new(self.customer),
            tx_type,
            amount: parse_amount(&self.amount)?,
            description: self.description.filter(|d| !d.is_empty()),
        })
    }
}

fn fixed_width<S: Serializer>(x: &Decimal, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{:.2}", x))
}

#[derive(Debug, Serialize)]
pub struct StatementRowEntity {
    customer: String,
    name: String,
    phone: String,
    #[serde(serialize_with = "fixed_width")]
    balance: Decimal,
    status: &'static str,
}

impl StatementRowEntity {
    pub fn from_customer(customer: &Customer) -> Self {
        Self {
            customer: customer.id.value().to_string(),
            name: customer.name.clone(),
            phone: customer.phone.clone(),
            balance: customer.balance.value(),
            status: customer.status().label(),
        }
    }
}

/// Reads `customer,type,amount,description` rows. Any bad row fails the whole import.
pub fn read_transaction_rows<R: Read>(reader: R) -> Result<Vec<TransactionRequest>, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows: Vec<TransactionRequest> = Vec::new();
    for row in reader.deserialize::<TxRowEntity>() {
        // a partial import would leave the ledger half-applied
        rows.push(row?.into_domain()?);
    }

    Ok(rows)
}

pub fn read_transaction_file(csv_path: &OsStr) -> Result<Vec<TransactionRequest>, Box<dyn Error>> {
    let file = File::open(csv_path)?;
    read_transaction_rows(file)
}

pub fn write_statement(customers: &[Customer]) -> Result<String, Box<dyn Error>> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    for customer in customers {
        wtr.serialize(StatementRowEntity::from_customer(customer))?
    }

    wtr.flush()?;
    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}
