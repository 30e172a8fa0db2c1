use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One line of a customer statement, as written by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRow {
    pub customer: String,
    pub name: String,
    pub phone: String,
    pub balance: String,
    pub status: String,
}

impl StatementRow {
    fn from_fields(fields: [&str; 5]) -> Self {
        let [customer, name, phone, balance, status] = fields.map(str::to_string);
        Self {
            customer,
            name,
            phone,
            balance,
            status,
        }
    }

    /// The status a statement should show for this row's balance.
    fn expected_status(&self) -> &'static str {
        match self.balance.trim_start_matches('-').trim_matches(|c| c == '0' || c == '.') {
            "" => "settled",
            _ if self.balance.starts_with('-') => "credit",
            _ => "owes",
        }
    }
}

// Only used during testing so no need to return result
pub fn create_csv(rows: Vec<[&str; 5]>) -> String {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows.into_iter().map(StatementRow::from_fields) {
        wtr.serialize(row).expect("statement row serialises");
    }
    String::from_utf8(wtr.into_inner().expect("in-memory writer flushes"))
        .expect("statement is utf-8")
}

/// Parses a statement, failing if any row's status disagrees with the sign of its balance.
pub fn parse_statement(csv: &str) -> Vec<StatementRow> {
    let rows: Vec<StatementRow> = csv::Reader::from_reader(csv.as_bytes())
        .deserialize()
        .collect::<Result<_, _>>()
        .unwrap_or_else(|e| panic!("not a statement: {e}\n{csv}"));

    for row in &rows {
        assert_eq!(
            row.status,
            row.expected_status(),
            "customer {} has balance {} but status {}",
            row.customer,
            row.balance,
            row.status
        );
    }
    rows
}

fn by_customer(csv: &str) -> HashMap<String, StatementRow> {
    parse_statement(csv)
        .into_iter()
        .map(|row| (row.customer.clone(), row))
        .collect()
}

// Statements list customers per owner, compare them as sets of rows keyed by customer id
pub fn assert_unsorted_eq(s1: &str, s2: &str) {
    let sut1 = by_customer(s1);
    let sut2 = by_customer(s2);
    if sut1.len() != sut2.len() {
        panic!("statements do not contain the same number of customers");
    }

    sut1.iter().for_each(|(k, v)| match sut2.get(k) {
        Some(row) => assert_eq!(row, v),
        None => panic!("customer {} not found in both statements", k),
    })
}

#[cfg(test)]
mod tests {
    use crate::{assert_unsorted_eq, create_csv, parse_statement};

    const HEADER: &str = "customer,name,phone,balance,status\n";

    #[test]
    fn create_csv_creates_single_row() {
        let sut = create_csv(vec![["c1", "Ada", "+1555", "10.00", "owes"]]);
        assert_eq!(sut, format!("{HEADER}c1,Ada,+1555,10.00,owes\n"));
    }

    #[test]
    fn create_csv_leaves_empty_phone_blank() {
        let rows = vec![["c1", "Ada", "", "0.00", "settled"], ["c2", "Bo", "", "-1.00", "credit"]];
        let sut = create_csv(rows);
        assert_eq!(sut, format!("{HEADER}c1,Ada,,0.00,settled\nc2,Bo,,-1.00,credit\n"));
    }

    #[test]
    fn statements_are_parsed_into_rows() {
        let csv = format!("{HEADER}c1,Ada,,1.00,owes\nc2,Bo,+1555,-0.50,credit\n");
        let rows = parse_statement(&csv);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].customer, "c2");
        assert_eq!(rows[1].phone, "+1555");
        assert_eq!(rows[1].balance, "-0.50");
    }

    #[test]
    #[should_panic(expected = "but status")]
    fn status_must_match_balance_sign() {
        parse_statement(&format!("{HEADER}c1,Ada,,-3.00,owes\n"));
    }

    #[test]
    #[should_panic(expected = "but status")]
    fn zero_balance_must_be_settled() {
        parse_statement(&format!("{HEADER}c1,Ada,,0.00,credit\n"));
    }

    #[test]
    fn two_unsorted_csvs_will_assert_eq() {
        let csv1 = format!("{HEADER}c1,Ada,,1.00,owes\nc2,Bo,,2.00,owes\n");
        let csv2 = format!("{HEADER}c2,Bo,,2.00,owes\nc1,Ada,,1.00,owes\n");
        assert_unsorted_eq(&csv1, &csv2);
    }

    #[test]
    #[should_panic]
    fn two_unequal_len_csvs_will_assert_false() {
        let csv1 = format!("{HEADER}c1,Ada,,1.00,owes\n");
        let csv2 = format!("{HEADER}c2,Bo,,2.00,owes\nc1,Ada,,1.00,owes\n");
        assert_unsorted_eq(&csv1, &csv2);
    }

    #[test]
    #[should_panic]
    fn two_unequal_csvs_will_assert_false() {
        let csv1 = format!("{HEADER}c1,Ada,,3.00,owes\n");
        let csv2 = format!("{HEADER}c1,Ada,,1.00,owes\n");
        assert_unsorted_eq(&csv1, &csv2);
    }
}
