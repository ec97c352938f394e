//! Backend-neutral rows and their decoding into domain types

use rust_decimal::Decimal;
use types::ids::{MakerId, OrderId, TokenId};
use types::order::{Order, OrderRecord};

use super::BackendError;

/// Single column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bytes(Vec<u8>),
    Decimal(Decimal),
}

/// One result row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<Value>) -> Self {
        Self { columns }
    }

    /// `id, maker_id, token_bid, token_ask`
    pub fn from_record(record: &OrderRecord) -> Self {
        Self::new(vec![
            Value::Bytes(record.id.as_bytes().to_vec()),
            Value::Bytes(record.maker_id.as_bytes().to_vec()),
            Value::Bytes(record.token_bid.as_bytes().to_vec()),
            Value::Bytes(record.token_ask.as_bytes().to_vec()),
        ])
    }

    /// Record columns followed by `rate, max_volume, min_volume`
    pub fn joined(record: &OrderRecord, [rate, max_volume, min_volume]: [Decimal; 3]) -> Self {
        let mut row = Self::from_record(record);
        row.columns.extend([
            Value::Decimal(rate),
            Value::Decimal(max_volume),
            Value::Decimal(min_volume),
        ]);
        row
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn bytes(&self, idx: usize) -> Result<&[u8], BackendError> {
        match self.columns.get(idx) {
            Some(Value::Bytes(b)) => Ok(b),
            Some(other) => Err(BackendError::Decode(format!(
                "column {idx}: expected bytes, found {other:?}"
            ))),
            None => Err(self.missing(idx)),
        }
    }

    pub fn decimal(&self, idx: usize) -> Result<Decimal, BackendError> {
        match self.columns.get(idx) {
            Some(Value::Decimal(d)) => Ok(*d),
            Some(other) => Err(BackendError::Decode(format!(
                "column {idx}: expected decimal, found {other:?}"
            ))),
            None => Err(self.missing(idx)),
        }
    }

    fn missing(&self, idx: usize) -> BackendError {
        BackendError::Decode(format!("column {idx} missing, row has {}", self.columns.len()))
    }
}

/// Materialised query result
#[derive(Debug, Default)]
pub struct RowCursor {
    rows: std::vec::IntoIter<Row>,
}

impl RowCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl Iterator for RowCursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

/// Decode a canonical record row
pub fn decode_record(row: &Row) -> Result<OrderRecord, BackendError> {
    Ok(OrderRecord {
        id: OrderId::from_bytes(row.bytes(0)?),
        maker_id: MakerId::from_bytes(row.bytes(1)?),
        token_bid: TokenId::from_bytes(row.bytes(2)?),
        token_ask: TokenId::from_bytes(row.bytes(3)?),
    })
}

/// Decode a joined seven-column row
pub fn decode_order(row: &Row) -> Result<Order, BackendError> {
    let record = decode_record(row)?;
    Ok(Order {
        id: record.id,
        maker_id: record.maker_id,
        token_bid: record.token_bid,
        token_ask: record.token_ask,
        rate: row.decimal(4)?.into(),
        max_volume: row.decimal(5)?.into(),
        min_volume: row.decimal(6)?.into(),
    })
}

/// Decode every joined row in a cursor, failing on the first malformed one
pub fn decode_orders(cursor: RowCursor) -> Result<Vec<Order>, BackendError> {
    cursor.map(|row| decode_order(&row)).collect()
}
