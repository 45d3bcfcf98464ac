//! Product reference data and the shared timestamp wrapper

use crate::error::WorkflowError;
use chrono::{DateTime, TimeZone, Utc};
use sled::{Db, Tree};

/// Reference record for a material or finished good.
///
/// On-hand quantity is deliberately absent: the stock ledger is the only
/// owner of that value. The min/max thresholds are informational and never
/// enforced by workflow transitions.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Product {
    #[n(0)]
    pub product_id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub unit: String,
    #[n(3)]
    pub min_stock: u64,
    #[n(4)]
    pub max_stock: u64,
}

impl Product {
    pub fn new(product_id: String, name: &str, unit: &str) -> Self {
        Self {
            product_id,
            name: name.to_string(),
            unit: unit.to_string(),
            min_stock: 0,
            max_stock: 0,
        }
    }
    pub fn with_thresholds(mut self, min_stock: u64, max_stock: u64) -> Self {
        self.min_stock = min_stock;
        self.max_stock = max_stock;
        self
    }
}

/// Durable product reference records, keyed by product id.
pub struct ProductCatalog {
    tree: Tree,
}

impl ProductCatalog {
    pub fn open(db: &Db) -> Result<Self, WorkflowError> {
        Ok(Self {
            tree: db.open_tree("products")?,
        })
    }

    pub fn get(&self, product_id: &str) -> Result<Option<Product>, WorkflowError> {
        match self.tree.get(product_id.as_bytes())? {
            Some(bytes) => {
                let product =
                    minicbor::decode(&bytes).map_err(|e| WorkflowError::Corrupt {
                        key: product_id.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    pub fn put(&self, product: &Product) -> Result<(), WorkflowError> {
        let cbor = minicbor::to_vec(product).map_err(|e| WorkflowError::Corrupt {
            key: product.product_id.clone(),
            reason: e.to_string(),
        })?;
        self.tree.insert(product.product_id.as_bytes(), cbor)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
