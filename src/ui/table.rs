use tabled::{settings::Style, Table, Tabled};

use crate::datapoint::DataPoint;

#[derive(Tabled)]
pub struct DataPointRow {
    #[tabled(rename = "Id")]
    pub id: i64,
    #[tabled(rename = "Asset")]
    pub asset: String,
    #[tabled(rename = "Value")]
    pub value: f64,
    #[tabled(rename = "Timestamp")]
    pub timestamp: String,
}

impl From<&DataPoint> for DataPointRow {
    fn from(point: &DataPoint) -> Self {
        Self {
            id: point.id,
            asset: point.asset.clone(),
            value: point.value,
            timestamp: point.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Default)]
pub struct DataPointTable {
    rows: Vec<DataPointRow>,
}

impl DataPointTable {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_point(&mut self, point: &DataPoint) {
        self.rows.push(DataPointRow::from(point));
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}
